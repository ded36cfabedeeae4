//! Interaction data and train/test splitting.
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;

use rand::{Rng, SeedableRng, XorShiftRng};

use siphasher::sip::SipHasher;

use super::{ItemId, UserId};
use evaluation::EvaluationError;

/// A single (user, item) interaction, with an optional explicit rating.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Interaction {
    user_id: UserId,
    item_id: ItemId,
    rating: Option<f32>,
}

impl Interaction {
    /// Build a new interaction.
    pub fn new(user_id: UserId, item_id: ItemId, rating: Option<f32>) -> Self {
        Interaction {
            user_id,
            item_id,
            rating,
        }
    }
}

impl Interaction {
    /// The user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
    /// The item.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }
    /// Explicit rating (or play count), if known.
    pub fn rating(&self) -> Option<f32> {
        self.rating
    }
}

/// Build an RNG from an integer seed.
pub fn seeded_rng(seed: u64) -> XorShiftRng {
    // The second half is offset so that a zero seed still yields a
    // non-zero XorShift state.
    let halves = [seed, seed ^ 0x9E37_79B9_7F4A_7C15];
    let mut bytes = [0; 16];

    for (half_idx, &half) in halves.iter().enumerate() {
        for byte_idx in 0..8 {
            bytes[half_idx * 8 + byte_idx] = (half >> (8 * byte_idx)) as u8;
        }
    }

    XorShiftRng::from_seed(bytes)
}

fn check_fraction(fraction: f32) -> Result<(), EvaluationError> {
    if fraction > 0.0 && fraction < 1.0 {
        Ok(())
    } else {
        Err(EvaluationError::InvalidFraction { fraction })
    }
}

/// `ceil(fraction * count)`, tolerant to the representation error of `fraction`.
pub fn ceil_fraction(fraction: f32, count: usize) -> usize {
    // An f32 such as 0.2 is slightly above its decimal value; widening it
    // through its shortest decimal form keeps 0.2 * 5 from rounding up to 2.
    let fraction = fraction
        .to_string()
        .parse::<f64>()
        .unwrap_or_else(|_| f64::from(fraction));
    let exact = fraction * count as f64;
    let slack = (exact * 1e-9).min(1e-6);

    (exact - slack).ceil().max(0.0) as usize
}

/// Number of a user's `num_interactions` interactions that go to the test set.
///
/// Always leaves at least one interaction for training.
pub fn held_out_count(test_fraction: f32, num_interactions: usize) -> usize {
    if num_interactions < 2 {
        return 0;
    }

    ceil_fraction(test_fraction, num_interactions).min(num_interactions - 1)
}

/// Shuffle and split interactions irrespective of user.
///
/// Roughly `test_fraction` of all interactions end up in the test set;
/// users may end up entirely in one of the two sets.
pub fn train_test_split<R: Rng>(
    interactions: &mut Interactions,
    rng: &mut R,
    test_fraction: f32,
) -> Result<(Interactions, Interactions), EvaluationError> {
    check_fraction(test_fraction)?;

    interactions.shuffle(rng);

    let (test, train) = interactions.split_at((test_fraction * interactions.len() as f32) as usize);

    Ok((train, test))
}

/// Split every user's interactions into train and test parts.
///
/// Shorthand for `StratifiedSplit::new(test_fraction).seed(seed).split(interactions)`.
pub fn user_stratified_split(
    interactions: &Interactions,
    test_fraction: f32,
    seed: u64,
) -> Result<(Interactions, Interactions), EvaluationError> {
    StratifiedSplit::new(test_fraction)
        .seed(seed)
        .split(interactions)
}

/// Per-user train/test split.
///
/// For every user with at least two interactions,
/// `ceil(test_fraction * num_interactions)` of them (capped so that one
/// remains for training) are moved to the test set. Users with a single
/// interaction stay entirely in the training set. The choice of held-out
/// interactions depends only on the seed and on the position of each
/// interaction within its user's history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StratifiedSplit {
    test_fraction: f32,
    seed: u64,
    max_num_users: Option<usize>,
}

impl StratifiedSplit {
    /// Hold out `test_fraction` of each user's interactions.
    pub fn new(test_fraction: f32) -> Self {
        StratifiedSplit {
            test_fraction,
            seed: 0,
            max_num_users: None,
        }
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Only hold out interactions for (at most) this many users. The
    /// remaining users are assigned wholly to the training set.
    pub fn max_num_users(mut self, max_num_users: Option<usize>) -> Self {
        self.max_num_users = max_num_users;
        self
    }

    /// Perform the split, returning `(train, test)`.
    pub fn split(
        &self,
        interactions: &Interactions,
    ) -> Result<(Interactions, Interactions), EvaluationError> {
        check_fraction(self.test_fraction)?;

        let mut rng = seeded_rng(self.seed);
        let (key_0, key_1) = (rng.gen::<u64>(), rng.gen::<u64>());

        let user_hash = |user_id: UserId| {
            let mut hasher = SipHasher::new_with_keys(key_0, key_1);
            hasher.write_usize(user_id);
            hasher.finish()
        };
        let interaction_hash = |user_id: UserId, position: usize| {
            let mut hasher = SipHasher::new_with_keys(key_0, key_1);
            hasher.write_usize(user_id);
            hasher.write_usize(position);
            hasher.finish()
        };

        let mut positions: HashMap<UserId, Vec<usize>> = HashMap::new();
        for (idx, interaction) in interactions.data().iter().enumerate() {
            positions
                .entry(interaction.user_id())
                .or_insert_with(Vec::new)
                .push(idx);
        }

        let mut eligible: Vec<UserId> = positions
            .iter()
            .filter(|&(_, user_positions)| user_positions.len() > 1)
            .map(|(&user_id, _)| user_id)
            .collect();
        eligible.sort_by_key(|&user_id| (user_hash(user_id), user_id));

        if let Some(max_num_users) = self.max_num_users {
            eligible.truncate(max_num_users);
        }

        let mut is_test = vec![false; interactions.len()];

        for user_id in &eligible {
            let user_positions = &positions[user_id];
            let num_held_out = held_out_count(self.test_fraction, user_positions.len());

            let mut ordered: Vec<(u64, usize)> = user_positions
                .iter()
                .enumerate()
                .map(|(position, &idx)| (interaction_hash(*user_id, position), idx))
                .collect();
            ordered.sort();

            for &(_, idx) in ordered.iter().take(num_held_out) {
                is_test[idx] = true;
            }
        }

        let (test, train) = interactions.partition(&is_test);

        debug!(
            num_users = positions.len(),
            num_test_users = eligible.len(),
            train = train.len(),
            test = test.len(),
            "stratified split"
        );

        Ok((train, test))
    }
}

/// A collection of interactions over a fixed user and item range.
#[derive(Clone, Debug)]
pub struct Interactions {
    num_users: usize,
    num_items: usize,
    interactions: Vec<Interaction>,
}

impl Interactions {
    /// Empty collection for the given number of users and items.
    pub fn new(num_users: usize, num_items: usize) -> Self {
        Interactions {
            num_users: num_users,
            num_items: num_items,
            interactions: Vec::new(),
        }
    }

    /// Add an interaction, growing the user and item ranges if needed.
    pub fn push(&mut self, interaction: Interaction) {
        self.num_users = self.num_users.max(interaction.user_id() + 1);
        self.num_items = self.num_items.max(interaction.item_id() + 1);
        self.interactions.push(interaction);
    }

    /// Underlying interactions, in insertion order.
    pub fn data(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Number of interactions.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether there are no interactions.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Shuffle the interactions in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        rng.shuffle(&mut self.interactions);
    }

    /// Split into the first `idx` interactions and the rest.
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        let head = Interactions {
            num_users: self.num_users,
            num_items: self.num_items,
            interactions: self.interactions[..idx].to_owned(),
        };
        let tail = Interactions {
            num_users: self.num_users,
            num_items: self.num_items,
            interactions: self.interactions[idx..].to_owned(),
        };

        (head, tail)
    }

    /// Split into interactions satisfying `func` and the rest.
    pub fn split_by<F: Fn(&Interaction) -> bool>(&self, func: F) -> (Self, Self) {
        let mask: Vec<bool> = self.interactions.iter().map(|x| func(x)).collect();

        self.partition(&mask)
    }

    fn partition(&self, mask: &[bool]) -> (Self, Self) {
        let mut head = Interactions::new(self.num_users, self.num_items);
        let mut tail = Interactions::new(self.num_users, self.num_items);

        for (interaction, &in_head) in self.interactions.iter().zip(mask) {
            if in_head {
                head.interactions.push(interaction.clone());
            } else {
                tail.interactions.push(interaction.clone());
            }
        }

        (head, tail)
    }

    /// Distinct users with at least one interaction.
    pub fn users(&self) -> HashSet<UserId> {
        self.interactions.iter().map(|x| x.user_id()).collect()
    }

    /// Per-user view of the data.
    pub fn to_compressed(&self) -> CompressedInteractions {
        CompressedInteractions::from(self)
    }

    /// Size of the user range.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Size of the item range.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// `(num_users, num_items)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }
}

impl From<Vec<Interaction>> for Interactions {
    fn from(data: Vec<Interaction>) -> Interactions {
        let num_users = data.iter().map(|x| x.user_id() + 1).max().unwrap_or(0);
        let num_items = data.iter().map(|x| x.item_id() + 1).max().unwrap_or(0);

        Interactions {
            num_users: num_users,
            num_items: num_items,
            interactions: data,
        }
    }
}

/// Interactions grouped by user, in compressed sparse row layout.
///
/// Within a user, interactions keep their input order.
#[derive(Clone, Debug)]
pub struct CompressedInteractions {
    num_users: usize,
    num_items: usize,
    user_pointers: Vec<usize>,
    item_ids: Vec<ItemId>,
    ratings: Vec<Option<f32>>,
}

impl<'a> From<&'a Interactions> for CompressedInteractions {
    fn from(interactions: &Interactions) -> CompressedInteractions {
        let mut data = interactions.data().to_owned();

        data.sort_by_key(|x| x.user_id());

        let mut user_pointers = vec![0; interactions.num_users + 1];
        let mut item_ids = Vec::with_capacity(data.len());
        let mut ratings = Vec::with_capacity(data.len());

        for datum in &data {
            item_ids.push(datum.item_id());
            ratings.push(datum.rating());

            user_pointers[datum.user_id() + 1] += 1;
        }

        for idx in 1..user_pointers.len() {
            user_pointers[idx] += user_pointers[idx - 1];
        }

        CompressedInteractions {
            num_users: interactions.num_users,
            num_items: interactions.num_items,
            user_pointers: user_pointers,
            item_ids: item_ids,
            ratings: ratings,
        }
    }
}

impl CompressedInteractions {
    /// Iterate over all users in the user range, including those
    /// without interactions.
    pub fn iter_users(&self) -> CompressedInteractionsUserIterator {
        CompressedInteractionsUserIterator {
            interactions: &self,
            idx: 0,
        }
    }

    /// Interactions of a single user; `None` if out of range.
    pub fn get_user(&self, user_id: UserId) -> Option<CompressedInteractionsUser> {
        if user_id >= self.num_users {
            return None;
        }

        let start = self.user_pointers[user_id];
        let stop = self.user_pointers[user_id + 1];

        Some(CompressedInteractionsUser {
            user_id: user_id,
            item_ids: &self.item_ids[start..stop],
            ratings: &self.ratings[start..stop],
        })
    }

    /// Item ids of a user; empty if the user is unknown.
    pub fn user_items(&self, user_id: UserId) -> &[ItemId] {
        match self.get_user(user_id) {
            Some(user) => user.item_ids,
            None => &[],
        }
    }

    /// Total number of interactions.
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    /// Whether there are no interactions.
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Size of the user range.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Size of the item range.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// `(num_users, num_items)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }
}

/// Iterator over the users of a `CompressedInteractions`.
pub struct CompressedInteractionsUserIterator<'a> {
    interactions: &'a CompressedInteractions,
    idx: usize,
}

/// One user's interactions.
#[derive(Debug)]
pub struct CompressedInteractionsUser<'a> {
    /// The user.
    pub user_id: UserId,
    /// Items, in input order.
    pub item_ids: &'a [ItemId],
    /// Ratings aligned with `item_ids`.
    pub ratings: &'a [Option<f32>],
}

impl<'a> Iterator for CompressedInteractionsUserIterator<'a> {
    type Item = CompressedInteractionsUser<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        let value = if self.idx >= self.interactions.num_users {
            None
        } else {
            let start = self.interactions.user_pointers[self.idx];
            let stop = self.interactions.user_pointers[self.idx + 1];

            Some(CompressedInteractionsUser {
                user_id: self.idx,
                item_ids: &self.interactions.item_ids[start..stop],
                ratings: &self.interactions.ratings[start..stop],
            })
        };

        self.idx += 1;

        value
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    fn sorted_pairs(interactions: &[Interaction]) -> Vec<(UserId, ItemId)> {
        let mut pairs: Vec<_> = interactions
            .iter()
            .map(|x| (x.user_id(), x.item_id()))
            .collect();
        pairs.sort();
        pairs
    }

    fn user_counts(interactions: &Interactions) -> HashMap<UserId, usize> {
        let mut counts = HashMap::new();
        for interaction in interactions.data() {
            *counts.entry(interaction.user_id()).or_insert(0) += 1;
        }
        counts
    }

    fn dataset() -> Interactions {
        let mut interactions = Interactions::new(0, 0);

        // User 0 has a single interaction, the rest have between 2 and 11.
        interactions.push(Interaction::new(0, 3, Some(4.0)));
        for user_id in 1..20 {
            for item_id in 0..(user_id % 10 + 2) {
                interactions.push(Interaction::new(user_id, item_id, None));
            }
        }

        interactions
    }

    fn arbitrary_interactions() -> impl Strategy<Value = Vec<Interaction>> {
        prop::collection::vec((0..30usize, 0..50usize), 1..300).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(user_id, item_id)| Interaction::new(user_id, item_id, None))
                .collect()
        })
    }

    #[test]
    fn held_out_counts() {
        assert_eq!(held_out_count(0.2, 5), 1);
        assert_eq!(held_out_count(0.7, 10), 7);
        assert_eq!(held_out_count(0.25, 5), 2);
        assert_eq!(held_out_count(0.5, 1), 0);
        assert_eq!(held_out_count(0.9, 2), 1);
        assert_eq!(held_out_count(0.01, 3), 1);
    }

    #[test]
    fn ceil_fraction_of_large_counts() {
        assert_eq!(ceil_fraction(0.5, 2_000_002), 1_000_001);
        assert_eq!(ceil_fraction(0.5, 2_000_003), 1_000_002);
        assert_eq!(ceil_fraction(0.2, 5_000_000), 1_000_000);
        assert_eq!(ceil_fraction(0.2, 5_000_001), 1_000_001);
        assert_eq!(ceil_fraction(0.7, 10), 7);
        assert_eq!(ceil_fraction(0.2, 0), 0);
    }

    #[test]
    fn stratified_split_holds_out_per_user() {
        let data = dataset();
        let (train, test) = user_stratified_split(&data, 0.2, 42).unwrap();

        let train_counts = user_counts(&train);
        let test_counts = user_counts(&test);

        for (user_id, total) in user_counts(&data) {
            let expected = held_out_count(0.2, total);
            assert_eq!(test_counts.get(&user_id).cloned().unwrap_or(0), expected);
            assert_eq!(train_counts[&user_id], total - expected);
        }
    }

    #[test]
    fn single_interaction_users_stay_in_train() {
        let data = dataset();
        let (train, test) = user_stratified_split(&data, 0.5, 7).unwrap();

        assert!(train.data().iter().any(|x| x.user_id() == 0));
        assert!(test.data().iter().all(|x| x.user_id() != 0));
    }

    #[test]
    fn split_preserves_shape() {
        let data = dataset();
        let (train, test) = user_stratified_split(&data, 0.3, 1).unwrap();

        assert_eq!(train.shape(), data.shape());
        assert_eq!(test.shape(), data.shape());
    }

    #[test]
    fn invalid_fraction() {
        let data = dataset();

        for &fraction in &[0.0, 1.0, -0.5, 1.5, ::std::f32::NAN] {
            match user_stratified_split(&data, fraction, 0) {
                Err(EvaluationError::InvalidFraction { .. }) => {}
                other => panic!("Expected InvalidFraction, got {:?}", other.map(|_| ())),
            }
        }

        let mut data = dataset();
        assert!(train_test_split(&mut data, &mut seeded_rng(0), 1.0).is_err());
    }

    #[test]
    fn max_num_users_limits_test_users() {
        let data = dataset();
        let (train, test) = StratifiedSplit::new(0.2)
            .seed(3)
            .max_num_users(Some(5))
            .split(&data)
            .unwrap();

        assert_eq!(test.users().len(), 5);
        assert_eq!(train.users(), data.users());
        assert_eq!(train.len() + test.len(), data.len());
    }

    #[test]
    fn different_seeds_differ() {
        let data = dataset();
        let (_, first) = user_stratified_split(&data, 0.5, 1).unwrap();
        let (_, second) = user_stratified_split(&data, 0.5, 2).unwrap();

        assert_ne!(sorted_pairs(first.data()), sorted_pairs(second.data()));
    }

    #[test]
    fn random_split_sizes() {
        let mut data = dataset();
        let total = data.len();
        let (train, test) = train_test_split(&mut data, &mut seeded_rng(0), 0.2).unwrap();

        assert_eq!(test.len(), (0.2 * total as f32) as usize);
        assert_eq!(train.len() + test.len(), total);
        assert_eq!(
            sorted_pairs(&[train.data(), test.data()].concat()),
            sorted_pairs(dataset().data())
        );
    }

    #[test]
    fn compressed_view() {
        let data = Interactions::from(vec![
            Interaction::new(2, 1, Some(3.0)),
            Interaction::new(0, 4, None),
            Interaction::new(2, 0, Some(5.0)),
        ]);
        let compressed = data.to_compressed();

        assert_eq!(compressed.shape(), (3, 5));
        assert_eq!(compressed.len(), 3);
        assert_eq!(compressed.user_items(0), &[4]);
        assert!(compressed.user_items(1).is_empty());
        assert_eq!(compressed.user_items(2), &[1, 0]);
        assert!(compressed.user_items(10).is_empty());

        let user = compressed.get_user(2).unwrap();
        assert_eq!(user.ratings, &[Some(3.0), Some(5.0)]);
        assert_eq!(compressed.iter_users().count(), 3);
    }

    #[test]
    fn empty_interactions() {
        let data = Interactions::from(Vec::new());

        assert!(data.is_empty());
        assert_eq!(data.shape(), (0, 0));
        assert!(data.to_compressed().is_empty());
    }

    proptest! {
        #[test]
        fn split_partitions_input(
            interactions in arbitrary_interactions(),
            fraction in 0.01f32..0.99,
            seed in any::<u64>(),
        ) {
            let data = Interactions::from(interactions);
            let (train, test) = user_stratified_split(&data, fraction, seed).unwrap();

            prop_assert_eq!(train.len() + test.len(), data.len());
            prop_assert_eq!(
                sorted_pairs(&[train.data(), test.data()].concat()),
                sorted_pairs(data.data())
            );
            prop_assert_eq!(train.users(), data.users());
        }

        #[test]
        fn split_is_deterministic(
            interactions in arbitrary_interactions(),
            fraction in 0.01f32..0.99,
            seed in any::<u64>(),
        ) {
            let data = Interactions::from(interactions);
            let (train_a, test_a) = user_stratified_split(&data, fraction, seed).unwrap();
            let (train_b, test_b) = user_stratified_split(&data, fraction, seed).unwrap();

            prop_assert_eq!(train_a.data(), train_b.data());
            prop_assert_eq!(test_a.data(), test_b.data());
        }
    }
}
