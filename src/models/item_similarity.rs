//! Item-to-item similarity model.
//!
//! Two items are similar when they are consumed by the same users. For
//! items `i` and `j` with user sets `U_i` and `U_j`:
//!
//! ```text
//! jaccard(i, j) = |U_i ∩ U_j| / |U_i ∪ U_j|
//! cosine(i, j)  = |U_i ∩ U_j| / sqrt(|U_i| * |U_j|)
//! ```
//!
//! Only the `only_top_k` most similar neighbours of every item are kept.
//! A candidate item is scored for a user by its mean similarity to the
//! items in the user's training history; users whose history yields too
//! few candidates are topped up with the most popular items.
use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use data::Interactions;
use super::top_k;
use {FittingError, ItemId, ModelKind, PredictionError, RecommendationModel, UserId};

/// Similarity function between two items.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Similarity {
    /// Intersection over union of the items' user sets.
    Jaccard,
    /// Intersection over the geometric mean of the user set sizes.
    Cosine,
}

impl Similarity {
    fn compute(&self, intersection: usize, num_left: usize, num_right: usize) -> f32 {
        if intersection == 0 {
            return 0.0;
        }

        match *self {
            Similarity::Jaccard => {
                intersection as f32 / (num_left + num_right - intersection) as f32
            }
            Similarity::Cosine => intersection as f32 / ((num_left * num_right) as f32).sqrt(),
        }
    }
}

/// Hyperparameters describing the item similarity model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hyperparameters {
    similarity: Similarity,
    only_top_k: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters::new()
    }
}

impl Hyperparameters {
    /// Jaccard similarity, keeping 64 neighbours per item.
    pub fn new() -> Self {
        Hyperparameters {
            similarity: Similarity::Jaccard,
            only_top_k: 64,
        }
    }

    /// Set the similarity function.
    pub fn similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    /// Set the number of neighbours stored per item.
    pub fn only_top_k(mut self, only_top_k: usize) -> Self {
        self.only_top_k = only_top_k;
        self
    }

    /// Build the (unfitted) model.
    pub fn build(self) -> ItemSimilarityModel {
        ItemSimilarityModel {
            hyper: self,
            user_items: Vec::new(),
            neighbours: Vec::new(),
            popular: Vec::new(),
        }
    }
}

/// Item similarity recommender.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemSimilarityModel {
    hyper: Hyperparameters,
    user_items: Vec<Vec<ItemId>>,
    neighbours: Vec<Vec<(ItemId, f32)>>,
    popular: Vec<ItemId>,
}

fn distinct_lists(pairs: &[(usize, usize)], num_rows: usize) -> Vec<Vec<usize>> {
    let mut lists = vec![Vec::new(); num_rows];

    for &(row, col) in pairs {
        lists[row].push(col);
    }

    for list in &mut lists {
        list.sort();
        list.dedup();
    }

    lists
}

impl ItemSimilarityModel {
    /// Compute item neighbourhoods from `interactions`, replacing any
    /// previous fit.
    pub fn fit(&mut self, interactions: &Interactions) -> Result<(), FittingError> {
        if interactions.is_empty() {
            return Err(FittingError::NoInteractions);
        }

        let (num_users, num_items) = interactions.shape();
        let pairs: Vec<(UserId, ItemId)> = interactions
            .data()
            .iter()
            .map(|x| (x.user_id(), x.item_id()))
            .collect();
        let inverted: Vec<(ItemId, UserId)> = pairs.iter().map(|&(user, item)| (item, user)).collect();

        let user_items = distinct_lists(&pairs, num_users);
        let item_users = distinct_lists(&inverted, num_items);

        let similarity = self.hyper.similarity;
        let only_top_k = self.hyper.only_top_k;

        let neighbours: Vec<Vec<(ItemId, f32)>> = (0..num_items)
            .into_par_iter()
            .map(|item_id| -> Vec<(ItemId, f32)> {
                let mut cooccurrences: HashMap<ItemId, usize> = HashMap::new();

                for &user_id in &item_users[item_id] {
                    for &other_id in &user_items[user_id] {
                        if other_id != item_id {
                            *cooccurrences.entry(other_id).or_insert(0) += 1;
                        }
                    }
                }

                let scores: HashMap<ItemId, f32> = cooccurrences
                    .into_iter()
                    .map(|(other_id, count)| {
                        let value = similarity.compute(
                            count,
                            item_users[item_id].len(),
                            item_users[other_id].len(),
                        );
                        (other_id, value)
                    })
                    .collect();

                top_k(scores.iter().map(|(&other_id, &value)| (other_id, value)), only_top_k)
                    .into_iter()
                    .map(|other_id| (other_id, scores[&other_id]))
                    .collect()
            })
            .collect();

        let popular = top_k(
            item_users
                .iter()
                .enumerate()
                .filter(|&(_, users)| !users.is_empty())
                .map(|(item_id, users)| (item_id, users.len() as f32)),
            num_items,
        );

        debug!(
            num_users,
            num_items,
            similarity = ?similarity,
            only_top_k,
            "fitted item similarity model"
        );

        self.user_items = user_items;
        self.neighbours = neighbours;
        self.popular = popular;

        Ok(())
    }

    fn history(&self, user_id: UserId) -> &[ItemId] {
        self.user_items
            .get(user_id)
            .map(|items| items.as_slice())
            .unwrap_or(&[])
    }

    /// Mean similarity of every candidate to the user's history.
    fn scores(&self, history: &[ItemId]) -> HashMap<ItemId, f32> {
        let mut scores = HashMap::new();

        for &item_id in history {
            for &(other_id, similarity) in &self.neighbours[item_id] {
                *scores.entry(other_id).or_insert(0.0) += similarity;
            }
        }

        for score in scores.values_mut() {
            *score /= history.len() as f32;
        }

        scores
    }

    /// The `k` items most similar to `item_id`, with their similarities.
    pub fn similar_items(
        &self,
        item_id: ItemId,
        k: usize,
    ) -> Result<Vec<(ItemId, f32)>, PredictionError> {
        self.neighbours
            .get(item_id)
            .map(|neighbours| neighbours.iter().take(k).cloned().collect())
            .ok_or(PredictionError::UnknownItem { item_id })
    }
}

impl RecommendationModel for ItemSimilarityModel {
    fn kind(&self) -> ModelKind {
        ModelKind::ItemSimilarity
    }

    fn num_items(&self) -> usize {
        self.neighbours.len()
    }

    /// Items the user has not consumed, by similarity to those they have.
    fn recommend(&self, user_id: UserId, k: usize) -> Result<Vec<ItemId>, PredictionError> {
        let history = self.history(user_id);
        let known: HashSet<ItemId> = history.iter().cloned().collect();

        let scores = self.scores(history);
        let mut recommendations = top_k(
            scores
                .into_iter()
                .filter(|&(item_id, score)| score > 0.0 && !known.contains(&item_id)),
            k,
        );

        if recommendations.len() < k {
            let chosen: HashSet<ItemId> = recommendations.iter().cloned().collect();
            let fill = k - recommendations.len();

            recommendations.extend(
                self.popular
                    .iter()
                    .filter(|&item_id| !known.contains(item_id) && !chosen.contains(item_id))
                    .take(fill)
                    .cloned(),
            );
        }

        Ok(recommendations)
    }

    /// Mean similarity of `item_id` to the user's history.
    fn predict(&self, user_id: UserId, item_id: ItemId) -> Result<f32, PredictionError> {
        if item_id >= self.neighbours.len() {
            return Err(PredictionError::UnknownItem { item_id });
        }

        let history = self.history(user_id);
        if history.is_empty() {
            return Ok(0.0);
        }

        let total: f32 = history
            .iter()
            .filter_map(|&known_id| {
                self.neighbours[known_id]
                    .iter()
                    .find(|&&(other_id, _)| other_id == item_id)
                    .map(|&(_, similarity)| similarity)
            })
            .sum();

        Ok(total / history.len() as f32)
    }
}
