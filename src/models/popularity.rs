//! Popularity model: every user is recommended the items with the most
//! interactions in the training data.
use data::Interactions;
use super::top_k;
use {FittingError, ItemId, ModelKind, PredictionError, RecommendationModel, UserId};

/// Popularity recommender.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PopularityModel {
    counts: Vec<usize>,
    rating_sums: Vec<f32>,
    rating_counts: Vec<usize>,
    ranking: Vec<ItemId>,
}

impl PopularityModel {
    /// Count interactions per item.
    pub fn fit(interactions: &Interactions) -> Result<Self, FittingError> {
        if interactions.is_empty() {
            return Err(FittingError::NoInteractions);
        }

        let num_items = interactions.num_items();
        let mut counts = vec![0; num_items];
        let mut rating_sums = vec![0.0; num_items];
        let mut rating_counts = vec![0; num_items];

        for interaction in interactions.data() {
            let item_id = interaction.item_id();
            counts[item_id] += 1;

            if let Some(rating) = interaction.rating() {
                rating_sums[item_id] += rating;
                rating_counts[item_id] += 1;
            }
        }

        let ranking = top_k(
            counts
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(|(item_id, &count)| (item_id, count as f32)),
            num_items,
        );

        debug!(num_items, num_popular = ranking.len(), "fitted popularity model");

        Ok(PopularityModel {
            counts,
            rating_sums,
            rating_counts,
            ranking,
        })
    }

    /// Number of training interactions with `item_id`.
    pub fn count(&self, item_id: ItemId) -> usize {
        self.counts.get(item_id).cloned().unwrap_or(0)
    }

    /// Mean training rating of `item_id`, if it was ever rated.
    pub fn mean_rating(&self, item_id: ItemId) -> Option<f32> {
        match self.rating_counts.get(item_id) {
            Some(&count) if count > 0 => Some(self.rating_sums[item_id] / count as f32),
            _ => None,
        }
    }

    /// All items with at least one interaction, most popular first.
    pub fn ranking(&self) -> &[ItemId] {
        &self.ranking
    }
}

impl RecommendationModel for PopularityModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Popularity
    }

    fn num_items(&self) -> usize {
        self.counts.len()
    }

    fn recommend(&self, _user_id: UserId, k: usize) -> Result<Vec<ItemId>, PredictionError> {
        Ok(self.ranking.iter().take(k).cloned().collect())
    }

    /// Mean rating of the item if ratings are known, its interaction
    /// count otherwise.
    fn predict(&self, _user_id: UserId, item_id: ItemId) -> Result<f32, PredictionError> {
        if item_id >= self.counts.len() {
            return Err(PredictionError::UnknownItem { item_id });
        }

        Ok(self.mean_rating(item_id)
            .unwrap_or_else(|| self.counts[item_id] as f32))
    }

    /// True if the training data carried ratings.
    fn estimates_ratings(&self) -> bool {
        self.rating_counts.iter().any(|&count| count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data::Interaction;

    fn listens() -> Interactions {
        Interactions::from(vec![
            Interaction::new(0, 2, Some(4.0)),
            Interaction::new(1, 2, Some(2.0)),
            Interaction::new(2, 2, None),
            Interaction::new(0, 0, None),
            Interaction::new(1, 0, None),
            Interaction::new(2, 3, None),
            Interaction::new(0, 4, None),
            Interaction::new(1, 4, None),
        ])
    }

    #[test]
    fn recommends_by_count() {
        let model = PopularityModel::fit(&listens()).unwrap();

        assert_eq!(model.ranking(), &[2, 0, 4, 3]);
        assert_eq!(model.recommend(7, 2).unwrap(), vec![2, 0]);
        assert_eq!(model.recommend(0, 10).unwrap().len(), 4);
        assert_eq!(model.kind(), ModelKind::Popularity);
    }

    #[test]
    fn predictions() {
        let model = PopularityModel::fit(&listens()).unwrap();

        assert_eq!(model.predict(0, 2).unwrap(), 3.0);
        assert_eq!(model.predict(0, 0).unwrap(), 2.0);
        assert_eq!(model.predict(0, 1).unwrap(), 0.0);
        assert!(model.predict(0, 5).is_err());
        assert_eq!(model.count(3), 1);
        assert_eq!(model.mean_rating(4), None);
    }

    #[test]
    fn estimates_ratings_only_when_rated() {
        assert!(PopularityModel::fit(&listens()).unwrap().estimates_ratings());

        let unrated = Interactions::from(vec![Interaction::new(0, 1, None)]);
        assert!(!PopularityModel::fit(&unrated).unwrap().estimates_ratings());
    }

    #[test]
    fn empty_data() {
        assert!(PopularityModel::fit(&Interactions::new(3, 3)).is_err());
    }
}
