#![deny(missing_docs)]
//! # hitlist
//!
//! `hitlist` evaluates recommenders by the quality of their top-K lists:
//! it splits interaction data so that every user keeps part of their
//! history for training, asks a model for recommendations, and summarises
//! how many held-out items those recommendations recover as
//! precision/recall curves and the area under them.
//!
//! Any model implementing [`RecommendationModel`](trait.RecommendationModel.html)
//! can be evaluated; popularity and item-similarity baselines are provided
//! in [`models`](models/index.html).
//!
//! ## Example
//!
//! ```rust
//! # extern crate hitlist;
//! use hitlist::data::{user_stratified_split, Interaction, Interactions};
//! use hitlist::evaluation::{area_under_curve, Evaluator};
//! use hitlist::models::popularity::PopularityModel;
//!
//! let interactions: Vec<Interaction> = (0..20)
//!     .flat_map(|user| (0..5).map(move |item| Interaction::new(user, (user + item) % 8, None)))
//!     .collect();
//! let data = Interactions::from(interactions);
//!
//! let (train, test) = user_stratified_split(&data, 0.2, 42).unwrap();
//! let model = PopularityModel::fit(&train).unwrap();
//!
//! let curve = Evaluator::new()
//!     .cutoffs(vec![1, 2, 5])
//!     .precision_recall_curve(&model, &train.to_compressed(), &test.to_compressed())
//!     .unwrap();
//!
//! println!("Popularity AUC: {}", area_under_curve(&curve));
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate failure;
extern crate itertools;
extern crate rand;
extern crate rayon;
extern crate serde;
extern crate serde_json;
extern crate siphasher;
#[macro_use]
extern crate tracing;

#[cfg(feature = "csv")]
extern crate csv;

#[cfg(test)]
#[macro_use]
extern crate proptest;

pub mod config;
pub mod data;
#[cfg(feature = "csv")]
pub mod datasets;
pub mod evaluation;
pub mod models;
#[cfg(feature = "csv")]
pub mod report;

/// Alias for user indices.
pub type UserId = usize;
/// Alias for item indices.
pub type ItemId = usize;

/// Prediction error types.
#[derive(Debug, Fail)]
pub enum PredictionError {
    /// Failed prediction due to numerical issues.
    #[fail(display = "Invalid prediction value: non-finite or not a number.")]
    InvalidPredictionValue,
    /// The item is outside of the range the model was fitted on.
    #[fail(display = "Unknown item: {}.", item_id)]
    UnknownItem {
        /// Offending item.
        item_id: ItemId,
    },
    /// The model does not produce rating estimates.
    #[fail(display = "Model does not support rating prediction.")]
    Unsupported,
}

/// Fitting error types.
#[derive(Debug, Fail)]
pub enum FittingError {
    /// No interactions to fit on.
    #[fail(display = "No interactions present.")]
    NoInteractions,
}

/// The family a model belongs to.
///
/// Chosen by whoever builds the model; the evaluator only uses it for
/// reporting.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Recommends the most frequently consumed items to everyone.
    Popularity,
    /// Recommends items similar to the ones the user consumed.
    ItemSimilarity,
    /// Anything else.
    Other,
}

/// Trait describing models that can produce top-K recommendations.
pub trait RecommendationModel {
    /// The family of the model.
    fn kind(&self) -> ModelKind;
    /// Number of items the model knows about. Item ids returned by
    /// `recommend` are always smaller than this.
    fn num_items(&self) -> usize;
    /// Return up to `k` item ids, best first, for `user_id`.
    ///
    /// Implementations are not required to filter out items the user
    /// already interacted with.
    fn recommend(&self, user_id: UserId, k: usize) -> Result<Vec<ItemId>, PredictionError>;
    /// Estimate the rating `user_id` would give `item_id`.
    fn predict(&self, _user_id: UserId, _item_id: ItemId) -> Result<f32, PredictionError> {
        Err(PredictionError::Unsupported)
    }
    /// Whether `predict` returns values on the scale of the training
    /// ratings, so that an error against held-out ratings is meaningful.
    fn estimates_ratings(&self) -> bool {
        false
    }
}
