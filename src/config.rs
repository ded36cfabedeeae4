//! Experiment configuration.
//!
//! Every field has a default, so a configuration file only needs to list
//! what differs:
//!
//! ```json
//! {
//!     "data_path": "song_data.csv",
//!     "user_column": "user_id",
//!     "item_column": "song",
//!     "rating_column": null,
//!     "user_sample": 0.01
//! }
//! ```
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use failure;
use serde_json;

use data::StratifiedSplit;
use evaluation::{default_cutoffs, Evaluator};
use models::item_similarity::{self, Similarity};

/// Settings for a split/fit/compare run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// CSV file with one interaction per row.
    pub data_path: PathBuf,
    /// User identifier column.
    pub user_column: String,
    /// Item identifier column.
    pub item_column: String,
    /// Rating column, if the data has explicit feedback.
    pub rating_column: Option<String>,
    /// Fraction of each user's interactions held out.
    pub test_fraction: f32,
    /// Seed for splitting and user sampling.
    pub seed: u64,
    /// Hold out interactions for at most this many users.
    pub max_num_users: Option<usize>,
    /// Cutoffs for precision/recall.
    pub cutoffs: Vec<usize>,
    /// Fraction of test users to evaluate on.
    pub user_sample: f32,
    /// Item similarity function.
    pub similarity: Similarity,
    /// Neighbours kept per item.
    pub only_top_k: usize,
    /// Where to write the compared curves, if anywhere.
    pub curves_path: Option<PathBuf>,
    /// Directory to save fitted models in, if anywhere.
    pub models_dir: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            data_path: PathBuf::from("ratings.csv"),
            user_column: "userId".to_owned(),
            item_column: "movieId".to_owned(),
            rating_column: Some("rating".to_owned()),
            test_fraction: 0.2,
            seed: 0,
            max_num_users: None,
            cutoffs: default_cutoffs(),
            user_sample: 1.0,
            similarity: Similarity::Jaccard,
            only_top_k: 64,
            curves_path: None,
            models_dir: None,
        }
    }
}

impl ExperimentConfig {
    /// Read a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, failure::Error> {
        let reader = BufReader::new(File::open(path)?);

        Ok(serde_json::from_reader(reader)?)
    }

    /// The configured train/test split.
    pub fn split(&self) -> StratifiedSplit {
        StratifiedSplit::new(self.test_fraction)
            .seed(self.seed)
            .max_num_users(self.max_num_users)
    }

    /// The configured evaluator.
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new()
            .cutoffs(self.cutoffs.clone())
            .user_sample(self.user_sample)
            .seed(self.seed)
    }

    /// The configured item similarity hyperparameters.
    pub fn item_similarity(&self) -> item_similarity::Hyperparameters {
        item_similarity::Hyperparameters::new()
            .similarity(self.similarity)
            .only_top_k(self.only_top_k)
    }

    /// The configured CSV columns.
    #[cfg(feature = "csv")]
    pub fn columns(&self) -> ::datasets::Columns {
        let columns = ::datasets::Columns::new(&self.user_column, &self.item_column);

        match self.rating_column {
            Some(ref rating) => columns.rating(rating),
            None => columns,
        }
    }
}
