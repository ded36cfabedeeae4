//! Baseline models.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use failure;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json;

use ItemId;

pub mod item_similarity;
pub mod popularity;

/// Item ids of the `k` highest scores, ties broken by lower item id.
/// NaN scores are dropped.
pub(crate) fn top_k<I: IntoIterator<Item = (ItemId, f32)>>(scores: I, k: usize) -> Vec<ItemId> {
    let mut scores: Vec<(ItemId, f32)> = scores
        .into_iter()
        .filter(|&(_, score)| !score.is_nan())
        .collect();

    scores.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    scores.into_iter().take(k).map(|(item_id, _)| item_id).collect()
}

/// Save a fitted model as JSON.
pub fn save<T: Serialize, P: AsRef<Path>>(model: &T, path: P) -> Result<(), failure::Error> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, model)?;

    Ok(())
}

/// Load a model saved with `save`.
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, failure::Error> {
    let reader = BufReader::new(File::open(path)?);

    Ok(serde_json::from_reader(reader)?)
}
