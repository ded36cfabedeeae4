//! Evaluation of top-K recommendations.
//!
//! The central quantity is the precision/recall curve: for every user
//! with held-out interactions the model is asked for a ranking, and the
//! fraction of the top `k` that was held out (precision) and the fraction
//! of held-out items found in the top `k` (recall) are computed at each
//! cutoff. Users contribute equally to the averages, whatever the size of
//! their history.
use std::collections::HashSet;
use std::hash::Hasher;

use itertools::Itertools;
use rand::Rng;
use rayon::prelude::*;
use siphasher::sip::SipHasher;

use data::{ceil_fraction, seeded_rng, CompressedInteractions, Interactions};
use {ItemId, ModelKind, PredictionError, RecommendationModel, UserId};

/// Evaluation error types.
#[derive(Debug, Fail)]
pub enum EvaluationError {
    /// A fraction parameter is out of range.
    #[fail(display = "Invalid fraction {}: must lie strictly between 0 and 1.", fraction)]
    InvalidFraction {
        /// The offending value.
        fraction: f32,
    },
    /// No cutoffs to evaluate at.
    #[fail(display = "At least one cutoff is required.")]
    InvalidCutoffs,
    /// The model failed to answer a query.
    #[fail(display = "Model query failed for user {}: {}", user_id, cause)]
    ModelQuery {
        /// User being queried.
        user_id: UserId,
        /// Underlying failure.
        #[cause]
        cause: PredictionError,
    },
    /// The model returned a duplicated or out-of-range item.
    #[fail(display = "Malformed ranking for user {}: item {} is duplicated or out of range.",
           user_id, item_id)]
    MalformedRanking {
        /// User being queried.
        user_id: UserId,
        /// Offending item.
        item_id: ItemId,
    },
    /// Nothing to evaluate on.
    #[fail(display = "No users with held-out interactions to evaluate.")]
    EmptyTestSet,
    /// A curve needs at least two points to have an area.
    #[fail(display = "Cannot compute the area under a curve of {} points.", num_points)]
    DegenerateCurve {
        /// Number of points supplied.
        num_points: usize,
    },
}

/// Cutoffs used unless configured otherwise: 1 to 10, then every fifth
/// value up to 46.
pub fn default_cutoffs() -> Vec<usize> {
    (1..11).chain((11..50).step_by(5)).collect()
}

/// Precision and recall of one ranking at one cutoff.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallPoint {
    /// Number of top-ranked items considered.
    pub cutoff: usize,
    /// Fraction of the top `cutoff` items that were held out.
    pub precision: f32,
    /// Fraction of held-out items found in the top `cutoff`.
    pub recall: f32,
}

/// Precision/recall of a single user at every cutoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserPrecisionRecall {
    /// The user.
    pub user_id: UserId,
    /// Number of distinct held-out items.
    pub num_test_items: usize,
    /// One point per cutoff, ascending.
    pub points: Vec<PrecisionRecallPoint>,
}

/// Precision and recall averaged over users, one point per cutoff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    points: Vec<PrecisionRecallPoint>,
    num_users: usize,
}

impl PrecisionRecallCurve {
    /// Build a curve from already aggregated points. Points are ordered
    /// by cutoff.
    pub fn from_points(mut points: Vec<PrecisionRecallPoint>, num_users: usize) -> Self {
        points.sort_by_key(|point| point.cutoff);

        PrecisionRecallCurve { points, num_users }
    }

    fn from_users(cutoffs: &[usize], users: &[UserPrecisionRecall]) -> Self {
        let num_users = users.len() as f32;

        let points = cutoffs
            .iter()
            .enumerate()
            .map(|(idx, &cutoff)| {
                let precision = users.iter().map(|user| user.points[idx].precision).sum::<f32>();
                let recall = users.iter().map(|user| user.points[idx].recall).sum::<f32>();

                PrecisionRecallPoint {
                    cutoff,
                    precision: precision / num_users,
                    recall: recall / num_users,
                }
            })
            .collect();

        PrecisionRecallCurve {
            points,
            num_users: users.len(),
        }
    }

    /// Points ordered by ascending cutoff.
    pub fn points(&self) -> &[PrecisionRecallPoint] {
        &self.points
    }

    /// Number of users averaged over.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Point at the given cutoff, if evaluated.
    pub fn at(&self, cutoff: usize) -> Option<&PrecisionRecallPoint> {
        self.points.iter().find(|point| point.cutoff == cutoff)
    }

    /// Area under the curve; see `area_under_curve`.
    pub fn auc(&self) -> f32 {
        area_under_curve(self)
    }
}

/// Overall curve together with the per-user breakdown it was computed from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Family of the evaluated model.
    pub kind: ModelKind,
    /// Unweighted mean over users.
    pub overall: PrecisionRecallCurve,
    /// Per-user values, ordered by user id.
    pub by_user: Vec<UserPrecisionRecall>,
}

/// Ask `model` for the `k` best items for `user_id` that are not in `seen`.
///
/// The model is asked for `k + seen.len()` items so that filtering
/// cannot leave the ranking short when the model has enough candidates.
pub fn rank<M: RecommendationModel + ?Sized>(
    model: &M,
    user_id: UserId,
    seen: &[ItemId],
    k: usize,
) -> Result<Vec<ItemId>, EvaluationError> {
    if k == 0 {
        return Ok(Vec::new());
    }

    let seen: HashSet<ItemId> = seen.iter().cloned().collect();
    let candidates = model
        .recommend(user_id, k + seen.len())
        .map_err(|cause| EvaluationError::ModelQuery { user_id, cause })?;

    let num_items = model.num_items();
    let mut returned = HashSet::with_capacity(candidates.len());
    let mut ranking = Vec::with_capacity(k);

    for item_id in candidates {
        if item_id >= num_items || !returned.insert(item_id) {
            return Err(EvaluationError::MalformedRanking { user_id, item_id });
        }

        if ranking.len() < k && !seen.contains(&item_id) {
            ranking.push(item_id);
        }
    }

    Ok(ranking)
}

/// Precision and recall of the first `k` items of `ranking` against
/// the held-out `test_items`.
///
/// Precision is always relative to `k`, even if the ranking is shorter.
/// An item repeated in the ranking counts as a single hit. Both values
/// are zero when `k` is zero or there are no held-out items.
pub fn precision_recall_at_k(
    ranking: &[ItemId],
    test_items: &HashSet<ItemId>,
    k: usize,
) -> PrecisionRecallPoint {
    if k == 0 {
        return PrecisionRecallPoint {
            cutoff: 0,
            precision: 0.0,
            recall: 0.0,
        };
    }

    let hits = ranking
        .iter()
        .take(k)
        .filter(|&item_id| test_items.contains(item_id))
        .collect::<HashSet<_>>()
        .len();

    let recall = if test_items.is_empty() {
        0.0
    } else {
        hits as f32 / test_items.len() as f32
    };

    PrecisionRecallPoint {
        cutoff: k,
        precision: hits as f32 / k as f32,
        recall,
    }
}

/// Trapezoidal area under the (recall, precision) curve, or
/// `DegenerateCurve` if it has fewer than two points.
///
/// Points are sorted by recall; of several points with the same recall
/// only the first (in cutoff order) is used. Points with a non-finite
/// coordinate are ignored. The curve is degenerate if fewer than two
/// distinct recalls remain.
pub fn try_area_under_curve(curve: &PrecisionRecallCurve) -> Result<f32, EvaluationError> {
    let mut points: Vec<(f32, f32)> = curve
        .points()
        .iter()
        .filter(|point| point.recall.is_finite() && point.precision.is_finite())
        .map(|point| (point.recall, point.precision))
        .collect();

    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.dedup_by(|later, earlier| later.0 == earlier.0);

    if points.len() < 2 {
        return Err(EvaluationError::DegenerateCurve {
            num_points: points.len(),
        });
    }

    Ok(points
        .iter()
        .tuple_windows()
        .fold(0.0, |area, (left, right)| {
            area + (right.0 - left.0) * (left.1 + right.1) / 2.0
        }))
}

/// Area under the precision/recall curve; zero for curves with fewer
/// than two points.
pub fn area_under_curve(curve: &PrecisionRecallCurve) -> f32 {
    try_area_under_curve(curve).unwrap_or(0.0)
}

/// Precision/recall evaluation settings.
#[derive(Clone, Debug)]
pub struct Evaluator {
    cutoffs: Vec<usize>,
    user_sample: f32,
    seed: u64,
    exclude_known: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl Evaluator {
    /// Evaluate all users at the default cutoffs, excluding training
    /// items from rankings.
    pub fn new() -> Self {
        Evaluator {
            cutoffs: default_cutoffs(),
            user_sample: 1.0,
            seed: 0,
            exclude_known: true,
        }
    }

    /// Set the cutoffs. Order and duplicates do not matter.
    pub fn cutoffs(mut self, cutoffs: Vec<usize>) -> Self {
        self.cutoffs = cutoffs;
        self
    }

    /// Evaluate on a seeded random sample of this fraction of the test users.
    pub fn user_sample(mut self, user_sample: f32) -> Self {
        self.user_sample = user_sample;
        self
    }

    /// Set the seed used for user sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Whether items from the training set are removed from rankings.
    pub fn exclude_known(mut self, exclude_known: bool) -> Self {
        self.exclude_known = exclude_known;
        self
    }

    fn sorted_cutoffs(&self) -> Result<Vec<usize>, EvaluationError> {
        if self.cutoffs.is_empty() {
            return Err(EvaluationError::InvalidCutoffs);
        }

        let mut cutoffs = self.cutoffs.clone();
        cutoffs.sort();
        cutoffs.dedup();

        Ok(cutoffs)
    }

    /// Users with at least one held-out item, restricted to the sample.
    fn evaluated_users(&self, test: &CompressedInteractions) -> Result<Vec<UserId>, EvaluationError> {
        if !(self.user_sample > 0.0 && self.user_sample <= 1.0) {
            return Err(EvaluationError::InvalidFraction {
                fraction: self.user_sample,
            });
        }

        let mut users: Vec<UserId> = test.iter_users()
            .filter(|user| !user.item_ids.is_empty())
            .map(|user| user.user_id)
            .collect();

        if users.is_empty() {
            return Err(EvaluationError::EmptyTestSet);
        }

        if self.user_sample < 1.0 {
            let mut rng = seeded_rng(self.seed);
            let (key_0, key_1) = (rng.gen::<u64>(), rng.gen::<u64>());
            let num_sampled = ceil_fraction(self.user_sample, users.len())
                .max(1)
                .min(users.len());

            users.sort_by_key(|&user_id| {
                let mut hasher = SipHasher::new_with_keys(key_0, key_1);
                hasher.write_usize(user_id);
                (hasher.finish(), user_id)
            });
            users.truncate(num_sampled);
            users.sort();
        }

        Ok(users)
    }

    /// Compute per-user and overall precision/recall of `model`.
    ///
    /// Every user with held-out items in `test` is ranked once, at the
    /// largest cutoff; smaller cutoffs use prefixes of that ranking.
    pub fn evaluate<M: RecommendationModel + Sync + ?Sized>(
        &self,
        model: &M,
        train: &CompressedInteractions,
        test: &CompressedInteractions,
    ) -> Result<EvaluationReport, EvaluationError> {
        let cutoffs = self.sorted_cutoffs()?;
        let max_cutoff = cutoffs[cutoffs.len() - 1];
        let users = self.evaluated_users(test)?;

        let by_user = users
            .par_iter()
            .map(|&user_id| -> Result<UserPrecisionRecall, EvaluationError> {
                let test_items: HashSet<ItemId> = test.user_items(user_id).iter().cloned().collect();
                let seen: &[ItemId] = if self.exclude_known {
                    train.user_items(user_id)
                } else {
                    &[]
                };

                let ranking = rank(model, user_id, seen, max_cutoff)?;

                Ok(UserPrecisionRecall {
                    user_id,
                    num_test_items: test_items.len(),
                    points: cutoffs
                        .iter()
                        .map(|&k| precision_recall_at_k(&ranking, &test_items, k))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, EvaluationError>>()?;

        let overall = PrecisionRecallCurve::from_users(&cutoffs, &by_user);

        debug!(
            kind = ?model.kind(),
            num_users = by_user.len(),
            num_cutoffs = cutoffs.len(),
            "evaluated precision/recall"
        );

        Ok(EvaluationReport {
            kind: model.kind(),
            overall,
            by_user,
        })
    }

    /// Compute only the overall precision/recall curve of `model`.
    pub fn precision_recall_curve<M: RecommendationModel + Sync + ?Sized>(
        &self,
        model: &M,
        train: &CompressedInteractions,
        test: &CompressedInteractions,
    ) -> Result<PrecisionRecallCurve, EvaluationError> {
        Ok(self.evaluate(model, train, test)?.overall)
    }
}

/// Mean precision/recall of `model` at `cutoffs` over all test users.
pub fn precision_recall_curve<M: RecommendationModel + Sync + ?Sized>(
    model: &M,
    train: &CompressedInteractions,
    test: &CompressedInteractions,
    cutoffs: &[usize],
) -> Result<PrecisionRecallCurve, EvaluationError> {
    Evaluator::new()
        .cutoffs(cutoffs.to_vec())
        .precision_recall_curve(model, train, test)
}

/// A model taking part in a comparison.
pub type NamedModel<'a> = (&'a str, &'a (dyn RecommendationModel + Sync + 'a));

/// One model's result in a comparison.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComparedModel {
    /// Name given by the caller.
    pub name: String,
    /// Family of the model.
    pub kind: ModelKind,
    /// Overall precision/recall curve.
    pub curve: PrecisionRecallCurve,
    /// Area under `curve`.
    pub auc: f32,
}

/// Results of `compare`, in the order the models were given.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelComparison {
    models: Vec<ComparedModel>,
}

impl ModelComparison {
    /// All results, in input order.
    pub fn models(&self) -> &[ComparedModel] {
        &self.models
    }

    /// Result for the model called `name`.
    pub fn get(&self, name: &str) -> Option<&ComparedModel> {
        self.models.iter().find(|model| model.name == name)
    }

    /// The model with the largest area under the curve.
    pub fn best(&self) -> Option<&ComparedModel> {
        self.models
            .iter()
            .max_by(|a, b| a.auc.total_cmp(&b.auc))
    }

    /// Number of models compared.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no models were compared.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Evaluate several models with identical settings on the same data.
pub fn compare(
    models: &[NamedModel],
    train: &CompressedInteractions,
    test: &CompressedInteractions,
    evaluator: &Evaluator,
) -> Result<ModelComparison, EvaluationError> {
    let mut results = Vec::with_capacity(models.len());

    for &(name, model) in models {
        let curve = evaluator.precision_recall_curve(model, train, test)?;
        let auc = area_under_curve(&curve);

        info!(model = name, kind = ?model.kind(), auc, "compared model");

        results.push(ComparedModel {
            name: name.to_owned(),
            kind: model.kind(),
            curve,
            auc,
        });
    }

    Ok(ModelComparison { models: results })
}

/// Root mean squared error of the model's rating estimates on the rated
/// interactions of `test`. Unrated interactions are ignored.
pub fn rmse<M: RecommendationModel + Sync + ?Sized>(
    model: &M,
    test: &Interactions,
) -> Result<f32, EvaluationError> {
    let rated: Vec<(UserId, ItemId, f32)> = test.data()
        .iter()
        .filter_map(|x| x.rating().map(|rating| (x.user_id(), x.item_id(), rating)))
        .collect();

    if rated.is_empty() {
        return Err(EvaluationError::EmptyTestSet);
    }

    let squared_errors = rated
        .par_iter()
        .map(|&(user_id, item_id, rating)| -> Result<f64, EvaluationError> {
            let prediction = model
                .predict(user_id, item_id)
                .map_err(|cause| EvaluationError::ModelQuery { user_id, cause })?;

            if !prediction.is_finite() {
                return Err(EvaluationError::ModelQuery {
                    user_id,
                    cause: PredictionError::InvalidPredictionValue,
                });
            }

            Ok(f64::from(prediction - rating).powi(2))
        })
        .collect::<Result<Vec<f64>, EvaluationError>>()?;

    Ok((squared_errors.iter().sum::<f64>() / squared_errors.len() as f64).sqrt() as f32)
}
