//! Native estimators: trees, forests, boosting, linear models and ensembles.
//!
//! Fitting goes through an [`EstimatorSpec`], a serializable recipe that
//! produces a fitted [`Model`]. Every fitted model implements [`Estimator`],
//! which is the only interface the trainer and the gateway use for prediction.
//!
//! ```rust,ignore
//! use agrisense_learning::estimators::{EstimatorSpec, Estimator, TargetData};
//!
//! let spec = EstimatorSpec::Ridge { alpha: 0.1 };
//! let model = spec.fit(&rows, &TargetData::Continuous(y), 42)?;
//! let output = model.predict_row(&rows[0]);
//! ```

pub mod boosting;
pub mod ensemble;
pub mod forest;
pub mod linear;
pub mod tree;

pub use boosting::GradientBoosting;
pub use ensemble::{Stacking, Voting};
pub use forest::{ClassWeight, Forest, ForestParams};
pub use linear::{LogisticRegression, Ridge};
pub use tree::{DecisionTree, MaxFeatures, Splitter, TreeParams};

use crate::error::{AgriLearningError, Result};
use agrisense_processing::{ProblemType, TargetValues};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Training targets for one fit.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetData {
    Continuous(Vec<f64>),
    Classes { labels: Vec<usize>, n_classes: usize },
}

impl TargetData {
    pub fn len(&self) -> usize {
        match self {
            TargetData::Continuous(y) => y.len(),
            TargetData::Classes { labels, .. } => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn problem_type(&self) -> ProblemType {
        match self {
            TargetData::Continuous(_) => ProblemType::Regression,
            TargetData::Classes { .. } => ProblemType::Classification,
        }
    }

    pub fn n_classes(&self) -> Option<usize> {
        match self {
            TargetData::Continuous(_) => None,
            TargetData::Classes { n_classes, .. } => Some(*n_classes),
        }
    }

    /// The targets at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> TargetData {
        match self {
            TargetData::Continuous(y) => {
                TargetData::Continuous(indices.iter().map(|&i| y[i]).collect())
            }
            TargetData::Classes { labels, n_classes } => TargetData::Classes {
                labels: indices.iter().map(|&i| labels[i]).collect(),
                n_classes: *n_classes,
            },
        }
    }
}

impl From<&TargetValues> for TargetData {
    fn from(values: &TargetValues) -> Self {
        match values {
            TargetValues::Continuous(y) => TargetData::Continuous(y.clone()),
            TargetValues::Classes { encoded, encoder } => TargetData::Classes {
                labels: encoded.clone(),
                n_classes: encoder.len(),
            },
        }
    }
}

/// The rows at `indices`, in that order.
pub fn select_rows(x: &[Vec<f64>], indices: &[usize]) -> Vec<Vec<f64>> {
    indices.iter().map(|&i| x[i].clone()).collect()
}

/// The output of a fitted model for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A regression value.
    Value(f64),
    /// Class probabilities summing to 1.
    Proba(Vec<f64>),
}

impl Output {
    /// The regression value, or the most probable class index.
    pub fn value(&self) -> f64 {
        match self {
            Output::Value(v) => *v,
            Output::Proba(p) => argmax(p) as f64,
        }
    }

    /// Most probable class; lowest index wins ties.
    pub fn class(&self) -> usize {
        match self {
            Output::Value(v) => v.round().max(0.0) as usize,
            Output::Proba(p) => argmax(p),
        }
    }

    pub fn probabilities(&self) -> Option<&[f64]> {
        match self {
            Output::Value(_) => None,
            Output::Proba(p) => Some(p),
        }
    }

    /// Flattened form used as stacking meta features.
    pub(crate) fn meta_features(&self) -> Vec<f64> {
        match self {
            Output::Value(v) => vec![*v],
            Output::Proba(p) => p.clone(),
        }
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best, best_v) }
        })
        .0
}

/// Normalize non-negative scores to sum to 1 (all zeros stay zeros).
pub(crate) fn normalize(mut scores: Vec<f64>) -> Vec<f64> {
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        scores.iter_mut().for_each(|s| *s /= total);
    }
    scores
}

/// Common interface of every fitted model.
pub trait Estimator: Send + Sync {
    /// Stable identifier, e.g. `"random_forest"`.
    fn name(&self) -> &'static str;

    /// Width of the rows the model was fitted on.
    fn n_features(&self) -> usize;

    fn predict_row(&self, row: &[f64]) -> Output;

    /// Per-feature importance, normalized to sum to 1 where defined.
    fn feature_importance(&self) -> Vec<f64>;

    fn predict(&self, rows: &[Vec<f64>]) -> Vec<Output> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// [`predict_row`](Self::predict_row) with a width check.
    fn try_predict_row(&self, row: &[f64]) -> Result<Output> {
        if row.len() != self.n_features() {
            return Err(AgriLearningError::DimensionMismatch {
                expected: self.n_features(),
                actual: row.len(),
            });
        }
        Ok(self.predict_row(row))
    }
}

/// A fitted model of any supported family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    RandomForest(Forest),
    ExtraTrees(Forest),
    GradientBoosting(GradientBoosting),
    Ridge(Ridge),
    LogisticRegression(LogisticRegression),
    Stacking(Stacking),
    Voting(Voting),
}

impl Model {
    fn inner(&self) -> &dyn Estimator {
        match self {
            Model::RandomForest(m) | Model::ExtraTrees(m) => m,
            Model::GradientBoosting(m) => m,
            Model::Ridge(m) => m,
            Model::LogisticRegression(m) => m,
            Model::Stacking(m) => m,
            Model::Voting(m) => m,
        }
    }
}

impl Estimator for Model {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict_row(&self, row: &[f64]) -> Output {
        self.inner().predict_row(row)
    }

    fn feature_importance(&self) -> Vec<f64> {
        self.inner().feature_importance()
    }
}

static_assertions::assert_impl_all!(Model: Send, Sync);

/// A recipe for fitting a [`Model`].
///
/// Specs are plain data: the capability set produces them, the trainer fits
/// them, and their JSON form is reported as hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    RandomForest(ForestParams),
    ExtraTrees(ForestParams),
    GradientBoosting {
        rounds: usize,
        learning_rate: f64,
        max_depth: usize,
        subsample: f64,
        min_samples_leaf: usize,
    },
    Ridge {
        alpha: f64,
    },
    LogisticRegression {
        max_iter: usize,
        l2: f64,
    },
    Stacking {
        members: Vec<(String, EstimatorSpec)>,
        meta: Box<EstimatorSpec>,
        folds: usize,
    },
    Voting {
        members: Vec<(String, EstimatorSpec)>,
    },
}

impl EstimatorSpec {
    /// Identifier of the model this spec produces.
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorSpec::RandomForest(_) => "random_forest",
            EstimatorSpec::ExtraTrees(_) => "extra_trees",
            EstimatorSpec::GradientBoosting { .. } => "gradient_boosting",
            EstimatorSpec::Ridge { .. } => "ridge",
            EstimatorSpec::LogisticRegression { .. } => "logistic_regression",
            EstimatorSpec::Stacking { .. } => "stacking",
            EstimatorSpec::Voting { .. } => "voting",
        }
    }

    /// The recipe's parameters as a flat JSON map, without the `kind` tag.
    pub fn hyperparameters(&self) -> BTreeMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => {
                map.into_iter().filter(|(k, _)| k != "kind").collect()
            }
            _ => BTreeMap::new(),
        }
    }

    /// Fit a model on `x` / `y`. All randomness derives from `seed`.
    pub fn fit(&self, x: &[Vec<f64>], y: &TargetData, seed: u64) -> Result<Model> {
        if x.is_empty() || x.len() != y.len() {
            return Err(AgriLearningError::TrainingFailed(format!(
                "{} needs matching non-empty rows and targets (got {} rows, {} targets)",
                self.name(),
                x.len(),
                y.len()
            )));
        }
        if let TargetData::Classes { n_classes: 0, .. } = y {
            return Err(AgriLearningError::TrainingFailed(
                "classification target has no classes".to_string(),
            ));
        }

        let model = match self {
            EstimatorSpec::RandomForest(params) => {
                Model::RandomForest(Forest::fit("random_forest", params, x, y, seed))
            }
            EstimatorSpec::ExtraTrees(params) => {
                Model::ExtraTrees(Forest::fit("extra_trees", params, x, y, seed))
            }
            EstimatorSpec::GradientBoosting {
                rounds,
                learning_rate,
                max_depth,
                subsample,
                min_samples_leaf,
            } => Model::GradientBoosting(GradientBoosting::fit(
                boosting::BoostingParams {
                    rounds: *rounds,
                    learning_rate: *learning_rate,
                    max_depth: *max_depth,
                    subsample: *subsample,
                    min_samples_leaf: *min_samples_leaf,
                },
                x,
                y,
                seed,
            )),
            EstimatorSpec::Ridge { alpha } => Model::Ridge(Ridge::fit(*alpha, x, y)?),
            EstimatorSpec::LogisticRegression { max_iter, l2 } => {
                Model::LogisticRegression(LogisticRegression::fit(*max_iter, *l2, x, y)?)
            }
            EstimatorSpec::Stacking {
                members,
                meta,
                folds,
            } => Model::Stacking(Stacking::fit(members, meta, *folds, x, y, seed)?),
            EstimatorSpec::Voting { members } => Model::Voting(Voting::fit(members, x, y, seed)?),
        };
        Ok(model)
    }
}

#[cfg(test)]
pub(crate) mod test_data {
    /// `y = 3*x0 - 2*x1 + noise-free offset`, with an irrelevant third column.
    pub fn linear_regression(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let a = (i % 10) as f64 / 10.0;
                let b = ((i * 7) % 13) as f64 / 13.0;
                let noise = ((i * 31) % 17) as f64 / 17.0;
                vec![a, b, noise]
            })
            .collect();
        let y = rows.iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 1.0).collect();
        (rows, y)
    }

    /// Three well-separated clusters along the first two columns.
    pub fn three_classes(per_class: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
        let centers = [(0.0, 0.0), (5.0, 5.0), (0.0, 10.0)];
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (class, (cx, cy)) in centers.iter().enumerate() {
            for i in 0..per_class {
                let jitter = (i % 5) as f64 * 0.2 - 0.4;
                let jitter2 = ((i * 3) % 7) as f64 * 0.1 - 0.3;
                rows.push(vec![cx + jitter, cy + jitter2, (i % 3) as f64]);
                labels.push(class);
            }
        }
        (rows, labels)
    }

    /// 92 rows of class 0 and 8 of class 1 on one feature. Every row at
    /// `x = 0` is class 0; the 20 rows at `x = 1` hold 12 of class 0 and
    /// all 8 of class 1.
    pub fn imbalanced_overlap() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut rows = vec![vec![0.0]; 80];
        let mut labels = vec![0; 80];
        for i in 0..20 {
            rows.push(vec![1.0]);
            labels.push(usize::from(i % 5 < 2));
        }
        (rows, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_select() {
        let y = TargetData::Classes {
            labels: vec![2, 0, 1, 1],
            n_classes: 3,
        };
        assert_eq!(
            y.select(&[3, 0]),
            TargetData::Classes {
                labels: vec![1, 2],
                n_classes: 3
            }
        );
        assert_eq!(y.problem_type(), ProblemType::Classification);
    }

    #[test]
    fn test_output_class_ties_pick_lowest() {
        let out = Output::Proba(vec![0.4, 0.4, 0.2]);
        assert_eq!(out.class(), 0);
        assert_eq!(out.value(), 0.0);
        assert_eq!(Output::Value(2.4).class(), 2);
    }

    #[test]
    fn test_spec_hyperparameters_drop_kind() {
        let spec = EstimatorSpec::Ridge { alpha: 0.1 };
        let params = spec.hyperparameters();
        assert_eq!(params.get("alpha"), Some(&serde_json::json!(0.1)));
        assert!(!params.contains_key("kind"));
    }

    #[test]
    fn test_fit_rejects_mismatched_rows() {
        let spec = EstimatorSpec::Ridge { alpha: 1.0 };
        let err = spec
            .fit(&[vec![1.0]], &TargetData::Continuous(vec![1.0, 2.0]), 0)
            .unwrap_err();
        assert!(matches!(err, AgriLearningError::TrainingFailed(_)));
    }

    #[test]
    fn test_try_predict_row_checks_width() {
        let (x, y) = test_data::linear_regression(40);
        let model = EstimatorSpec::Ridge { alpha: 0.1 }
            .fit(&x, &TargetData::Continuous(y), 0)
            .unwrap();
        let err = model.try_predict_row(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            AgriLearningError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_model_json_roundtrip_predicts_identically() {
        let (x, y) = test_data::linear_regression(60);
        let spec = EstimatorSpec::GradientBoosting {
            rounds: 20,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 0.8,
            min_samples_leaf: 1,
        };
        let model = spec.fit(&x, &TargetData::Continuous(y), 42).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: Model = serde_json::from_str(&json).unwrap();
        for row in &x {
            assert_eq!(model.predict_row(row), back.predict_row(row));
        }
    }
}
