//! Common types used throughout the agrisense-learning crate.
//!
//! # Overview
//!
//! - [`ModelSource`]: which training profile produced a bundle
//! - [`PerformanceMetrics`]: evaluation metrics stored in every bundle
//! - [`ModelComparison`]: per-member scores of an ensemble
//! - [`TrainingResult`]: outcome of training one (task, source) pair
//! - [`TrainingReport`]: outcome of a whole run, with partial success

use agrisense_processing::Task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The training profile a bundle came from.
///
/// The gateway prefers [`Optimized`](Self::Optimized) and falls back to
/// [`Fallback`](Self::Fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Optimized,
    Fallback,
}

impl ModelSource {
    /// Resolution order used by the gateway.
    pub const PRIORITY: [ModelSource; 2] = [ModelSource::Optimized, ModelSource::Fallback];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSource::Optimized => "optimized",
            ModelSource::Fallback => "fallback",
        }
    }

    /// Prefix of bundle file names for this source.
    #[must_use]
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ModelSource::Optimized => "optimized",
            ModelSource::Fallback => "enhanced",
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimized" => Ok(ModelSource::Optimized),
            "fallback" | "enhanced" => Ok(ModelSource::Fallback),
            other => Err(format!("unknown model source '{other}'")),
        }
    }
}

/// Metrics from model evaluation, written once at training time.
///
/// Scores are R² for regression tasks and accuracy for classification.
/// Only the extras relevant to the task's problem type are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Name of the fitted estimator, e.g. `"stacking_regressor"`.
    pub estimator: String,

    pub train_score: f64,
    pub test_score: f64,

    /// Mean and standard deviation of k-fold CV on the training split.
    ///
    /// `None` when the training split was too small to fold.
    pub cv_mean: Option<f64>,
    pub cv_std: Option<f64>,

    /// Features kept by the selector, in model input order.
    pub selected_features: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mse: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
}

impl PerformanceMetrics {
    /// The score the gateway reports as confidence: CV mean when available,
    /// test score otherwise, clamped to `[0, 1]`.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.cv_mean.unwrap_or(self.test_score).clamp(0.0, 1.0)
    }
}

/// Comparison data for a single ensemble member.
///
/// # Overfitting Risk
///
/// Computed from the gap between train and test scores:
/// - `"low"`: gap < 5%
/// - `"medium"`: gap 5-15%
/// - `"high"`: gap > 15%
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ModelComparison {
    pub name: String,
    pub test_score: f64,
    pub train_score: f64,
    pub training_time_seconds: f64,
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
    pub overfitting_risk: String,
}

impl ModelComparison {
    pub(crate) fn new(
        name: impl Into<String>,
        train_score: f64,
        test_score: f64,
        training_time_seconds: f64,
        hyperparameters: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            test_score,
            train_score,
            training_time_seconds,
            hyperparameters,
            overfitting_risk: crate::evaluation::overfitting_risk(train_score, test_score)
                .to_string(),
        }
    }
}

/// Result of training one task with one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TrainingResult {
    pub task: Task,
    pub model_source: ModelSource,

    /// If `false`, `warnings` carries the failure message.
    pub success: bool,

    /// Estimator name of the fitted model; empty on failure.
    pub best_model_name: String,

    /// `None` when training failed.
    pub metrics: Option<PerformanceMetrics>,

    /// Feature importance of the fitted model, sorted descending.
    pub feature_importance: Vec<(String, f64)>,

    pub model_comparison: Vec<ModelComparison>,
    pub training_rows: usize,
    pub training_time_seconds: f64,
    pub warnings: Vec<String>,
}

impl TrainingResult {
    pub(crate) fn failed(
        task: Task,
        model_source: ModelSource,
        message: impl Into<String>,
        training_time_seconds: f64,
    ) -> Self {
        Self {
            task,
            model_source,
            success: false,
            best_model_name: String::new(),
            metrics: None,
            feature_importance: Vec::new(),
            model_comparison: Vec::new(),
            training_rows: 0,
            training_time_seconds,
            warnings: vec![message.into()],
        }
    }
}

/// Outcome of a [`Trainer::train_all`](crate::Trainer::train_all) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub results: Vec<TrainingResult>,
    pub total_time_seconds: f64,
}

impl TrainingReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &TrainingResult> {
        self.results.iter().filter(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TrainingResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// At least one result succeeded.
    #[must_use]
    pub fn any_success(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }

    /// Some but not all results succeeded.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.any_success() && self.results.iter().any(|r| !r.success)
    }

    #[must_use]
    pub fn get(&self, task: Task, source: ModelSource) -> Option<&TrainingResult> {
        self.results
            .iter()
            .find(|r| r.task == task && r.model_source == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_source_names() {
        assert_eq!(ModelSource::Optimized.file_prefix(), "optimized");
        assert_eq!(ModelSource::Fallback.file_prefix(), "enhanced");
        assert_eq!(ModelSource::Fallback.as_str(), "fallback");
        assert_eq!("enhanced".parse::<ModelSource>(), Ok(ModelSource::Fallback));
        assert!("cloud".parse::<ModelSource>().is_err());
    }

    #[test]
    fn test_confidence_prefers_cv_and_clamps() {
        let mut metrics = PerformanceMetrics {
            test_score: 0.7,
            cv_mean: Some(0.91),
            ..Default::default()
        };
        assert_eq!(metrics.confidence(), 0.91);

        metrics.cv_mean = None;
        assert_eq!(metrics.confidence(), 0.7);

        metrics.test_score = -0.4;
        assert_eq!(metrics.confidence(), 0.0);
    }

    #[test]
    fn test_metrics_skip_absent_extras() {
        let metrics = PerformanceMetrics {
            estimator: "random_forest".to_string(),
            mse: Some(0.01),
            ..Default::default()
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json.get("mse").is_some());
        assert!(json.get("accuracy").is_none());

        let back: PerformanceMetrics = serde_json::from_value(json).unwrap();
        assert_eq!(back, metrics);
    }

    #[test]
    fn test_report_partial_success() {
        let ok = TrainingResult {
            success: true,
            ..TrainingResult::failed(Task::CropHealth, ModelSource::Optimized, "", 0.0)
        };
        let failed =
            TrainingResult::failed(Task::Fertilizer, ModelSource::Optimized, "no data", 0.0);
        let report = TrainingReport {
            results: vec![ok, failed],
            total_time_seconds: 1.0,
        };

        assert!(report.any_success());
        assert!(report.is_partial());
        assert_eq!(report.failed().count(), 1);
        assert!(report.get(Task::Fertilizer, ModelSource::Optimized).is_some());
        assert!(report.get(Task::Fertilizer, ModelSource::Fallback).is_none());
    }
}
