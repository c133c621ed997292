//! Configuration types for the training pipeline.
//!
//! This module provides [`TrainerConfig`] and its builder, plus the
//! [`EnsembleParams`] shared by every estimator the trainer builds.
//!
//! # Example
//!
//! ```
//! use agrisense_learning::{Task, TrainerConfig};
//!
//! let config = TrainerConfig::builder()
//!     .cv_folds(5)
//!     .test_size(0.2)
//!     .select_k(Task::CropHealth, 10)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.k_for(Task::CropHealth), 10);
//! ```

use crate::error::{AgriLearningError, Result};
use crate::estimators::{ClassWeight, MaxFeatures};
use agrisense_processing::{PreparationConfig, Task};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tree settings of one forest member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestMemberParams {
    pub n_trees: usize,

    /// Depth limit; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,

    pub min_samples_split: usize,

    pub min_samples_leaf: usize,

    /// Features tried per split by regression forests. Classification
    /// forests always try `sqrt(n_features)`.
    pub max_features: MaxFeatures,
}

impl ForestMemberParams {
    fn validate(&self, member: &str) -> Result<()> {
        if self.n_trees == 0 {
            return Err(AgriLearningError::InvalidConfig(format!(
                "{member}.n_trees must be at least 1"
            )));
        }
        if self.max_depth == Some(0) {
            return Err(AgriLearningError::InvalidConfig(format!(
                "{member}.max_depth must be at least 1"
            )));
        }
        if self.min_samples_split < 2 {
            return Err(AgriLearningError::InvalidConfig(format!(
                "{member}.min_samples_split must be at least 2"
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(AgriLearningError::InvalidConfig(format!(
                "{member}.min_samples_leaf must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Settings of the gradient boosting member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingMemberParams {
    pub rounds: usize,

    /// Shrinkage applied to each stage.
    pub learning_rate: f64,

    pub max_depth: usize,

    /// Row fraction sampled per round.
    pub subsample: f64,

    pub min_samples_leaf: usize,
}

/// Hyperparameters of the ensemble members and meta-learners.
///
/// Every member has its own block so the forests can differ in depth and
/// split sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleParams {
    /// Random forest member (default: 200 trees, depth 15, split 5, leaf 2, sqrt).
    pub random_forest: ForestMemberParams,

    /// Extra trees member (default: 200 trees, depth 20, split 3, leaf 1).
    pub extra_trees: ForestMemberParams,

    /// Gradient boosting member (default: 150 rounds, rate 0.1, depth 8, subsample 0.8).
    pub gradient_boosting: BoostingMemberParams,

    /// The single random forest of fallback bundles (default: 100 unlimited trees).
    pub fallback_forest: ForestMemberParams,

    /// Class weighting of classification forests (default: balanced).
    pub class_weight: ClassWeight,

    /// L2 penalty of the ridge meta-learner (default: 0.1).
    pub ridge_alpha: f64,

    /// Iterations of the logistic meta-learner (default: 1000).
    pub logistic_max_iter: usize,

    /// Folds used to build out-of-fold meta features (default: 5).
    pub stacking_folds: usize,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            random_forest: ForestMemberParams {
                n_trees: 200,
                max_depth: Some(15),
                min_samples_split: 5,
                min_samples_leaf: 2,
                max_features: MaxFeatures::Sqrt,
            },
            extra_trees: ForestMemberParams {
                n_trees: 200,
                max_depth: Some(20),
                min_samples_split: 3,
                min_samples_leaf: 1,
                max_features: MaxFeatures::All,
            },
            gradient_boosting: BoostingMemberParams {
                rounds: 150,
                learning_rate: 0.1,
                max_depth: 8,
                subsample: 0.8,
                min_samples_leaf: 1,
            },
            fallback_forest: ForestMemberParams {
                n_trees: 100,
                max_depth: None,
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features: MaxFeatures::All,
            },
            class_weight: ClassWeight::Balanced,
            ridge_alpha: 0.1,
            logistic_max_iter: 1000,
            stacking_folds: 5,
        }
    }
}

/// Configuration for the [`Trainer`](crate::trainer::Trainer).
///
/// Use [`TrainerConfig::builder()`] to construct a validated configuration, or
/// [`TrainerConfig::from_json_file`] to read one the CLI was given.
///
/// # Validation
///
/// [`build()`](TrainerConfigBuilder::build) checks:
/// - `test_size` must be in range `(0.0, 1.0)` (exclusive)
/// - `cv_folds` must be at least 2
/// - every per-task `k` must be at least 1
/// - every member needs at least one tree or round, `min_samples_split >= 2`
///   and `min_samples_leaf >= 1`; `learning_rate` and `subsample` in `(0, 1]`
/// - the embedded [`PreparationConfig`] must itself be valid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Fraction of rows held out for testing (default: 0.2).
    pub test_size: f64,

    /// Number of cross-validation folds (default: 5).
    pub cv_folds: u32,

    /// Seed for every random draw during training (default: 42).
    pub random_seed: u64,

    /// Features kept by univariate selection, per task.
    ///
    /// Tasks without an entry use [`Task::default_select_k`].
    pub select_k: BTreeMap<Task, usize>,

    /// Ensemble hyperparameters.
    pub ensemble: EnsembleParams,

    /// Table preparation settings.
    pub preparation: PreparationConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            cv_folds: 5,
            random_seed: 42,
            select_k: Task::ALL
                .iter()
                .map(|task| (*task, task.default_select_k()))
                .collect(),
            ensemble: EnsembleParams::default(),
            preparation: PreparationConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Create a new builder for `TrainerConfig`.
    #[must_use]
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }

    /// Configured selection size for `task`.
    pub fn k_for(&self, task: Task) -> usize {
        self.select_k
            .get(&task)
            .copied()
            .unwrap_or_else(|| task.default_select_k())
    }

    /// Read a JSON configuration file and validate it.
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: TrainerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every constraint listed on [`TrainerConfig`].
    pub fn validate(&self) -> Result<()> {
        if self.test_size <= 0.0 || self.test_size >= 1.0 {
            return Err(AgriLearningError::InvalidConfig(
                "test_size must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }

        if self.cv_folds < 2 {
            return Err(AgriLearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }

        if let Some((task, _)) = self.select_k.iter().find(|(_, k)| **k == 0) {
            return Err(AgriLearningError::InvalidConfig(format!(
                "select_k for '{task}' must be at least 1"
            )));
        }

        let ensemble = &self.ensemble;
        ensemble.random_forest.validate("random_forest")?;
        ensemble.extra_trees.validate("extra_trees")?;
        ensemble.fallback_forest.validate("fallback_forest")?;

        let boosting = &ensemble.gradient_boosting;
        if boosting.rounds == 0 || boosting.max_depth == 0 || boosting.min_samples_leaf == 0 {
            return Err(AgriLearningError::InvalidConfig(
                "gradient_boosting rounds, max_depth and min_samples_leaf must be at least 1"
                    .to_string(),
            ));
        }
        if !(boosting.learning_rate > 0.0 && boosting.learning_rate <= 1.0) {
            return Err(AgriLearningError::InvalidConfig(
                "gradient_boosting.learning_rate must be in (0.0, 1.0]".to_string(),
            ));
        }
        if !(boosting.subsample > 0.0 && boosting.subsample <= 1.0) {
            return Err(AgriLearningError::InvalidConfig(
                "gradient_boosting.subsample must be in (0.0, 1.0]".to_string(),
            ));
        }
        if ensemble.ridge_alpha < 0.0 {
            return Err(AgriLearningError::InvalidConfig(
                "ridge_alpha must be non-negative".to_string(),
            ));
        }
        if ensemble.stacking_folds < 2 {
            return Err(AgriLearningError::InvalidConfig(
                "stacking_folds must be at least 2".to_string(),
            ));
        }

        self.preparation
            .validate()
            .map_err(|e| AgriLearningError::InvalidConfig(e.to_string()))
    }
}

/// Builder for [`TrainerConfig`].
///
/// Created via [`TrainerConfig::builder()`]. All setters return `self` to allow
/// method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainerConfigBuilder {
    config: TrainerConfig,
}

impl TrainerConfigBuilder {
    /// Set the test size fraction (default: 0.2).
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the number of cross-validation folds (default: 5).
    #[must_use]
    pub fn cv_folds(mut self, folds: u32) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Set the random seed for reproducibility (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Override the number of selected features for one task.
    #[must_use]
    pub fn select_k(mut self, task: Task, k: usize) -> Self {
        self.config.select_k.insert(task, k);
        self
    }

    /// Replace the ensemble hyperparameters.
    #[must_use]
    pub fn ensemble(mut self, params: EnsembleParams) -> Self {
        self.config.ensemble = params;
        self
    }

    /// Set the number of trees of both forest members (default: 200).
    #[must_use]
    pub fn n_trees(mut self, n: usize) -> Self {
        self.config.ensemble.random_forest.n_trees = n;
        self.config.ensemble.extra_trees.n_trees = n;
        self
    }

    /// Set the number of trees in the fallback forest (default: 100).
    #[must_use]
    pub fn fallback_trees(mut self, n: usize) -> Self {
        self.config.ensemble.fallback_forest.n_trees = n;
        self
    }

    /// Set the number of boosting rounds (default: 150).
    #[must_use]
    pub fn boosting_rounds(mut self, rounds: usize) -> Self {
        self.config.ensemble.gradient_boosting.rounds = rounds;
        self
    }

    /// Set the depth of each boosting tree (default: 8).
    #[must_use]
    pub fn boosting_max_depth(mut self, depth: usize) -> Self {
        self.config.ensemble.gradient_boosting.max_depth = depth;
        self
    }

    /// Set the class weighting of classification forests (default: balanced).
    #[must_use]
    pub fn class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.config.ensemble.class_weight = class_weight;
        self
    }

    /// Replace the table preparation settings.
    #[must_use]
    pub fn preparation(mut self, preparation: PreparationConfig) -> Self {
        self.config.preparation = preparation;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`AgriLearningError::InvalidConfig`] naming the offending field.
    pub fn build(self) -> Result<TrainerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::default();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.k_for(Task::CropHealth), 15);
        assert_eq!(config.k_for(Task::YieldPrediction), 12);
        assert_eq!(config.k_for(Task::Fertilizer), 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_member_defaults_differ() {
        let params = EnsembleParams::default();
        assert_eq!(params.random_forest.n_trees, 200);
        assert_eq!(params.random_forest.max_depth, Some(15));
        assert_eq!(params.random_forest.min_samples_split, 5);
        assert_eq!(params.random_forest.min_samples_leaf, 2);
        assert_eq!(params.random_forest.max_features, MaxFeatures::Sqrt);
        assert_eq!(params.extra_trees.max_depth, Some(20));
        assert_eq!(params.extra_trees.min_samples_split, 3);
        assert_eq!(params.gradient_boosting.max_depth, 8);
        assert_eq!(params.fallback_forest.n_trees, 100);
        assert_eq!(params.class_weight, ClassWeight::Balanced);
    }

    #[test]
    fn test_invalid_test_size() {
        let result = TrainerConfig::builder().test_size(0.0).build();
        assert!(result.unwrap_err().to_string().contains("test_size"));

        assert!(TrainerConfig::builder().test_size(1.0).build().is_err());
        assert!(TrainerConfig::builder().test_size(-0.1).build().is_err());
    }

    #[test]
    fn test_invalid_cv_folds() {
        let result = TrainerConfig::builder().cv_folds(1).build();
        assert!(result.unwrap_err().to_string().contains("cv_folds"));
    }

    #[test]
    fn test_invalid_select_k() {
        let result = TrainerConfig::builder().select_k(Task::Fertilizer, 0).build();
        let message = result.unwrap_err().to_string();
        assert!(message.contains("select_k"));
        assert!(message.contains("fertilizer"));
    }

    #[test]
    fn test_invalid_ensemble() {
        assert!(TrainerConfig::builder().n_trees(0).build().is_err());
        assert!(TrainerConfig::builder().boosting_rounds(0).build().is_err());

        let mut params = EnsembleParams::default();
        params.gradient_boosting.subsample = 1.5;
        let result = TrainerConfig::builder().ensemble(params).build();
        assert!(result.unwrap_err().to_string().contains("subsample"));

        let mut params = EnsembleParams::default();
        params.extra_trees.min_samples_split = 1;
        let result = TrainerConfig::builder().ensemble(params).build();
        assert!(result.unwrap_err().to_string().contains("extra_trees.min_samples_split"));
    }

    #[test]
    fn test_member_block_from_json() {
        let config: TrainerConfig = serde_json::from_str(
            r#"{"ensemble": {"class_weight": "none", "extra_trees": {
                "n_trees": 50, "max_depth": null, "min_samples_split": 4,
                "min_samples_leaf": 2, "max_features": "sqrt"}}}"#,
        )
        .unwrap();
        assert_eq!(config.ensemble.extra_trees.n_trees, 50);
        assert_eq!(config.ensemble.extra_trees.max_depth, None);
        assert_eq!(config.ensemble.class_weight, ClassWeight::None);
        // untouched members keep their defaults
        assert_eq!(config.ensemble.random_forest, EnsembleParams::default().random_forest);
    }

    #[test]
    fn test_json_defaults_fill_missing_fields() {
        let config: TrainerConfig =
            serde_json::from_str(r#"{"cv_folds": 3, "select_k": {"crop_health": 8}}"#).unwrap();
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.k_for(Task::CropHealth), 8);
        // entries absent from the map fall back to the task default
        assert_eq!(config.k_for(Task::YieldPrediction), 12);
        assert_eq!(config.ensemble, EnsembleParams::default());
    }

    #[test]
    fn test_builder_chaining() {
        let config = TrainerConfig::builder()
            .test_size(0.3)
            .cv_folds(3)
            .random_seed(7)
            .select_k(Task::YieldPrediction, 6)
            .n_trees(10)
            .fallback_trees(5)
            .boosting_rounds(20)
            .build()
            .unwrap();

        assert!((config.test_size - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.k_for(Task::YieldPrediction), 6);
        assert_eq!(config.ensemble.random_forest.n_trees, 10);
        assert_eq!(config.ensemble.extra_trees.n_trees, 10);
        assert_eq!(config.ensemble.fallback_forest.n_trees, 5);
        assert_eq!(config.ensemble.gradient_boosting.rounds, 20);
    }
}
