//! Configuration for training-table preparation.
//!
//! Use [`PreparationConfig::builder()`] for a validated configuration, or
//! deserialize one from JSON and call [`PreparationConfig::validate`].

use crate::task::{ProblemType, Task};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration for [`DatasetPreparer`](crate::dataset::DatasetPreparer).
///
/// # Example
///
/// ```rust,ignore
/// use agrisense_processing::{PreparationConfig, Task};
///
/// let config = PreparationConfig::builder()
///     .filter_target_outliers(Task::CropHealth, true)
///     .iqr_multiplier(2.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    /// Regression tasks whose rows are dropped when the target lies outside
    /// the IQR fence.
    /// Default: yield prediction only
    pub outlier_tasks: BTreeSet<Task>,

    /// Fence width in IQRs: `[Q1 - m*IQR, Q3 + m*IQR]`.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Fill nulls in numeric feature columns with the column median.
    /// Default: true
    pub impute_missing: bool,

    /// Minimum number of usable rows for a task to be trainable.
    /// Default: 1
    pub min_rows: usize,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            outlier_tasks: BTreeSet::from([Task::YieldPrediction]),
            iqr_multiplier: 1.5,
            impute_missing: true,
            min_rows: 1,
        }
    }
}

impl PreparationConfig {
    pub fn builder() -> PreparationConfigBuilder {
        PreparationConfigBuilder::default()
    }

    /// Whether target outliers are filtered for `task`.
    pub fn filters_outliers(&self, task: Task) -> bool {
        self.outlier_tasks.contains(&task)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier <= 0.0 {
            return Err(ConfigValidationError::InvalidIqrMultiplier(
                self.iqr_multiplier,
            ));
        }

        if self.min_rows == 0 {
            return Err(ConfigValidationError::InvalidMinRows(self.min_rows));
        }

        if let Some(task) = self
            .outlier_tasks
            .iter()
            .find(|t| t.problem_type() != ProblemType::Regression)
        {
            return Err(ConfigValidationError::OutlierFilterOnClassification(*task));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid IQR multiplier: {0} (must be a positive number)")]
    InvalidIqrMultiplier(f64),

    #[error("Invalid minimum row count: {0} (must be at least 1)")]
    InvalidMinRows(usize),

    #[error("Target outlier filtering is only defined for regression tasks, not '{0}'")]
    OutlierFilterOnClassification(Task),
}

/// Builder for [`PreparationConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PreparationConfigBuilder {
    outlier_tasks: Option<BTreeSet<Task>>,
    iqr_multiplier: Option<f64>,
    impute_missing: Option<bool>,
    min_rows: Option<usize>,
}

impl PreparationConfigBuilder {
    /// Enable or disable target outlier filtering for one task.
    pub fn filter_target_outliers(mut self, task: Task, enable: bool) -> Self {
        let tasks = self
            .outlier_tasks
            .get_or_insert_with(|| PreparationConfig::default().outlier_tasks);
        if enable {
            tasks.insert(task);
        } else {
            tasks.remove(&task);
        }
        self
    }

    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Enable or disable median imputation of numeric feature columns.
    pub fn impute_missing(mut self, enable: bool) -> Self {
        self.impute_missing = Some(enable);
        self
    }

    pub fn min_rows(mut self, rows: usize) -> Self {
        self.min_rows = Some(rows);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PreparationConfig` or an error if validation fails.
    pub fn build(self) -> Result<PreparationConfig, ConfigValidationError> {
        let defaults = PreparationConfig::default();
        let config = PreparationConfig {
            outlier_tasks: self.outlier_tasks.unwrap_or(defaults.outlier_tasks),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            impute_missing: self.impute_missing.unwrap_or(defaults.impute_missing),
            min_rows: self.min_rows.unwrap_or(defaults.min_rows),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreparationConfig::default();
        assert!(config.filters_outliers(Task::YieldPrediction));
        assert!(!config.filters_outliers(Task::CropHealth));
        assert_eq!(config.iqr_multiplier, 1.5);
        assert!(config.impute_missing);
    }

    #[test]
    fn test_builder_toggles_outlier_tasks() {
        let config = PreparationConfig::builder()
            .filter_target_outliers(Task::YieldPrediction, false)
            .filter_target_outliers(Task::CropHealth, true)
            .build()
            .unwrap();

        assert!(config.filters_outliers(Task::CropHealth));
        assert!(!config.filters_outliers(Task::YieldPrediction));
    }

    #[test]
    fn test_validation_rejects_classification_filter() {
        let result = PreparationConfig::builder()
            .filter_target_outliers(Task::Fertilizer, true)
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::OutlierFilterOnClassification(Task::Fertilizer)
        ));
    }

    #[test]
    fn test_validation_invalid_multiplier() {
        assert!(matches!(
            PreparationConfig::builder().iqr_multiplier(0.0).build(),
            Err(ConfigValidationError::InvalidIqrMultiplier(_))
        ));
        assert!(PreparationConfig::builder().min_rows(0).build().is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{ "outlier_tasks": ["crop_health", "yield_prediction"], "iqr_multiplier": 3.0 }"#;
        let config: PreparationConfig = serde_json::from_str(json).unwrap();

        assert!(config.filters_outliers(Task::CropHealth));
        assert_eq!(config.iqr_multiplier, 3.0);
        assert!(config.impute_missing);
        assert!(config.validate().is_ok());
    }
}
