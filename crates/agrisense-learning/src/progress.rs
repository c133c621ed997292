//! Progress reporting types for training runs.
//!
//! This module defines [`TrainingStage`], [`ProgressUpdate`] and the
//! [`ProgressCallback`] type alias used by the [`Trainer`](crate::Trainer).
//!
//! # Example
//!
//! ```rust,ignore
//! use agrisense_learning::{Trainer, TrainerConfig, ProgressUpdate};
//!
//! let trainer = Trainer::builder()
//!     .config(TrainerConfig::default())
//!     .on_progress(|update: ProgressUpdate| {
//!         println!(
//!             "[{}] {:.0}% - {}",
//!             update.task.map_or("-", |t| t.as_str()),
//!             update.progress * 100.0,
//!             update.message
//!         );
//!     })
//!     .build()?;
//! ```

use agrisense_processing::Task;
use std::str::FromStr;
use std::sync::Arc;

/// The current stage of a training run.
///
/// A task moves through these stages in order (unless cancelled or failed):
///
/// 1. [`Preparing`](Self::Preparing) - cleaning the table and engineering features
/// 2. [`Selecting`](Self::Selecting) - univariate feature selection
/// 3. [`Splitting`](Self::Splitting) - train/test split
/// 4. [`Scaling`](Self::Scaling) - fitting the scaler
/// 5. [`Training`](Self::Training) - fitting the ensemble
/// 6. [`Evaluating`](Self::Evaluating) - test scores and cross-validation
/// 7. [`Persisting`](Self::Persisting) - writing the artifact bundle
/// 8. [`Complete`](Self::Complete)
///
/// Terminal states: [`Complete`](Self::Complete), [`Failed`](Self::Failed),
/// [`Cancelled`](Self::Cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    #[default]
    Preparing,
    Selecting,
    Splitting,
    Scaling,
    Training,
    Evaluating,
    Persisting,
    Complete,
    Failed,
    Cancelled,
}

impl TrainingStage {
    /// Every stage, in run order.
    pub const ALL: [TrainingStage; 10] = [
        TrainingStage::Preparing,
        TrainingStage::Selecting,
        TrainingStage::Splitting,
        TrainingStage::Scaling,
        TrainingStage::Training,
        TrainingStage::Evaluating,
        TrainingStage::Persisting,
        TrainingStage::Complete,
        TrainingStage::Failed,
        TrainingStage::Cancelled,
    ];

    /// # Examples
    ///
    /// ```
    /// use agrisense_learning::TrainingStage;
    ///
    /// assert_eq!(TrainingStage::Selecting.as_str(), "selecting");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Preparing => "preparing",
            TrainingStage::Selecting => "selecting",
            TrainingStage::Splitting => "splitting",
            TrainingStage::Scaling => "scaling",
            TrainingStage::Training => "training",
            TrainingStage::Evaluating => "evaluating",
            TrainingStage::Persisting => "persisting",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
            TrainingStage::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for [`Complete`](Self::Complete), [`Failed`](Self::Failed)
    /// and [`Cancelled`](Self::Cancelled).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingStage::Complete | TrainingStage::Failed | TrainingStage::Cancelled
        )
    }

    /// Fraction of a single task's work done when this stage starts.
    pub(crate) fn task_fraction(&self) -> f64 {
        match self {
            TrainingStage::Preparing => 0.0,
            TrainingStage::Selecting => 0.15,
            TrainingStage::Splitting => 0.2,
            TrainingStage::Scaling => 0.25,
            TrainingStage::Training => 0.3,
            TrainingStage::Evaluating => 0.7,
            TrainingStage::Persisting => 0.95,
            TrainingStage::Complete | TrainingStage::Failed | TrainingStage::Cancelled => 1.0,
        }
    }
}

impl std::fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a [`TrainingStage`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingStageError {
    invalid_value: String,
}

impl ParseTrainingStageError {
    /// Returns the invalid value that caused the parse error.
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl std::fmt::Display for ParseTrainingStageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid training stage: '{}'. Valid values are: preparing, selecting, splitting, \
             scaling, training, evaluating, persisting, complete, failed, cancelled",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseTrainingStageError {}

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrainingStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ParseTrainingStageError {
                invalid_value: s.to_string(),
            })
    }
}

/// A progress update from the trainer.
///
/// # Fields
///
/// - `task`: The task being trained, `None` for run-level updates
/// - `stage`: The current stage
/// - `progress`: Overall run progress from 0.0 to 1.0
/// - `message`: Human-readable status message
/// - `current_model`: Ensemble member being fitted, if any
/// - `tasks_completed`: `(completed, total)` tasks in this run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    pub task: Option<Task>,
    pub stage: TrainingStage,

    /// Increases monotonically during a run.
    pub progress: f64,

    pub message: String,
    pub current_model: Option<String>,
    pub tasks_completed: Option<(u32, u32)>,
}

/// Type alias for a progress callback function.
///
/// The callback should return quickly; it runs on the training thread.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;
