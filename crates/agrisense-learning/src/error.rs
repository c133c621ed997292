//! Error types for the agrisense-learning crate.
//!
//! This module defines [`AgriLearningError`], the main error type used throughout
//! the crate, and [`ErrorKind`], the coarse taxonomy callers branch on.
//!
//! # Error Handling
//!
//! Errors are designed to be:
//! - **Descriptive**: Each variant includes context about what went wrong
//! - **Classifiable**: [`AgriLearningError::kind`] maps every variant to one [`ErrorKind`]
//! - **Serializable**: errors serialize as `{code, message}` for JSON responses
//!
//! # Example
//!
//! ```rust,ignore
//! use agrisense_learning::{AgriLearningError, ErrorKind, TrainerConfig};
//!
//! fn configure() -> Result<TrainerConfig, AgriLearningError> {
//!     let config = TrainerConfig::builder().cv_folds(5).build()?;
//!     Ok(config)
//! }
//! ```

use crate::types::ModelSource;
use agrisense_processing::{ProcessingError, Task};
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Coarse error taxonomy.
///
/// Training treats [`DataUnavailable`](Self::DataUnavailable) as "skip this
/// task"; the gateway reports [`ArtifactMissing`](Self::ArtifactMissing) as
/// `model_type: "none"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Training data is absent, empty or lacks the target.
    DataUnavailable,
    /// No artifact bundle exists for the requested task.
    ArtifactMissing,
    /// An artifact or a predicted label could not be decoded.
    DecodeFailure,
    /// An estimator could not be fitted.
    TrainingFailure,
    /// Invalid configuration or capability set.
    Configuration,
    /// A prediction could not be computed.
    Inference,
    /// Training was cancelled.
    Cancelled,
    /// Filesystem failure while reading or writing artifacts.
    Storage,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::ArtifactMissing => "artifact_missing",
            ErrorKind::DecodeFailure => "decode_failure",
            ErrorKind::TrainingFailure => "training_failure",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Inference => "inference",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Storage => "storage",
        }
    }
}

/// The main error type for agrisense-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AgriLearningError {
    /// Invalid configuration provided to the trainer.
    ///
    /// Check the error message for details on which configuration value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The capability set has no estimator plugins.
    #[error("Capability set is empty: at least one estimator plugin is required")]
    EmptyCapabilitySet,

    /// Feature engineering or table preparation failed.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Fitting failed for a reason other than missing data.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// No bundle is available for the task.
    #[error("No {} model available for '{task}'", source_label(.model_source))]
    ArtifactMissing {
        task: Task,
        model_source: Option<ModelSource>,
    },

    /// A bundle on disk could not be trusted.
    ///
    /// Raised when parsing fails, the format version is unknown, or the
    /// content hash does not match the payload.
    #[error("Artifact '{path}' is corrupt: {reason}")]
    ArtifactCorrupt { path: String, reason: String },

    /// A predicted value could not be decoded into a label.
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Input width does not match what a fitted component expects.
    #[error("Expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An error occurred during inference/prediction.
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Training was cancelled by the user.
    ///
    /// This is not an error condition but indicates the training was intentionally
    /// stopped before completion.
    #[error("Training cancelled")]
    Cancelled,

    /// I/O error during artifact save/load operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AgriLearningError>,
    },
}

fn source_label(source: &Option<ModelSource>) -> &'static str {
    source.map_or("trained", |s| s.as_str())
}

impl AgriLearningError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AgriLearningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) | Self::EmptyCapabilitySet => ErrorKind::Configuration,
            Self::Processing(e) if e.is_data_unavailable() => ErrorKind::DataUnavailable,
            Self::Processing(ProcessingError::UnknownClassIndex { .. }) => ErrorKind::DecodeFailure,
            Self::Processing(ProcessingError::InvalidConfig(_)) => ErrorKind::Configuration,
            Self::Processing(_) => ErrorKind::TrainingFailure,
            Self::TrainingFailed(_) => ErrorKind::TrainingFailure,
            Self::ArtifactMissing { .. } => ErrorKind::ArtifactMissing,
            Self::ArtifactCorrupt { .. } | Self::DecodeFailure(_) | Self::Json(_) => {
                ErrorKind::DecodeFailure
            }
            Self::DimensionMismatch { .. } | Self::InferenceError(_) => ErrorKind::Inference,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Storage,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::EmptyCapabilitySet => "EMPTY_CAPABILITY_SET",
            Self::Processing(e) => e.error_code(),
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::ArtifactMissing { .. } => "ARTIFACT_MISSING",
            Self::ArtifactCorrupt { .. } => "ARTIFACT_CORRUPT",
            Self::DecodeFailure(_) => "DECODE_FAILURE",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::InferenceError(_) => "INFERENCE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is recoverable (i.e., other tasks can still proceed).
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Cancelled
        )
    }
}

impl Serialize for AgriLearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AgriLearningError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, AgriLearningError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<AgriLearningError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err: AgriLearningError =
            ProcessingError::TargetNotFound("Expected_Yield".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert_eq!(err.error_code(), "TARGET_NOT_FOUND");

        let err = AgriLearningError::ArtifactMissing {
            task: Task::Fertilizer,
            model_source: None,
        };
        assert_eq!(err.kind(), ErrorKind::ArtifactMissing);
        assert!(err.to_string().contains("fertilizer"));

        assert_eq!(AgriLearningError::EmptyCapabilitySet.kind(), ErrorKind::Configuration);
        assert_eq!(AgriLearningError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = AgriLearningError::ArtifactCorrupt {
            path: "optimized_crop_health_bundle.json".to_string(),
            reason: "content hash mismatch".to_string(),
        }
        .with_context("Loading crop_health");

        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        assert_eq!(err.error_code(), "ARTIFACT_CORRUPT");
        assert!(err.to_string().starts_with("Loading crop_health"));
    }

    #[test]
    fn test_recoverable() {
        assert!(AgriLearningError::TrainingFailed("x".to_string()).is_recoverable());
        assert!(!AgriLearningError::Cancelled.is_recoverable());
        assert!(!AgriLearningError::InvalidConfig("k".to_string()).is_recoverable());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(AgriLearningError::DimensionMismatch {
            expected: 15,
            actual: 12,
        })
        .unwrap();
        assert_eq!(json["code"], "DIMENSION_MISMATCH");
        assert_eq!(json["kind"], "inference");
    }

    #[test]
    fn test_result_ext_on_io() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.context("Writing bundle").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
