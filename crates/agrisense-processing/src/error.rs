//! Error types for feature engineering and training-table preparation.
//!
//! Errors carry a stable code so callers (CLI, HTTP handlers) can branch on
//! the failure kind without matching on message text. They serialize as
//! `{code, message}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the processing crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProcessingError {
    /// A required column is missing from the training table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The target column for a task is missing from the training table.
    #[error("Target column '{0}' not found in dataset")]
    TargetNotFound(String),

    /// The training table has no usable rows.
    #[error("Dataset for '{0}' has no usable rows")]
    EmptyDataset(String),

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// A label was not seen when the encoder was fitted.
    #[error("Label '{label}' was not seen when fitting encoder '{encoder}'")]
    UnseenLabel { encoder: String, label: String },

    /// An encoded class index has no label in the fitted encoder.
    #[error("Class index {index} is out of range for encoder '{encoder}' ({classes} classes)")]
    UnknownClassIndex {
        encoder: String,
        index: i64,
        classes: usize,
    },

    /// Task name could not be parsed.
    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::EmptyDataset(_) => "EMPTY_DATASET",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::UnseenLabel { .. } => "UNSEEN_LABEL",
            Self::UnknownClassIndex { .. } => "UNKNOWN_CLASS_INDEX",
            Self::UnknownTask(_) => "UNKNOWN_TASK",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Returns `true` when the data needed for a task is absent or unusable.
    ///
    /// The trainer treats these as "skip this task" rather than hard failures.
    pub fn is_data_unavailable(&self) -> bool {
        match self {
            Self::ColumnNotFound(_)
            | Self::TargetNotFound(_)
            | Self::EmptyDataset(_)
            | Self::NoValidValues(_) => true,
            Self::WithContext { source, .. } => source.is_data_unavailable(),
            _ => false,
        }
    }

    /// Check if this error is recoverable (i.e., not a fundamental failure).
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnseenLabel { .. } | Self::UnknownClassIndex { .. } | Self::InvalidConfig(_) => {
                true
            }
            Self::WithContext { source, .. } => source.is_recoverable(),
            other => other.is_data_unavailable(),
        }
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}
