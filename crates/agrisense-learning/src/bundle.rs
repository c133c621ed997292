//! Versioned, content-hashed artifact bundles.
//!
//! A [`ModelBundle`] holds everything one task needs at inference time: the
//! input feature order, the fitted selector, scaler and model, the target
//! label encoder, the categorical encoders and the training metrics. The
//! header's blake3 hash covers the task, the model source and the serialized
//! payload, so no component can be swapped on disk without
//! [`verify()`](ModelBundle::verify) noticing.
//!
//! # Example
//!
//! ```rust,ignore
//! let bundle = ModelBundle::new(Task::YieldPrediction, ModelSource::Optimized, rows, payload)?;
//! let output = bundle.predict(&RawRecord::new().with("ndvi", 0.8))?;
//! println!("{:.2} t/ha", output.value());
//! ```

use crate::error::{AgriLearningError, Result};
use crate::estimators::{Estimator, Model, Output};
use crate::scaling::Scaler;
use crate::selection::FeatureSelector;
use crate::types::{ModelSource, PerformanceMetrics};
use agrisense_processing::{
    FeatureVector, FertilizerEncoders, LabelEncoder, RawRecord, Task, engineer_features,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format version written by this crate. Bundles with any other version are
/// rejected on load.
pub const BUNDLE_FORMAT_VERSION: u32 = 2;

/// Identity and integrity data of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleHeader {
    pub format_version: u32,
    pub task: Task,
    pub model_source: ModelSource,
    pub created_at: DateTime<Utc>,
    pub trained_rows: usize,
    /// Hex blake3 digest of the task, source and payload.
    pub content_hash: String,
}

/// The fitted components of one task's inference chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlePayload {
    /// Order of the engineered features fed to the selector.
    pub feature_names: Vec<String>,
    pub selector: FeatureSelector,
    pub scaler: Scaler,
    pub model: Model,
    /// Decodes class indices (classification only).
    pub label_encoder: Option<LabelEncoder>,
    /// Categorical encoders and district baselines (fertilizer only).
    pub fertilizer_encoders: Option<FertilizerEncoders>,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub header: BundleHeader,
    pub payload: BundlePayload,
}

fn content_hash(task: Task, source: ModelSource, payload: &BundlePayload) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(task.as_str().as_bytes());
    hasher.update(b"/");
    hasher.update(source.as_str().as_bytes());
    hasher.update(b"/");
    hasher.update(&serde_json::to_vec(payload)?);
    Ok(hasher.finalize().to_hex().to_string())
}

impl ModelBundle {
    /// Seal `payload` into a bundle stamped with the current time.
    pub fn new(
        task: Task,
        model_source: ModelSource,
        trained_rows: usize,
        payload: BundlePayload,
    ) -> Result<Self> {
        let selected = payload.selector.n_selected();
        if payload.selector.n_features() != payload.feature_names.len()
            || payload.model.n_features() != selected
        {
            return Err(AgriLearningError::DimensionMismatch {
                expected: payload.feature_names.len(),
                actual: payload.selector.n_features(),
            }
            .with_context(format!("Assembling {task} bundle")));
        }

        Ok(Self {
            header: BundleHeader {
                format_version: BUNDLE_FORMAT_VERSION,
                task,
                model_source,
                created_at: Utc::now(),
                trained_rows,
                content_hash: content_hash(task, model_source, &payload)?,
            },
            payload,
        })
    }

    pub fn task(&self) -> Task {
        self.header.task
    }

    pub fn model_source(&self) -> ModelSource {
        self.header.model_source
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.payload.metrics
    }

    /// Check the format version and recompute the content hash.
    ///
    /// Returns the reason the bundle cannot be trusted.
    pub fn verify(&self) -> std::result::Result<(), String> {
        if self.header.format_version != BUNDLE_FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {BUNDLE_FORMAT_VERSION})",
                self.header.format_version
            ));
        }
        let actual = content_hash(self.header.task, self.header.model_source, &self.payload)
            .map_err(|e| e.to_string())?;
        if actual != self.header.content_hash {
            return Err(format!(
                "content hash mismatch (header {}, payload {actual})",
                self.header.content_hash
            ));
        }
        Ok(())
    }

    /// Engineer the task's features for `raw`, using the bundle's encoders.
    pub fn features(&self, raw: &RawRecord) -> FeatureVector {
        engineer_features(
            self.header.task,
            raw,
            self.payload.fertilizer_encoders.as_ref(),
        )
    }

    /// Align, select and scale an engineered feature vector.
    pub fn transform(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let aligned = features.align(&self.payload.feature_names);
        if aligned.len() != self.payload.selector.n_features() {
            return Err(AgriLearningError::DimensionMismatch {
                expected: self.payload.selector.n_features(),
                actual: aligned.len(),
            });
        }
        let selected = self.payload.selector.transform_row(&aligned);
        Ok(self.payload.scaler.transform_row(&selected))
    }

    /// Run the model on an engineered feature vector.
    pub fn predict_features(&self, features: &FeatureVector) -> Result<Output> {
        let row = self.transform(features)?;
        self.payload.model.try_predict_row(&row)
    }

    pub fn predict(&self, raw: &RawRecord) -> Result<Output> {
        self.predict_features(&self.features(raw))
    }
}
