//! Inference gateway.
//!
//! The gateway answers prediction requests from the bundles held in a
//! [`ModelRegistry`]. Each request runs these stages:
//!
//! 1. **Resolve** the optimized bundle, else the fallback one
//! 2. **Featurize** the raw record with the task's feature engineer
//! 3. **Align, select and scale** to the bundle's stored feature order
//! 4. **Predict** and decode class indices through the stored label encoder
//! 5. **Present** bands, recommendations and confidence
//!
//! Every stage returns a [`Result`](crate::Result); the public methods turn
//! any failure into a [`PredictionResponse`] with `success = false`, so no
//! error escapes a gateway call.
//!
//! # Example
//!
//! ```rust,ignore
//! use agrisense_learning::{Gateway, ModelRegistry, ModelStore, RawRecord};
//!
//! let registry = ModelRegistry::load_from(&ModelStore::new("models"));
//! let gateway = Gateway::new(&registry);
//!
//! let response = gateway.predict_crop_health(&RawRecord::new().with("ndvi", 0.75));
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! ```

pub mod presentation;

use crate::bundle::ModelBundle;
use crate::error::{AgriLearningError, Result};
use crate::registry::ModelRegistry;
use crate::types::ModelSource;
use agrisense_processing::record::inputs;
use agrisense_processing::{RawRecord, Task};
use chrono::{DateTime, Utc};
use presentation::{
    FertilizerAdvice, HealthAssessment, YieldForecast, accuracy_band, advise_fertilizer,
    assess_health, decode_fertilizer, forecast_yield, improvement_over_baseline,
};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Confidence reported for fallback bundles.
pub fn fallback_confidence(task: Task) -> f64 {
    match task {
        Task::CropHealth => 0.85,
        Task::YieldPrediction => 0.82,
        Task::Fertilizer => 0.87,
    }
}

/// The task-specific part of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    CropHealth(HealthAssessment),
    Yield(YieldForecast),
    Fertilizer(FertilizerAdvice),
}

fn serialize_model_type<S: Serializer>(
    source: &Option<ModelSource>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(source.map_or("none", |s| s.as_str()))
}

/// Outcome of one gateway call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub task: Task,
    /// Source of the bundle that served the request; `None` when no bundle
    /// exists for the task.
    #[serde(rename = "model_type", serialize_with = "serialize_model_type")]
    pub model_source: Option<ModelSource>,
    #[serde(flatten)]
    pub prediction: Option<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Confidence as a percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_performance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PredictionResponse {
    fn served(task: Task, bundle: &ModelBundle, prediction: Prediction) -> Self {
        let source = bundle.model_source();
        let confidence = match source {
            ModelSource::Optimized => bundle.metrics().confidence(),
            ModelSource::Fallback => fallback_confidence(task),
        };
        Self {
            success: true,
            task,
            model_source: Some(source),
            prediction: Some(prediction),
            confidence: Some(confidence),
            model_performance: Some(confidence * 100.0),
            error: None,
            error_code: None,
            timestamp: Utc::now(),
        }
    }

    fn failed(task: Task, model_source: Option<ModelSource>, error: &AgriLearningError) -> Self {
        Self {
            success: false,
            task,
            model_source,
            prediction: None,
            confidence: None,
            model_performance: None,
            error: Some(error.to_string()),
            error_code: Some(error.error_code().to_string()),
            timestamp: Utc::now(),
        }
    }

    /// `"optimized"`, `"fallback"` or `"none"`.
    pub fn model_type(&self) -> &'static str {
        self.model_source.map_or("none", |s| s.as_str())
    }

    pub fn health(&self) -> Option<&HealthAssessment> {
        match &self.prediction {
            Some(Prediction::CropHealth(h)) => Some(h),
            _ => None,
        }
    }

    pub fn yield_forecast(&self) -> Option<&YieldForecast> {
        match &self.prediction {
            Some(Prediction::Yield(y)) => Some(y),
            _ => None,
        }
    }

    pub fn fertilizer(&self) -> Option<&FertilizerAdvice> {
        match &self.prediction {
            Some(Prediction::Fertilizer(f)) => Some(f),
            _ => None,
        }
    }
}

/// The three tasks run on one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensiveAnalysis {
    /// At least one task succeeded.
    pub success: bool,
    pub crop_health: PredictionResponse,
    pub yield_prediction: PredictionResponse,
    pub fertilizer: PredictionResponse,
    /// Mean of the health score and the yield relative to 5 t/ha, on a
    /// 0-100 scale, over the tasks that succeeded.
    pub overall_score: Option<f64>,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyEstimate {
    pub test_score: f64,
    pub cv_score: Option<f64>,
    pub improvement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub optimized_models_available: usize,
    pub fallback_models_available: usize,
    pub total_models: usize,
    pub performance_boost: String,
    /// Per task, from the optimized bundles.
    pub estimated_accuracy: BTreeMap<Task, AccuracyEstimate>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskAccuracy {
    pub task: Task,
    pub model_type: ModelSource,
    pub accuracy_percent: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub tasks: Vec<TaskAccuracy>,
    pub average_accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Synchronous, stateless request handler over a [`ModelRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct Gateway<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> Gateway<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a ModelRegistry {
        self.registry
    }

    pub fn predict_crop_health(&self, raw: &RawRecord) -> PredictionResponse {
        self.predict(Task::CropHealth, raw)
    }

    pub fn predict_yield(&self, raw: &RawRecord) -> PredictionResponse {
        self.predict(Task::YieldPrediction, raw)
    }

    pub fn recommend_fertilizer(&self, raw: &RawRecord) -> PredictionResponse {
        self.predict(Task::Fertilizer, raw)
    }

    /// Run `task` on `raw`. Never fails; see [`PredictionResponse::success`].
    pub fn predict(&self, task: Task, raw: &RawRecord) -> PredictionResponse {
        let bundle = match self.registry.resolve(task) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("{}", e);
                return PredictionResponse::failed(task, None, &e);
            }
        };

        match infer(task, &bundle, raw) {
            Ok(prediction) => PredictionResponse::served(task, &bundle, prediction),
            Err(e) => {
                warn!("{} prediction failed: {}", task, e);
                PredictionResponse::failed(task, Some(bundle.model_source()), &e)
            }
        }
    }

    /// Run all three tasks concurrently and combine them.
    pub fn analyze_all(&self, raw: &RawRecord) -> ComprehensiveAnalysis {
        let [crop_health, yield_prediction, fertilizer] = std::thread::scope(|scope| {
            let handles = Task::ALL.map(|task| (task, scope.spawn(move || self.predict(task, raw))));
            handles.map(|(task, handle)| {
                handle.join().unwrap_or_else(|_| {
                    PredictionResponse::failed(
                        task,
                        None,
                        &AgriLearningError::InferenceError(format!("{task} worker panicked")),
                    )
                })
            })
        });

        let mut components = Vec::new();
        let mut recommendations = Vec::new();
        if let Some(health) = crop_health.health() {
            components.push(health.health_score.clamp(0.0, 1.0) * 100.0);
            recommendations.extend(health.recommendations.iter().cloned());
        }
        if let Some(forecast) = yield_prediction.yield_forecast() {
            components.push((forecast.predicted_yield / 5.0).clamp(0.0, 1.0) * 100.0);
            if forecast.yield_category == presentation::YieldCategory::Poor {
                recommendations.push(format!(
                    "Expected {} yield is low ({:.2} t/ha). Review nutrient and irrigation plans.",
                    forecast.crop_type, forecast.predicted_yield
                ));
            }
        }
        if let Some(advice) = fertilizer.fertilizer() {
            recommendations.push(format!(
                "Apply {} at {}.",
                advice.recommended_fertilizer, advice.application_rate
            ));
        }

        let overall_score = (!components.is_empty()).then(|| {
            let mean = components.iter().sum::<f64>() / components.len() as f64;
            (mean * 10.0).round() / 10.0
        });

        ComprehensiveAnalysis {
            success: crop_health.success || yield_prediction.success || fertilizer.success,
            crop_health,
            yield_prediction,
            fertilizer,
            overall_score,
            recommendations,
            timestamp: Utc::now(),
        }
    }

    pub fn system_status(&self) -> SystemStatus {
        let counts = self.registry.counts();
        let estimated_accuracy = Task::ALL
            .iter()
            .filter_map(|&task| {
                let bundle = self.registry.get(task, ModelSource::Optimized)?;
                let metrics = bundle.metrics();
                Some((
                    task,
                    AccuracyEstimate {
                        test_score: metrics.test_score,
                        cv_score: metrics.cv_mean,
                        improvement: improvement_over_baseline(metrics.test_score),
                    },
                ))
            })
            .collect();

        SystemStatus {
            optimized_models_available: counts.optimized,
            fallback_models_available: counts.fallback,
            total_models: counts.total(),
            performance_boost: if counts.optimized > 0 {
                "Available".to_string()
            } else {
                "Pending Optimization".to_string()
            },
            estimated_accuracy,
            timestamp: Utc::now(),
        }
    }

    /// Accuracy of the bundle each task would be served from.
    ///
    /// Classification tasks report test accuracy, regression tasks the test
    /// R² score, as a percentage.
    pub fn accuracy_report(&self) -> AccuracyReport {
        let tasks: Vec<TaskAccuracy> = Task::ALL
            .iter()
            .filter_map(|&task| {
                let bundle = self.registry.resolve(task).ok()?;
                let metrics = bundle.metrics();
                let score = metrics.accuracy.unwrap_or(metrics.test_score);
                let accuracy_percent = (score * 100.0).clamp(0.0, 100.0);
                Some(TaskAccuracy {
                    task,
                    model_type: bundle.model_source(),
                    accuracy_percent,
                    status: accuracy_band(accuracy_percent).to_string(),
                })
            })
            .collect();

        let average_accuracy = (!tasks.is_empty()).then(|| {
            tasks.iter().map(|t| t.accuracy_percent).sum::<f64>() / tasks.len() as f64
        });
        AccuracyReport {
            tasks,
            average_accuracy,
            timestamp: Utc::now(),
        }
    }
}

fn infer(task: Task, bundle: &ModelBundle, raw: &RawRecord) -> Result<Prediction> {
    let features = bundle.features(raw);
    let output = bundle.predict_features(&features)?;
    debug!(%task, source = %bundle.model_source(), ?output, "Model output");

    Ok(match task {
        Task::CropHealth => Prediction::CropHealth(assess_health(
            finite(task, output.value())?,
            &features,
        )),
        Task::YieldPrediction => Prediction::Yield(forecast_yield(
            finite(task, output.value())?,
            raw.text_or_default(&inputs::CROP),
        )),
        Task::Fertilizer => {
            let index = output.class();
            let (name, approximated) =
                decode_fertilizer(index, bundle.payload.label_encoder.as_ref());
            if approximated {
                warn!("Fertilizer class {} not in encoder, using '{}'", index, name);
            }
            Prediction::Fertilizer(advise_fertilizer(name, approximated, &features))
        }
    })
}

fn finite(task: Task, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AgriLearningError::InferenceError(format!(
            "{task} model produced a non-finite value"
        )))
    }
}
