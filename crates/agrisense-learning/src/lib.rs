//! agrisense-learning: native ensemble training, artifact bundles and
//! fallback-aware inference for the AgriSense pipeline.
//!
//! This crate trains the three AgriSense models (crop health, yield and
//! fertilizer) from prepared tables, seals each fitted inference chain into a
//! hashed, versioned bundle, and serves predictions that prefer optimized
//! bundles and fall back to simpler ones.
//!
//! # Features
//!
//! - **Native estimators**: CART trees, random forests, extra trees, gradient
//!   boosting, ridge and logistic regression, stacking and voting ensembles
//! - **Capability sets**: the ensemble members are plugins injected into the
//!   trainer, not a fixed list
//! - **Evaluation**: seeded stratified splits, k-fold CV, detailed metrics and
//!   per-member comparison with overfitting risk
//! - **Artifact bundles**: selector, scaler, model, encoders and metrics as
//!   one blake3-hashed JSON file per (task, source)
//! - **Inference gateway**: optimized → fallback → none resolution that never
//!   propagates an error to the caller
//! - **Progress Reporting**: stage-by-stage training callbacks with cooperative
//!   cancellation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use agrisense_learning::{
//!     Gateway, ModelRegistry, ModelStore, RawRecord, Trainer, TrainerConfig,
//!     TrainingProfile, TrainingTables,
//! };
//!
//! // Train and persist every task
//! let trainer = Trainer::builder()
//!     .config(TrainerConfig::default())
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .build()?;
//! let store = ModelStore::new("models");
//! let tables = TrainingTables::from_csv("data/agriculture.csv", "data/fertilizer.csv");
//! let report = trainer.train_all(&tables, TrainingProfile::Both, Some(&store))?;
//!
//! // Serve predictions
//! let registry = ModelRegistry::load_from(&store);
//! let gateway = Gateway::new(&registry);
//! let response = gateway.predict_yield(&RawRecord::new().with("ndvi", 0.8));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  agrisense-processing                                            │
//! │  RawRecord ──► engineer_features ──► FeatureVector               │
//! │  DataFrame ──► DatasetPreparer ──► PreparedDataset               │
//! └──────────────┬──────────────────────────────────┬────────────────┘
//!                │                                  │
//!                ▼                                  ▼
//! ┌──────────────────────────────┐   ┌───────────────────────────────┐
//! │ Trainer                      │   │ Gateway                       │
//! │  select ► split ► scale ►    │   │  resolve ► featurize ► align  │
//! │  fit ► evaluate ► bundle     │   │  ► transform ► predict        │
//! └──────────────┬───────────────┘   └───────────────▲───────────────┘
//!                ▼                                   │
//!          ModelStore (JSON) ─────────────► ModelRegistry (Arc snapshots)
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, AgriLearningError>`]. Each
//! error maps to an [`ErrorKind`]:
//!
//! - [`ErrorKind::DataUnavailable`] - a training table lacks rows or the target
//! - [`ErrorKind::ArtifactMissing`] - no bundle for the requested task
//! - [`ErrorKind::DecodeFailure`] - a bundle or label could not be decoded
//! - [`ErrorKind::TrainingFailure`] - a fit failed
//!
//! See [`AgriLearningError`] for the complete list.
//!
//! # Thread Safety
//!
//! [`Trainer`], [`ModelRegistry`] and [`ModelBundle`] are `Send + Sync`.
//! Inference is stateless per call; the registry hands out `Arc` snapshots,
//! so a bundle replaced while serving never tears a request in flight.

mod bundle;
mod cancellation;
pub mod capability;
mod config;
mod error;
pub mod estimators;
pub mod evaluation;
pub mod gateway;
mod matrix;
mod progress;
mod registry;
pub mod scaling;
pub mod selection;
pub mod split;
mod store;
mod trainer;
mod types;

// Re-export public API
//
// Artifact bundles and storage
pub use bundle::{BUNDLE_FORMAT_VERSION, BundleHeader, BundlePayload, ModelBundle};
pub use registry::{ModelRegistry, RegistryCounts};
pub use store::{METRICS_SUMMARY_FILE, MetricsSummary, ModelStore};
// Cancellation token
pub use cancellation::CancellationToken;
// Capability set
pub use capability::{CapabilitySet, EstimatorPlugin};
// Configuration types
pub use config::{
    BoostingMemberParams, EnsembleParams, ForestMemberParams, TrainerConfig, TrainerConfigBuilder,
};
// Error types
pub use error::{AgriLearningError, ErrorKind, Result, ResultExt};
// Inference gateway
pub use gateway::{
    ComprehensiveAnalysis, Gateway, Prediction, PredictionResponse, SystemStatus,
};
// Progress reporting types
pub use progress::{ProgressCallback, ProgressUpdate, TrainingStage};
// Trainer
pub use trainer::{TrainedTask, Trainer, TrainerBuilder, TrainingProfile, TrainingTables};
// Result and metrics types
pub use types::{ModelComparison, ModelSource, PerformanceMetrics, TrainingReport, TrainingResult};

// Processing types used at this crate's API boundary
pub use agrisense_processing::{PreparationConfig, ProblemType, RawRecord, Task};
