//! AgriSense feature engineering and training-table preparation.
//!
//! # Overview
//!
//! This crate is the leaf of the AgriSense pipeline. It provides:
//!
//! - **Task catalogue**: the three prediction tasks with their ordered
//!   feature lists and target columns ([`Task`])
//! - **Raw records**: loosely-typed field observations with documented
//!   defaults ([`RawRecord`])
//! - **Feature engineering**: deterministic per-record feature vectors
//!   shared by training and inference ([`features`])
//! - **Encoders**: label encoders, district NPK baselines and a stable hashed
//!   embedding for unseen categories ([`encoding`])
//! - **Dataset preparation**: CSV loading, null-target removal, median
//!   imputation and IQR target filtering on Polars frames ([`dataset`])
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use agrisense_processing::{DatasetPreparer, RawRecord, Task, engineer_features, load_csv};
//!
//! // Inference side
//! let raw = RawRecord::new().with("ndvi", 0.75).with("soil_ph", 6.8);
//! let features = engineer_features(Task::CropHealth, &raw, None);
//!
//! // Training side
//! let df = load_csv("data/agriculture_dataset.csv")?;
//! let prepared = DatasetPreparer::default().prepare(Task::YieldPrediction, &df)?;
//! println!("{} rows x {} features", prepared.n_rows(), prepared.n_features());
//! ```

pub mod config;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod features;
pub mod imputers;
pub mod outliers;
pub mod record;
pub mod task;
pub mod utils;

pub use config::{ConfigValidationError, PreparationConfig, PreparationConfigBuilder};
pub use dataset::{DatasetPreparer, PreparedDataset, TargetValues, load_csv};
pub use encoding::{FertilizerEncoders, LabelEncoder, NpkBaseline, hashed_category};
pub use error::{ProcessingError, Result, ResultExt};
pub use features::{
    FeatureVector, engineer_crop_health_features, engineer_features,
    engineer_fertilizer_features, engineer_yield_features,
};
pub use record::RawRecord;
pub use task::{ProblemType, Task};
