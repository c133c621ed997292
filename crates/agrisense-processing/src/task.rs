//! The prediction tasks served by the pipeline and their feature catalogues.

use crate::error::ProcessingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered crop-health feature list.
///
/// This order is the column order of the training matrix and therefore the
/// order a fitted selector expects.
pub const CROP_HEALTH_FEATURES: [&str; 26] = [
    "High_Resolution_RGB",
    "Multispectral_Images",
    "Thermal_Images",
    "Spatial_Resolution",
    "Canopy_Coverage",
    "NDVI",
    "SAVI",
    "Chlorophyll_Content",
    "Leaf_Area_Index",
    "Temperature",
    "Humidity",
    "Rainfall",
    "Wind_Speed",
    "Soil_Moisture",
    "Soil_pH",
    "Organic_Matter",
    "comprehensive_health_score",
    "soil_quality_index",
    "environmental_stress",
    "ndvi_savi_ratio",
    "vegetation_health_index",
    "temp_humidity_stress",
    "soil_fertility_index",
    "growth_ndvi_interaction",
    "growth_temperature_interaction",
    "temperature_range",
];

/// Ordered yield feature list.
pub const YIELD_FEATURES: [&str; 18] = [
    "Canopy_Coverage",
    "NDVI",
    "SAVI",
    "Chlorophyll_Content",
    "Leaf_Area_Index",
    "Temperature",
    "Humidity",
    "Rainfall",
    "Soil_Moisture",
    "Soil_pH",
    "Organic_Matter",
    "Crop_Growth_Stage",
    "comprehensive_health_score",
    "soil_quality_index",
    "vegetation_health_index",
    "soil_fertility_index",
    "growth_ndvi_interaction",
    "growth_temperature_interaction",
];

/// Ordered fertilizer feature list (15 numeric features + 3 encoded categories).
pub const FERTILIZER_FEATURES: [&str; 18] = [
    "Nitrogen",
    "Phosphorus",
    "Potassium",
    "pH",
    "Rainfall",
    "Temperature",
    "npk_balance_score",
    "soil_crop_compatibility",
    "n_ratio",
    "p_ratio",
    "k_ratio",
    "ph_rainfall_interaction",
    "temperature_ph_balance",
    "district_n_deviation",
    "district_p_deviation",
    "District_encoded",
    "Soil_encoded",
    "Crop_encoded",
];

/// Whether a task predicts a continuous value or a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Regression,
    Classification,
}

impl ProblemType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::Regression => "regression",
            ProblemType::Classification => "classification",
        }
    }
}

/// A prediction task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Crop-health score regression (0 = critical, 1 = excellent).
    CropHealth,
    /// Expected yield regression.
    YieldPrediction,
    /// Fertilizer classification.
    Fertilizer,
}

impl Task {
    /// All tasks in training order.
    pub const ALL: [Task; 3] = [Task::CropHealth, Task::YieldPrediction, Task::Fertilizer];

    /// Returns the snake_case identifier used in file names and JSON.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::CropHealth => "crop_health",
            Task::YieldPrediction => "yield_prediction",
            Task::Fertilizer => "fertilizer",
        }
    }

    #[must_use]
    pub fn problem_type(&self) -> ProblemType {
        match self {
            Task::CropHealth | Task::YieldPrediction => ProblemType::Regression,
            Task::Fertilizer => ProblemType::Classification,
        }
    }

    /// The ordered feature names a model for this task is trained on.
    #[must_use]
    pub fn feature_names(&self) -> &'static [&'static str] {
        match self {
            Task::CropHealth => &CROP_HEALTH_FEATURES,
            Task::YieldPrediction => &YIELD_FEATURES,
            Task::Fertilizer => &FERTILIZER_FEATURES,
        }
    }

    /// Target column in the training table.
    #[must_use]
    pub fn target_column(&self) -> &'static str {
        match self {
            Task::CropHealth => "Crop_Health_Label",
            Task::YieldPrediction => "Expected_Yield",
            Task::Fertilizer => "Fertilizer",
        }
    }

    /// Default number of features kept by univariate selection.
    #[must_use]
    pub fn default_select_k(&self) -> usize {
        match self {
            Task::CropHealth => 15,
            Task::YieldPrediction | Task::Fertilizer => 12,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crop_health" | "health" => Ok(Task::CropHealth),
            "yield_prediction" | "yield" => Ok(Task::YieldPrediction),
            "fertilizer" | "fertilizer_recommendation" => Ok(Task::Fertilizer),
            _ => Err(ProcessingError::UnknownTask(s.to_string())),
        }
    }
}
