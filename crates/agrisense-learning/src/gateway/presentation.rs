//! Turning raw model outputs into farmer-facing results.

use agrisense_processing::{FeatureVector, LabelEncoder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fertilizer classes in the order of the training table's label encoder.
pub const FERTILIZERS: [&str; 9] = [
    "Urea",
    "DAP",
    "NPK 10:26:26",
    "NPK 20:20:0",
    "NPK 15:15:15",
    "Potash",
    "Superphosphate",
    "Organic Compost",
    "Vermicompost",
];

/// Application rate in kg per acre for a fertilizer not in [`FERTILIZERS`].
pub const DEFAULT_BASE_RATE: f64 = 40.0;

const BASE_RATES: [f64; 9] = [50.0, 40.0, 45.0, 35.0, 40.0, 25.0, 35.0, 200.0, 150.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            HealthStatus::Excellent
        } else if score >= 0.6 {
            HealthStatus::Good
        } else if score >= 0.4 {
            HealthStatus::Fair
        } else if score >= 0.2 {
            HealthStatus::Poor
        } else {
            HealthStatus::Critical
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        match self {
            HealthStatus::Excellent | HealthStatus::Good => RiskLevel::Low,
            HealthStatus::Fair => RiskLevel::Medium,
            HealthStatus::Poor => RiskLevel::High,
            HealthStatus::Critical => RiskLevel::VeryHigh,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YieldCategory {
    Excellent,
    Good,
    Average,
    Poor,
}

impl YieldCategory {
    /// Band for a yield in tonnes per hectare.
    pub fn from_yield(value: f64) -> Self {
        if value >= 4.0 {
            YieldCategory::Excellent
        } else if value >= 3.0 {
            YieldCategory::Good
        } else if value >= 2.0 {
            YieldCategory::Average
        } else {
            YieldCategory::Poor
        }
    }
}

/// Crop health result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAssessment {
    pub health_score: f64,
    pub health_status: HealthStatus,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub features_analyzed: usize,
}

/// Yield result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldForecast {
    /// Tonnes per hectare.
    pub predicted_yield: f64,
    pub yield_category: YieldCategory,
    pub crop_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NpkAnalysis {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub balance_score: f64,
}

/// Fertilizer result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FertilizerAdvice {
    pub recommended_fertilizer: String,
    pub application_rate: String,
    pub npk_analysis: NpkAnalysis,
    /// The class index was outside the label encoder and was mapped onto
    /// [`FERTILIZERS`] by modulo.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub label_approximated: bool,
}

fn feature(features: &FeatureVector, name: &str) -> f64 {
    features.get(name).unwrap_or_default()
}

/// Advice lines for a crop-health feature vector.
pub fn health_recommendations(features: &FeatureVector) -> Vec<String> {
    let mut recommendations = Vec::new();
    let ph = feature(features, "Soil_pH");

    if feature(features, "NDVI") < 0.5 {
        recommendations
            .push("Low vegetation index detected. Consider nutrient supplementation.".to_string());
    }
    if !(6.0..=7.5).contains(&ph) {
        recommendations.push(format!(
            "Soil pH ({ph:.1}) needs adjustment for optimal growth."
        ));
    }
    if feature(features, "Soil_Moisture") < 25.0 {
        recommendations.push("Soil moisture is low. Increase irrigation frequency.".to_string());
    }
    if feature(features, "Temperature") > 35.0 {
        recommendations
            .push("High temperature stress detected. Consider shade management.".to_string());
    }
    if feature(features, "environmental_stress") > 1.0 {
        recommendations.push(
            "Multiple environmental stress factors detected. Monitor closely.".to_string(),
        );
    }

    if recommendations.is_empty() {
        recommendations.push("Crop health parameters are within optimal ranges.".to_string());
    }
    recommendations
}

pub fn assess_health(score: f64, features: &FeatureVector) -> HealthAssessment {
    let health_status = HealthStatus::from_score(score);
    HealthAssessment {
        health_score: score,
        health_status,
        risk_level: health_status.risk_level(),
        recommendations: health_recommendations(features),
        features_analyzed: features.len(),
    }
}

pub fn forecast_yield(value: f64, crop_type: String) -> YieldForecast {
    YieldForecast {
        predicted_yield: value,
        yield_category: YieldCategory::from_yield(value),
        crop_type,
    }
}

/// Decode a predicted class index into a fertilizer name.
///
/// The bundle's encoder is authoritative. An index it does not know, or a
/// bundle without an encoder, maps onto [`FERTILIZERS`] by modulo and the
/// returned flag is `true`.
pub fn decode_fertilizer(index: usize, encoder: Option<&LabelEncoder>) -> (String, bool) {
    if let Some(name) = encoder.and_then(|e| e.inverse_transform(index as i64).ok()) {
        return (name.to_string(), false);
    }
    (FERTILIZERS[index % FERTILIZERS.len()].to_string(), true)
}

/// Recommended kg per acre, adjusted for soil pH and NPK balance.
pub fn application_rate(fertilizer: &str, ph: f64, npk_balance: f64) -> String {
    let mut rate = FERTILIZERS
        .iter()
        .position(|f| *f == fertilizer)
        .map_or(DEFAULT_BASE_RATE, |i| BASE_RATES[i]);

    if ph < 6.0 {
        rate *= 0.9;
    } else if ph > 7.5 {
        rate *= 1.1;
    }
    if npk_balance < 30.0 {
        rate *= 1.2;
    }
    format!("{rate:.0} kg per acre")
}

pub fn advise_fertilizer(
    fertilizer: String,
    label_approximated: bool,
    features: &FeatureVector,
) -> FertilizerAdvice {
    let npk_analysis = NpkAnalysis {
        nitrogen: feature(features, "Nitrogen"),
        phosphorus: feature(features, "Phosphorus"),
        potassium: feature(features, "Potassium"),
        balance_score: feature(features, "npk_balance_score"),
    };
    FertilizerAdvice {
        application_rate: application_rate(
            &fertilizer,
            feature(features, "pH"),
            npk_analysis.balance_score,
        ),
        recommended_fertilizer: fertilizer,
        npk_analysis,
        label_approximated,
    }
}

/// Status band of an accuracy percentage.
pub fn accuracy_band(percent: f64) -> &'static str {
    if percent >= 90.0 {
        "Excellent"
    } else if percent >= 80.0 {
        "Good"
    } else if percent >= 70.0 {
        "Fair"
    } else if percent >= 60.0 {
        "Improving"
    } else {
        "Poor"
    }
}

/// Gain of a test score over the 0.75 baseline, e.g. `"+12.0%"`.
pub fn improvement_over_baseline(test_score: f64) -> String {
    if test_score > 0.75 {
        format!("+{:.1}%", (test_score - 0.75) * 100.0)
    } else {
        "Baseline".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrisense_processing::{RawRecord, Task, engineer_features};
    use serde_json::json;

    #[test]
    fn test_health_bands() {
        let cases = [
            (0.85, HealthStatus::Excellent, RiskLevel::Low),
            (0.8, HealthStatus::Excellent, RiskLevel::Low),
            (0.65, HealthStatus::Good, RiskLevel::Low),
            (0.4, HealthStatus::Fair, RiskLevel::Medium),
            (0.25, HealthStatus::Poor, RiskLevel::High),
            (0.1, HealthStatus::Critical, RiskLevel::VeryHigh),
        ];
        for (score, status, risk) in cases {
            assert_eq!(HealthStatus::from_score(score), status, "score {score}");
            assert_eq!(status.risk_level(), risk);
        }
        assert_eq!(serde_json::to_value(RiskLevel::VeryHigh).unwrap(), json!("Very High"));
    }

    #[test]
    fn test_yield_bands() {
        assert_eq!(YieldCategory::from_yield(4.2), YieldCategory::Excellent);
        assert_eq!(YieldCategory::from_yield(3.0), YieldCategory::Good);
        assert_eq!(YieldCategory::from_yield(2.5), YieldCategory::Average);
        assert_eq!(YieldCategory::from_yield(1.2), YieldCategory::Poor);
    }

    #[test]
    fn test_all_clear_recommendation() {
        let features = engineer_features(Task::CropHealth, &RawRecord::new(), None);
        assert_eq!(
            health_recommendations(&features),
            vec!["Crop health parameters are within optimal ranges."]
        );
    }

    #[test]
    fn test_stress_recommendations() {
        let raw = RawRecord::from_value(json!({
            "ndvi": 0.3, "soil_ph": 5.2, "soil_moisture": 18,
            "temperature": 38, "humidity": 95
        }));
        let features = engineer_features(Task::CropHealth, &raw, None);
        let recommendations = health_recommendations(&features);
        assert_eq!(recommendations.len(), 5);
        assert!(recommendations[1].contains("(5.2)"));
    }

    #[test]
    fn test_decode_known_and_unknown_indices() {
        let encoder = LabelEncoder::fit("Fertilizer", ["Urea", "DAP"]);
        assert_eq!(decode_fertilizer(1, Some(&encoder)), ("Urea".to_string(), false));
        assert_eq!(decode_fertilizer(99, Some(&encoder)), ("Urea".to_string(), true));
        assert_eq!(decode_fertilizer(14, Some(&encoder)), ("Potash".to_string(), true));
        assert_eq!(decode_fertilizer(2, None), ("NPK 10:26:26".to_string(), true));
    }

    #[test]
    fn test_application_rate_adjustments() {
        assert_eq!(application_rate("Urea", 6.5, 40.0), "50 kg per acre");
        assert_eq!(application_rate("Urea", 5.5, 40.0), "45 kg per acre");
        assert_eq!(application_rate("Organic Compost", 8.0, 20.0), "264 kg per acre");
        assert_eq!(application_rate("Gypsum", 6.5, 40.0), "40 kg per acre");
    }

    #[test]
    fn test_accuracy_bands_and_improvement() {
        assert_eq!(accuracy_band(93.0), "Excellent");
        assert_eq!(accuracy_band(61.0), "Improving");
        assert_eq!(accuracy_band(12.0), "Poor");
        assert_eq!(improvement_over_baseline(0.87), "+12.0%");
        assert_eq!(improvement_over_baseline(0.7), "Baseline");
    }
}
