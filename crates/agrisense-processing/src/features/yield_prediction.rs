use super::FeatureVector;
use super::crop_health::crop_health_indices;
use crate::record::RawRecord;
use crate::task::YIELD_FEATURES;

/// Engineers the 18 yield features: a subset of the crop-health indices plus
/// the growth-stage ordinal.
pub fn engineer_yield_features(raw: &RawRecord) -> FeatureVector {
    let x = crop_health_indices(raw);
    let values = [
        x.canopy_coverage,
        x.ndvi,
        x.savi,
        x.chlorophyll,
        x.lai,
        x.temperature,
        x.humidity,
        x.rainfall,
        x.soil_moisture,
        x.soil_ph,
        x.organic_matter,
        x.growth_stage,
        x.comprehensive_health_score,
        x.soil_quality_index,
        x.vegetation_health_index,
        x.soil_fertility_index,
        x.growth_ndvi_interaction,
        x.growth_temperature_interaction,
    ];

    let mut features = FeatureVector::with_capacity(YIELD_FEATURES.len());
    for (name, value) in YIELD_FEATURES.iter().zip(values) {
        features.push(*name, value);
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::engineer_crop_health_features;
    use serde_json::json;

    #[test]
    fn test_shares_indices_with_crop_health() {
        let raw = RawRecord::from_value(json!({"ndvi": 0.55, "soil_moisture": 20, "growth_stage": 5}));
        let yield_features = engineer_yield_features(&raw);
        let health_features = engineer_crop_health_features(&raw);

        for name in ["NDVI", "soil_quality_index", "growth_ndvi_interaction"] {
            assert_eq!(yield_features.get(name), health_features.get(name), "{name}");
        }
        assert_eq!(yield_features.get("Crop_Growth_Stage"), Some(5.0));
        assert_eq!(yield_features.get("environmental_stress"), None);
    }

    #[test]
    fn test_deterministic() {
        let raw = RawRecord::from_value(json!({"ndvi": "0.61", "temperature": 31.5}));
        assert_eq!(engineer_yield_features(&raw), engineer_yield_features(&raw));
    }
}
