use super::FeatureVector;
use crate::record::RawRecord;
use crate::record::inputs::*;
use crate::task::CROP_HEALTH_FEATURES;

/// Direct readings and derived indices shared by the crop-health and yield tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropHealthIndices {
    pub rgb_quality: f64,
    pub multispectral_quality: f64,
    pub thermal_quality: f64,
    pub spatial_resolution: f64,
    pub canopy_coverage: f64,
    pub ndvi: f64,
    pub savi: f64,
    pub chlorophyll: f64,
    pub lai: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub soil_moisture: f64,
    pub soil_ph: f64,
    pub organic_matter: f64,
    pub growth_stage: f64,

    pub comprehensive_health_score: f64,
    pub soil_quality_index: f64,
    pub environmental_stress: f64,
    pub ndvi_savi_ratio: f64,
    pub vegetation_health_index: f64,
    pub temp_humidity_stress: f64,
    pub soil_fertility_index: f64,
    pub growth_ndvi_interaction: f64,
    pub growth_temperature_interaction: f64,
    pub temperature_range: f64,
}

/// Reads the crop readings from `raw` and computes the derived indices.
pub fn crop_health_indices(raw: &RawRecord) -> CropHealthIndices {
    let ndvi = raw.number_or_default(&NDVI);
    let savi = raw.number_or_default(&SAVI);
    let chlorophyll = raw.number_or_default(&CHLOROPHYLL);
    let lai = raw.number_or_default(&LAI);
    let temperature = raw.number_or_default(&TEMPERATURE);
    let humidity = raw.number_or_default(&HUMIDITY);
    let rainfall = raw.number_or_default(&RAINFALL);
    let soil_moisture = raw.number_or_default(&SOIL_MOISTURE);
    let soil_ph = raw.number_or_default(&SOIL_PH);
    let organic_matter = raw.number_or_default(&ORGANIC_MATTER);
    let stress = raw.number_or_default(&STRESS_INDICATOR);
    let growth_stage = raw.number_or_default(&GROWTH_STAGE);

    let comprehensive_health_score = 0.3 * ndvi
        + 0.2 * savi
        + 0.2 * chlorophyll / 100.0
        + 0.15 * lai / 10.0
        + 0.15 * (100.0 - stress) / 100.0;

    let soil_quality_index =
        0.4 * soil_moisture + 0.3 * ((soil_ph - 4.0) / 4.0 * 100.0) + 0.3 * organic_matter * 10.0;

    let environmental_stress = [temperature > 35.0, humidity > 90.0, rainfall > 100.0]
        .into_iter()
        .filter(|hit| *hit)
        .count() as f64;

    let ph_in_range = if (6.0..=7.5).contains(&soil_ph) { 1.0 } else { 0.0 };

    CropHealthIndices {
        rgb_quality: raw.number_or_default(&RGB_QUALITY),
        multispectral_quality: raw.number_or_default(&MULTISPECTRAL_QUALITY),
        thermal_quality: raw.number_or_default(&THERMAL_QUALITY),
        spatial_resolution: raw.number_or_default(&SPATIAL_RESOLUTION),
        canopy_coverage: raw.number_or_default(&CANOPY_COVERAGE),
        ndvi,
        savi,
        chlorophyll,
        lai,
        temperature,
        humidity,
        rainfall,
        wind_speed: raw.number_or_default(&WIND_SPEED),
        soil_moisture,
        soil_ph,
        organic_matter,
        growth_stage,
        comprehensive_health_score,
        soil_quality_index,
        environmental_stress,
        ndvi_savi_ratio: ndvi / (savi + 1e-6),
        vegetation_health_index: 0.4 * ndvi + 0.3 * savi + 0.3 * chlorophyll / 100.0,
        temp_humidity_stress: (temperature - 25.0).abs() / 15.0 + (humidity - 60.0).abs() / 40.0,
        soil_fertility_index: ph_in_range * organic_matter * soil_moisture / 100.0,
        growth_ndvi_interaction: growth_stage * ndvi,
        growth_temperature_interaction: growth_stage * temperature,
        temperature_range: (temperature - 25.0).abs(),
    }
}

/// Engineers the 26 crop-health features.
pub fn engineer_crop_health_features(raw: &RawRecord) -> FeatureVector {
    let x = crop_health_indices(raw);
    let values = [
        x.rgb_quality,
        x.multispectral_quality,
        x.thermal_quality,
        x.spatial_resolution,
        x.canopy_coverage,
        x.ndvi,
        x.savi,
        x.chlorophyll,
        x.lai,
        x.temperature,
        x.humidity,
        x.rainfall,
        x.wind_speed,
        x.soil_moisture,
        x.soil_ph,
        x.organic_matter,
        x.comprehensive_health_score,
        x.soil_quality_index,
        x.environmental_stress,
        x.ndvi_savi_ratio,
        x.vegetation_health_index,
        x.temp_humidity_stress,
        x.soil_fertility_index,
        x.growth_ndvi_interaction,
        x.growth_temperature_interaction,
        x.temperature_range,
    ];

    let mut features = FeatureVector::with_capacity(CROP_HEALTH_FEATURES.len());
    for (name, value) in CROP_HEALTH_FEATURES.iter().zip(values) {
        features.push(*name, value);
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_defaults_only() {
        let features = engineer_crop_health_features(&RawRecord::new());
        assert_eq!(features.len(), 26);
        assert_eq!(features.get("NDVI"), Some(0.7));
        assert_eq!(features.get("Temperature"), Some(28.0));
        assert_eq!(features.get("High_Resolution_RGB"), Some(85.0));

        // 0.21 + 0.08 + 0.09 + 0.0525 + 0.12
        assert!(approx(features.get("comprehensive_health_score").unwrap(), 0.5525));
        // 14 + 18.75 + 7.5
        assert!(approx(features.get("soil_quality_index").unwrap(), 40.25));
        assert_eq!(features.get("environmental_stress"), Some(0.0));
        // 2.5 * 35 / 100
        assert!(approx(features.get("soil_fertility_index").unwrap(), 0.875));
        assert!(approx(features.get("growth_temperature_interaction").unwrap(), 84.0));
        assert!(approx(features.get("temperature_range").unwrap(), 3.0));
    }

    #[test]
    fn test_environmental_stress_counts_each_factor() {
        let raw = RawRecord::from_value(json!({
            "temperature": 38, "humidity": 95, "rainfall": 120
        }));
        let features = engineer_crop_health_features(&raw);
        assert_eq!(features.get("environmental_stress"), Some(3.0));

        let raw = RawRecord::from_value(json!({"temperature": 36}));
        assert_eq!(
            engineer_crop_health_features(&raw).get("environmental_stress"),
            Some(1.0)
        );
    }

    #[test]
    fn test_soil_fertility_zero_outside_ph_band() {
        let raw = RawRecord::from_value(json!({"soil_ph": 5.5}));
        assert_eq!(
            engineer_crop_health_features(&raw).get("soil_fertility_index"),
            Some(0.0)
        );
    }

    #[test]
    fn test_missing_field_uses_its_default() {
        let full = RawRecord::from_value(json!({"ndvi": 0.75, "savi": 0.45, "humidity": 75}));
        let partial = RawRecord::from_value(json!({"ndvi": 0.75, "savi": 0.45}));
        assert_eq!(
            engineer_crop_health_features(&full),
            engineer_crop_health_features(&partial)
        );
    }

    #[test]
    fn test_ratios() {
        let raw = RawRecord::from_value(json!({"ndvi": 0.8, "savi": 0.4, "temperature": 20}));
        let features = engineer_crop_health_features(&raw);
        assert!(approx(features.get("ndvi_savi_ratio").unwrap(), 0.8 / (0.4 + 1e-6)));
        // |20-25|/15 + |75-60|/40
        assert!(approx(
            features.get("temp_humidity_stress").unwrap(),
            5.0 / 15.0 + 15.0 / 40.0
        ));
        assert!(approx(features.get("temperature_range").unwrap(), 5.0));
    }
}
