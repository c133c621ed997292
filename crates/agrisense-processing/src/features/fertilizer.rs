use super::FeatureVector;
use crate::encoding::{
    CROP_HASH_BUCKETS, DISTRICT_HASH_BUCKETS, FertilizerEncoders, NpkBaseline, SOIL_HASH_BUCKETS,
    hashed_category,
};
use crate::record::RawRecord;
use crate::record::inputs::*;
use crate::task::FERTILIZER_FEATURES;
use tracing::debug;

/// Engineers the 18 fertilizer features.
///
/// With fitted `encoders`, the categorical codes and district NPK baselines
/// come from training. Without them the categories use the hashed embedding
/// and the global baselines.
pub fn engineer_fertilizer_features(
    raw: &RawRecord,
    encoders: Option<&FertilizerEncoders>,
) -> FeatureVector {
    let nitrogen = raw.number_or_default(&NITROGEN);
    let phosphorus = raw.number_or_default(&PHOSPHORUS);
    let potassium = raw.number_or_default(&POTASSIUM);
    let ph = raw.number_or_default(&SOIL_PH);
    let rainfall = raw.number_or_default(&RAINFALL);
    let temperature = raw.number_or_default(&TEMPERATURE);

    let district = raw.text_or_default(&DISTRICT);
    let crop = raw.text_or_default(&CROP);
    let soil_color = raw.text_or_default(&SOIL_COLOR);

    let total_npk = nitrogen + phosphorus + potassium + 1e-6;
    let npk_balance_score =
        ((nitrogen.powi(2) + phosphorus.powi(2) + potassium.powi(2)) / 3.0).sqrt();
    let soil_crop_compatibility =
        ph * 10.0 + rainfall / 10.0 + (40.0 - (temperature - 25.0).abs()) * 2.0;

    let (district_code, soil_code, crop_code, baseline) = match encoders {
        Some(enc) => (
            enc.encode_district(&district),
            enc.encode_soil_color(&soil_color),
            enc.encode_crop(&crop),
            enc.baseline(&district),
        ),
        None => {
            debug!("No fertilizer encoders, using hashed categories and global NPK baselines");
            (
                hashed_category(&district, DISTRICT_HASH_BUCKETS),
                hashed_category(&soil_color, SOIL_HASH_BUCKETS),
                hashed_category(&crop, CROP_HASH_BUCKETS),
                NpkBaseline::default(),
            )
        }
    };

    let values = [
        nitrogen,
        phosphorus,
        potassium,
        ph,
        rainfall,
        temperature,
        npk_balance_score,
        soil_crop_compatibility,
        nitrogen / total_npk,
        phosphorus / total_npk,
        potassium / total_npk,
        ph * rainfall / 100.0,
        (temperature - 25.0).abs() + (ph - 6.5).abs(),
        nitrogen - baseline.nitrogen,
        phosphorus - baseline.phosphorus,
        district_code,
        soil_code,
        crop_code,
    ];

    let mut features = FeatureVector::with_capacity(FERTILIZER_FEATURES.len());
    for (name, value) in FERTILIZER_FEATURES.iter().zip(values) {
        features.push(*name, value);
    }
    features
}
