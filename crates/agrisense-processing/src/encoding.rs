//! Categorical encoders.
//!
//! [`LabelEncoder`] maps labels to dense indices over the sorted set of labels
//! seen at fit time. [`FertilizerEncoders`] bundles the three categorical
//! encoders of the fertilizer table with per-district NPK baselines, and
//! falls back to [`hashed_category`] for labels it has never seen.

use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Modulus of the hashed district embedding.
pub const DISTRICT_HASH_BUCKETS: u64 = 100;
/// Modulus of the hashed crop embedding.
pub const CROP_HASH_BUCKETS: u64 = 50;
/// Modulus of the hashed soil-color embedding.
pub const SOIL_HASH_BUCKETS: u64 = 20;

/// Global nitrogen baseline used when no district statistics exist.
pub const GLOBAL_NITROGEN_BASELINE: f64 = 45.0;
/// Global phosphorus baseline used when no district statistics exist.
pub const GLOBAL_PHOSPHORUS_BASELINE: f64 = 23.0;

/// Deterministic hash embedding of a label into `[0, buckets)`.
///
/// Stable across processes and platforms (blake3, first 8 bytes little-endian).
pub fn hashed_category(label: &str, buckets: u64) -> f64 {
    let digest = blake3::hash(label.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % buckets.max(1)) as f64
}

/// Maps string labels to indices `0..n` in sorted label order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    name: String,
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fits an encoder on every distinct label in `labels`.
    pub fn fit<I, S>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = labels
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .collect();
        Self {
            name: name.into(),
            classes: classes.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Index of `label`, if it was seen at fit time.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label.trim()))
            .ok()
    }

    /// Index of `label`, or [`ProcessingError::UnseenLabel`].
    pub fn transform(&self, label: &str) -> Result<usize> {
        self.index_of(label)
            .ok_or_else(|| ProcessingError::UnseenLabel {
                encoder: self.name.clone(),
                label: label.to_string(),
            })
    }

    /// Label at `index`, or [`ProcessingError::UnknownClassIndex`].
    pub fn inverse_transform(&self, index: i64) -> Result<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
            .ok_or_else(|| ProcessingError::UnknownClassIndex {
                encoder: self.name.clone(),
                index,
                classes: self.classes.len(),
            })
    }
}

/// Mean nitrogen and phosphorus of a district's training rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NpkBaseline {
    pub nitrogen: f64,
    pub phosphorus: f64,
}

impl Default for NpkBaseline {
    fn default() -> Self {
        Self {
            nitrogen: GLOBAL_NITROGEN_BASELINE,
            phosphorus: GLOBAL_PHOSPHORUS_BASELINE,
        }
    }
}

/// One fertilizer-table row as seen by [`FertilizerEncoders::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FertilizerObservation {
    pub district: String,
    pub soil_color: String,
    pub crop: String,
    pub nitrogen: f64,
    pub phosphorus: f64,
}

/// Encoders fitted on the fertilizer training table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FertilizerEncoders {
    pub district: LabelEncoder,
    pub soil_color: LabelEncoder,
    pub crop: LabelEncoder,
    pub district_baselines: BTreeMap<String, NpkBaseline>,
}

impl FertilizerEncoders {
    pub fn fit(rows: &[FertilizerObservation]) -> Self {
        let district = LabelEncoder::fit("district", rows.iter().map(|r| &r.district));
        let soil_color = LabelEncoder::fit("soil_color", rows.iter().map(|r| &r.soil_color));
        let crop = LabelEncoder::fit("crop", rows.iter().map(|r| &r.crop));

        let mut sums: BTreeMap<String, (f64, f64, usize)> = BTreeMap::new();
        for row in rows {
            let entry = sums
                .entry(row.district.trim().to_string())
                .or_insert((0.0, 0.0, 0));
            entry.0 += row.nitrogen;
            entry.1 += row.phosphorus;
            entry.2 += 1;
        }
        let district_baselines = sums
            .into_iter()
            .map(|(name, (n, p, count))| {
                let count = count as f64;
                (
                    name,
                    NpkBaseline {
                        nitrogen: n / count,
                        phosphorus: p / count,
                    },
                )
            })
            .collect();

        debug!(
            "Fitted fertilizer encoders: {} districts, {} soil colors, {} crops",
            district.len(),
            soil_color.len(),
            crop.len()
        );

        Self {
            district,
            soil_color,
            crop,
            district_baselines,
        }
    }

    pub fn encode_district(&self, label: &str) -> f64 {
        encode_or_hash(&self.district, label, DISTRICT_HASH_BUCKETS)
    }

    pub fn encode_soil_color(&self, label: &str) -> f64 {
        encode_or_hash(&self.soil_color, label, SOIL_HASH_BUCKETS)
    }

    pub fn encode_crop(&self, label: &str) -> f64 {
        encode_or_hash(&self.crop, label, CROP_HASH_BUCKETS)
    }

    /// NPK baseline of `district`, or the global baseline when unknown.
    pub fn baseline(&self, district: &str) -> NpkBaseline {
        self.district_baselines
            .get(district.trim())
            .copied()
            .unwrap_or_default()
    }
}

fn encode_or_hash(encoder: &LabelEncoder, label: &str, buckets: u64) -> f64 {
    match encoder.index_of(label) {
        Some(index) => index as f64,
        None => {
            debug!(
                "Label '{}' unseen by encoder '{}', using hashed embedding",
                label,
                encoder.name()
            );
            hashed_category(label, buckets)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn observation(district: &str, soil: &str, crop: &str, n: f64, p: f64) -> FertilizerObservation {
        FertilizerObservation {
            district: district.to_string(),
            soil_color: soil.to_string(),
            crop: crop.to_string(),
            nitrogen: n,
            phosphorus: p,
        }
    }

    #[test]
    fn test_label_encoder_sorted_classes() {
        let encoder = LabelEncoder::fit("fertilizer", ["Urea", "DAP", "Urea", "Potash"]);
        assert_eq!(encoder.classes(), &["DAP", "Potash", "Urea"]);
        assert_eq!(encoder.transform("Urea").unwrap(), 2);
        assert_eq!(encoder.inverse_transform(0).unwrap(), "DAP");
    }

    #[test]
    fn test_label_encoder_errors() {
        let encoder = LabelEncoder::fit("fertilizer", ["Urea", "DAP"]);
        assert!(matches!(
            encoder.transform("Compost"),
            Err(ProcessingError::UnseenLabel { .. })
        ));
        assert!(matches!(
            encoder.inverse_transform(99),
            Err(ProcessingError::UnknownClassIndex { index: 99, classes: 2, .. })
        ));
        assert!(encoder.inverse_transform(-1).is_err());
    }

    #[test]
    fn test_hashed_category_is_stable_and_bounded() {
        let a = hashed_category("Mumbai", DISTRICT_HASH_BUCKETS);
        let b = hashed_category("Mumbai", DISTRICT_HASH_BUCKETS);
        assert_eq!(a, b);
        assert!((0.0..100.0).contains(&a));
        assert!((0.0..20.0).contains(&hashed_category("Black", SOIL_HASH_BUCKETS)));
    }

    #[test]
    fn test_fertilizer_encoders_baselines() {
        let encoders = FertilizerEncoders::fit(&[
            observation("Pune", "Black", "Wheat", 60.0, 30.0),
            observation("Pune", "Red", "Rice", 40.0, 20.0),
            observation("Satara", "Black", "Rice", 80.0, 10.0),
        ]);

        assert_eq!(
            encoders.baseline("Pune"),
            NpkBaseline {
                nitrogen: 50.0,
                phosphorus: 25.0
            }
        );
        assert_eq!(encoders.baseline("Nagpur"), NpkBaseline::default());
        assert_eq!(encoders.encode_district("Satara"), 1.0);
        assert_eq!(encoders.encode_crop("Rice"), 0.0);
        assert_eq!(
            encoders.encode_district("Nagpur"),
            hashed_category("Nagpur", DISTRICT_HASH_BUCKETS)
        );
    }
}
