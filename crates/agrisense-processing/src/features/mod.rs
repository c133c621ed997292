//! Feature engineering.
//!
//! Turns a [`RawRecord`] into the ordered [`FeatureVector`] a task's model was
//! trained on. The same functions run over every training row and every
//! inference request, so the two never drift apart.
//!
//! None of the engineer functions fail: a missing or unusable reading takes
//! the default documented in [`crate::record::inputs`].

mod crop_health;
mod fertilizer;
mod yield_prediction;

pub use crop_health::{CropHealthIndices, crop_health_indices, engineer_crop_health_features};
pub use fertilizer::engineer_fertilizer_features;
pub use yield_prediction::engineer_yield_features;

use crate::encoding::FertilizerEncoders;
use crate::record::RawRecord;
use crate::task::Task;
use serde::Serialize;
use serde::ser::SerializeMap;

/// An ordered mapping from feature name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Appends a feature. Pushing an existing name overwrites its value in place.
    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.values[i] = value,
            None => {
                self.names.push(name);
                self.values.push(value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.values[i])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Values reordered to `order`. Names this vector does not have become 0.
    pub fn align<S: AsRef<str>>(&self, order: &[S]) -> Vec<f64> {
        order
            .iter()
            .map(|name| self.get(name.as_ref()).unwrap_or(0.0))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl Serialize for FeatureVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Engineers the feature vector of `task` for one record.
///
/// `encoders` only affects the fertilizer task.
pub fn engineer_features(
    task: Task,
    raw: &RawRecord,
    encoders: Option<&FertilizerEncoders>,
) -> FeatureVector {
    match task {
        Task::CropHealth => engineer_crop_health_features(raw),
        Task::YieldPrediction => engineer_yield_features(raw),
        Task::Fertilizer => engineer_fertilizer_features(raw, encoders),
    }
}
