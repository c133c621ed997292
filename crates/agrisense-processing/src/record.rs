//! Raw input records and the input-field catalogue.
//!
//! A [`RawRecord`] is the loosely-typed mapping a caller sends for one field
//! observation. Values are looked up by their API key first and then by the
//! training-dataset column names, so a record built from a CSV row and a
//! record posted by a client engineer to the same features.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A numeric input with its lookup keys and documented default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericInput {
    /// API key, e.g. `ndvi`.
    pub key: &'static str,
    /// Dataset column names accepted in place of the key.
    pub aliases: &'static [&'static str],
    /// Value used when the record has nothing usable.
    pub default: f64,
}

/// A categorical input with its lookup keys and documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextInput {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    pub default: &'static str,
}

macro_rules! numeric_inputs {
    ($($name:ident => $key:literal, [$($alias:literal),*], $default:expr;)*) => {
        $(
            pub const $name: NumericInput = NumericInput {
                key: $key,
                aliases: &[$($alias),*],
                default: $default,
            };
        )*

        /// Every numeric input, in catalogue order.
        pub const NUMERIC_INPUTS: &[NumericInput] = &[$($name),*];
    };
}

/// Input catalogue shared by training and inference.
pub mod inputs {
    use super::{NumericInput, TextInput};

    numeric_inputs! {
        NDVI => "ndvi", ["NDVI"], 0.7;
        SAVI => "savi", ["SAVI"], 0.4;
        CHLOROPHYLL => "chlorophyll", ["Chlorophyll_Content"], 45.0;
        LAI => "lai", ["Leaf_Area_Index"], 3.5;
        TEMPERATURE => "temperature", ["Temperature"], 28.0;
        HUMIDITY => "humidity", ["Humidity"], 75.0;
        RAINFALL => "rainfall", ["Rainfall"], 50.0;
        WIND_SPEED => "wind_speed", ["Wind_Speed"], 10.0;
        SOIL_MOISTURE => "soil_moisture", ["Soil_Moisture"], 35.0;
        SOIL_PH => "soil_ph", ["Soil_pH", "pH"], 6.5;
        ORGANIC_MATTER => "organic_matter", ["Organic_Matter"], 2.5;
        RGB_QUALITY => "rgb_quality", ["High_Resolution_RGB"], 85.0;
        MULTISPECTRAL_QUALITY => "multispectral_quality", ["Multispectral_Images"], 80.0;
        THERMAL_QUALITY => "thermal_quality", ["Thermal_Images"], 75.0;
        SPATIAL_RESOLUTION => "spatial_resolution", ["Spatial_Resolution"], 0.5;
        CANOPY_COVERAGE => "canopy_coverage", ["Canopy_Coverage"], 70.0;
        STRESS_INDICATOR => "stress_indicator", ["Crop_Stress_Indicator"], 20.0;
        GROWTH_STAGE => "growth_stage", ["Crop_Growth_Stage"], 3.0;
        NITROGEN => "nitrogen", ["Nitrogen"], 50.0;
        PHOSPHORUS => "phosphorus", ["Phosphorus"], 25.0;
        POTASSIUM => "potassium", ["Potassium"], 30.0;
    }

    pub const DISTRICT: TextInput = TextInput {
        key: "district",
        aliases: &["District_Name"],
        default: "Mumbai",
    };

    pub const CROP: TextInput = TextInput {
        key: "crop",
        aliases: &["Crop", "Crop_Type", "crop_type"],
        default: "Rice",
    };

    pub const SOIL_COLOR: TextInput = TextInput {
        key: "soil_color",
        aliases: &["Soil_color"],
        default: "Brown",
    };
}

/// A flat mapping of named readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON value. Non-object values give an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Inserts a field, replacing any existing value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Reads a numeric input. JSON numbers and numeric strings are accepted;
    /// non-finite and unparseable values count as absent.
    pub fn number(&self, input: &NumericInput) -> Option<f64> {
        std::iter::once(input.key)
            .chain(input.aliases.iter().copied())
            .find_map(|key| self.fields.get(key).and_then(value_as_f64))
    }

    /// Reads a numeric input, falling back to its documented default.
    pub fn number_or_default(&self, input: &NumericInput) -> f64 {
        self.number(input).unwrap_or(input.default)
    }

    /// Reads a categorical input. Blank strings count as absent; numbers are
    /// rendered as text.
    pub fn text(&self, input: &TextInput) -> Option<String> {
        std::iter::once(input.key)
            .chain(input.aliases.iter().copied())
            .find_map(|key| self.fields.get(key).and_then(value_as_text))
    }

    pub fn text_or_default(&self, input: &TextInput) -> String {
        self.text(input)
            .unwrap_or_else(|| input.default.to_string())
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
