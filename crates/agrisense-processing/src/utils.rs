//! Shared column helpers for dataset preparation.

use polars::prelude::*;
use serde_json::Value;

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Names of the numeric columns of `df`, excluding `exclude`.
pub fn numeric_column_names(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric_dtype(c.dtype()) && !exclude.contains(&c.name().as_str()))
        .map(|c| c.name().to_string())
        .collect()
}

/// Values of a column as `f64`. Nulls and values that do not cast stay `None`.
pub fn column_as_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?.as_materialized_series();
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Values of a column as trimmed strings. Nulls and blank cells stay `None`.
pub fn column_as_string(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series();
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect())
}

/// Column values as JSON cells, numeric columns as numbers and the rest as text.
pub fn column_as_json(df: &DataFrame, name: &str) -> PolarsResult<Vec<Value>> {
    let dtype = df.column(name)?.dtype().clone();
    if is_numeric_dtype(&dtype) {
        Ok(column_as_f64(df, name)?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect())
    } else {
        Ok(column_as_string(df, name)?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::String))
            .collect())
    }
}
