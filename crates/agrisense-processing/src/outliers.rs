//! Target outlier filtering.
//!
//! Rows whose target lies outside the IQR fence are removed before training.

use crate::error::{ProcessingError, Result};
use polars::prelude::*;
use tracing::debug;

/// Inclusive bounds `[Q1 - m*IQR, Q3 + m*IQR]` of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Handles outlier detection and treatment.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Quartiles of `col_name` and the fence they define.
    ///
    /// Quartiles are read by position in the sorted non-null values
    /// (`n * 0.25` and `n * 0.75`).
    pub fn iqr_fence(df: &DataFrame, col_name: &str, multiplier: f64) -> Result<IqrFence> {
        let series = df.column(col_name)?.as_materialized_series();
        let float_series = series.cast(&DataType::Float64)?.drop_nulls();
        if float_series.is_empty() {
            return Err(ProcessingError::NoValidValues(col_name.to_string()));
        }

        let sorted = float_series.sort(SortOptions::default())?;
        let n = sorted.len();
        let q1_idx = (n as f64 * 0.25) as usize;
        let q3_idx = ((n as f64 * 0.75) as usize).min(n - 1);

        let q1 = sorted.get(q1_idx)?.try_extract::<f64>()?;
        let q3 = sorted.get(q3_idx)?.try_extract::<f64>()?;
        let iqr = q3 - q1;

        Ok(IqrFence {
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    /// Remove rows whose `col_name` value lies outside the IQR fence.
    ///
    /// Null values are kept. Returns the number of rows removed.
    pub fn remove_outliers(
        df: &mut DataFrame,
        col_name: &str,
        multiplier: f64,
        processing_steps: &mut Vec<String>,
    ) -> Result<usize> {
        let fence = Self::iqr_fence(df, col_name, multiplier)?;
        let original_rows = df.height();

        let float_series = df
            .column(col_name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let mask: BooleanChunked = float_series
            .f64()?
            .into_iter()
            .map(|v| Some(v.is_none_or(|val| fence.contains(val))))
            .collect();
        *df = df.filter(&mask)?;

        let rows_removed = original_rows - df.height();
        if rows_removed > 0 {
            processing_steps.push(format!(
                "Removed {} rows with '{}' outside [{:.3}, {:.3}]",
                rows_removed, col_name, fence.lower, fence.upper
            ));
            debug!("Removed {} outlier rows on '{}'", rows_removed, col_name);
        }

        Ok(rows_removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iqr_fence() {
        let df = df!["y" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]].unwrap();
        let fence = OutlierHandler::iqr_fence(&df, "y", 1.5).unwrap();

        // idx 2 and 6 of the sorted values
        assert_eq!(fence.q1, 3.0);
        assert_eq!(fence.q3, 7.0);
        assert_eq!(fence.lower, -3.0);
        assert_eq!(fence.upper, 13.0);
    }

    #[test]
    fn test_remove_outliers() {
        let mut df = df![
            "y" => [Some(2.0), Some(2.5), Some(3.0), Some(3.5), Some(2.8), Some(40.0), None],
            "NDVI" => [0.5, 0.6, 0.7, 0.65, 0.55, 0.9, 0.4],
        ]
        .unwrap();
        let mut steps = Vec::new();

        let removed = OutlierHandler::remove_outliers(&mut df, "y", 1.5, &mut steps).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(df.height(), 6);
        assert_eq!(df.column("y").unwrap().null_count(), 1);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_no_outliers_no_step() {
        let mut df = df!["y" => [1.0, 1.1, 1.2, 1.3]].unwrap();
        let mut steps = Vec::new();

        let removed = OutlierHandler::remove_outliers(&mut df, "y", 1.5, &mut steps).unwrap();

        assert_eq!(removed, 0);
        assert!(steps.is_empty());
    }

    #[test]
    fn test_all_null_column_errors() {
        let df = df!["y" => [None::<f64>, None]].unwrap();
        assert!(matches!(
            OutlierHandler::iqr_fence(&df, "y", 1.5),
            Err(ProcessingError::NoValidValues(_))
        ));
    }
}
