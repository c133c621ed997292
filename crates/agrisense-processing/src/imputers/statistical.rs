//! Median imputation for numeric feature columns.

use crate::error::Result;
use crate::utils::numeric_column_names;
use polars::prelude::*;
use tracing::debug;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill nulls in one numeric column with the column median.
    ///
    /// Columns that are absent, have no nulls, or have no non-null values
    /// are left untouched.
    pub fn apply_numeric_median(
        df: &mut DataFrame,
        col_name: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<()> {
        let Ok(col) = df.column(col_name) else {
            return Ok(());
        };
        let series = col.as_materialized_series();
        if series.null_count() == 0 {
            return Ok(());
        }
        let Some(median_val) = series.median() else {
            return Ok(());
        };

        let nulls = series.null_count();
        let cast = series.cast(&DataType::Float64)?;
        let filled = cast.f64()?.apply(|v| Some(v.unwrap_or(median_val)));
        df.replace(col_name, filled.into_series())?;

        processing_steps.push(format!(
            "Filled {} nulls in '{}' with median: {:.2}",
            nulls, col_name, median_val
        ));
        debug!("Filled {} nulls in '{}' with median {:.4}", nulls, col_name, median_val);
        Ok(())
    }

    /// Median-fill every numeric column except `exclude`.
    pub fn impute_numeric_columns(
        df: &mut DataFrame,
        exclude: &[&str],
        processing_steps: &mut Vec<String>,
    ) -> Result<()> {
        for name in numeric_column_names(df, exclude) {
            Self::apply_numeric_median(df, &name, processing_steps)?;
        }
        Ok(())
    }
}
