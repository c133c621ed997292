//! Training-table loading and preparation.
//!
//! [`DatasetPreparer::prepare`] turns a raw training table into the numeric
//! matrix a task's models are fitted on. Every row goes through the same
//! feature-engineering functions used at inference.

use crate::config::PreparationConfig;
use crate::encoding::{FertilizerEncoders, FertilizerObservation, LabelEncoder};
use crate::error::{ProcessingError, Result, ResultExt};
use crate::features::engineer_features;
use crate::imputers::StatisticalImputer;
use crate::outliers::OutlierHandler;
use crate::record::RawRecord;
use crate::record::inputs::{CROP, DISTRICT, NITROGEN, PHOSPHORUS, SOIL_COLOR};
use crate::task::{ProblemType, Task};
use crate::utils::{column_as_f64, column_as_json, column_as_string};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

/// Load a CSV file, retrying with relaxed parsing when the standard read fails.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ProcessingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("CSV file not found: {}", path.display()),
        )));
    }

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard CSV loading failed: {}", e),
    }

    let content = std::fs::read_to_string(path)?;
    let cleaned = clean_csv_content(&content);
    CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .into_reader_with_file_handle(std::io::Cursor::new(cleaned))
        .finish()
        .context(format!("Loading {}", path.display()))
}

fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Target values of a prepared table.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetValues {
    Continuous(Vec<f64>),
    Classes {
        encoded: Vec<usize>,
        encoder: LabelEncoder,
    },
}

impl TargetValues {
    pub fn len(&self) -> usize {
        match self {
            TargetValues::Continuous(v) => v.len(),
            TargetValues::Classes { encoded, .. } => encoded.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A task's training matrix, ready for selection and fitting.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub task: Task,
    /// Column order of `rows`, equal to the task's declared feature list.
    pub feature_names: Vec<String>,
    /// Row-major feature matrix.
    pub rows: Vec<Vec<f64>>,
    pub target: TargetValues,
    /// Categorical encoders and district baselines (fertilizer only).
    pub fertilizer_encoders: Option<FertilizerEncoders>,
    /// Human-readable log of what preparation did to the table.
    pub processing_steps: Vec<String>,
    /// Row count of the table before any row was dropped.
    pub source_rows: usize,
}

impl PreparedDataset {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// Prepares training tables according to a [`PreparationConfig`].
#[derive(Debug, Clone, Default)]
pub struct DatasetPreparer {
    config: PreparationConfig,
}

impl DatasetPreparer {
    pub fn new(config: PreparationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreparationConfig {
        &self.config
    }

    /// Prepare `df` for `task`.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::TargetNotFound`] when the target column is absent and
    /// [`ProcessingError::EmptyDataset`] when fewer than `min_rows` usable rows
    /// remain.
    pub fn prepare(&self, task: Task, df: &DataFrame) -> Result<PreparedDataset> {
        let target = task.target_column();
        if df.column(target).is_err() {
            return Err(ProcessingError::TargetNotFound(target.to_string()));
        }
        if df.height() == 0 {
            return Err(ProcessingError::EmptyDataset(task.to_string()));
        }

        info!("Preparing {} table ({} rows)", task, df.height());
        let source_rows = df.height();
        let mut steps = Vec::new();

        let mut df = df
            .clone()
            .lazy()
            .filter(col(target).is_not_null())
            .collect()
            .context(format!("Dropping rows without '{target}'"))?;
        let dropped = source_rows - df.height();
        if dropped > 0 {
            steps.push(format!("Dropped {dropped} rows with a missing '{target}'"));
        }

        if self.config.impute_missing {
            StatisticalImputer::impute_numeric_columns(&mut df, &[target], &mut steps)?;
        }

        if task.problem_type() == ProblemType::Regression && self.config.filters_outliers(task) {
            OutlierHandler::remove_outliers(
                &mut df,
                target,
                self.config.iqr_multiplier,
                &mut steps,
            )?;
        }

        let (records, target) = match task.problem_type() {
            ProblemType::Regression => {
                let values = column_as_f64(&df, target)?;
                let keep: Vec<Option<f64>> = values
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect();
                let records = records_for(&df, target, |i| keep[i].is_some())?;
                let targets: Vec<f64> = keep.into_iter().flatten().collect();
                (records, TargetOutput::Continuous(targets))
            }
            ProblemType::Classification => {
                let labels = column_as_string(&df, target)?;
                let records = records_for(&df, target, |i| labels[i].is_some())?;
                let labels: Vec<String> = labels.into_iter().flatten().collect();
                (records, TargetOutput::Labels(labels))
            }
        };

        if records.len() < self.config.min_rows {
            warn!(
                "{} has {} usable rows, {} required",
                task,
                records.len(),
                self.config.min_rows
            );
            return Err(ProcessingError::EmptyDataset(task.to_string()));
        }

        let fertilizer_encoders = (task == Task::Fertilizer).then(|| {
            let observations: Vec<FertilizerObservation> = records
                .iter()
                .map(|r| FertilizerObservation {
                    district: r.text_or_default(&DISTRICT),
                    soil_color: r.text_or_default(&SOIL_COLOR),
                    crop: r.text_or_default(&CROP),
                    nitrogen: r.number_or_default(&NITROGEN),
                    phosphorus: r.number_or_default(&PHOSPHORUS),
                })
                .collect();
            FertilizerEncoders::fit(&observations)
        });

        let rows: Vec<Vec<f64>> = records
            .iter()
            .map(|r| {
                engineer_features(task, r, fertilizer_encoders.as_ref())
                    .values()
                    .to_vec()
            })
            .collect();
        steps.push(format!(
            "Engineered {} features for {} rows",
            task.feature_names().len(),
            rows.len()
        ));

        let target = match target {
            TargetOutput::Continuous(values) => TargetValues::Continuous(values),
            TargetOutput::Labels(labels) => {
                let encoder = LabelEncoder::fit(task.as_str(), &labels);
                let encoded = labels
                    .iter()
                    .map(|l| encoder.transform(l))
                    .collect::<Result<Vec<_>>>()?;
                steps.push(format!("Encoded {} target classes", encoder.len()));
                TargetValues::Classes { encoded, encoder }
            }
        };

        info!(
            "Prepared {} table: {} of {} rows kept",
            task,
            rows.len(),
            source_rows
        );

        Ok(PreparedDataset {
            task,
            feature_names: task.feature_names().iter().map(|s| s.to_string()).collect(),
            rows,
            target,
            fertilizer_encoders,
            processing_steps: steps,
            source_rows,
        })
    }
}

enum TargetOutput {
    Continuous(Vec<f64>),
    Labels(Vec<String>),
}

/// One [`RawRecord`] per row of `df` accepted by `keep`, without the target column.
fn records_for(df: &DataFrame, target: &str, keep: impl Fn(usize) -> bool) -> Result<Vec<RawRecord>> {
    let columns: Vec<(String, Vec<Value>)> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != target)
        .map(|name| -> Result<(String, Vec<Value>)> {
            Ok((name.to_string(), column_as_json(df, name.as_str())?))
        })
        .collect::<Result<_>>()?;

    Ok((0..df.height())
        .filter(|&i| keep(i))
        .map(|i| {
            let fields: Map<String, Value> = columns
                .iter()
                .map(|(name, values)| (name.clone(), values[i].clone()))
                .collect();
            RawRecord::from(fields)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::engineer_crop_health_features;

    fn agriculture_frame() -> DataFrame {
        df![
            "NDVI" => [Some(0.5), Some(0.6), None, Some(0.8), Some(0.7)],
            "SAVI" => [0.3, 0.35, 0.4, 0.5, 0.45],
            "Temperature" => [24.0, 27.0, 30.0, 36.0, 28.0],
            "Crop_Type" => ["Rice", "Wheat", "Rice", "Cotton", "Rice"],
            "Crop_Health_Label" => [Some(0.4), Some(0.6), Some(0.7), None, Some(0.9)],
            "Expected_Yield" => [Some(2.5), Some(3.0), Some(3.2), Some(2.8), Some(40.0)],
        ]
        .unwrap()
    }

    #[test]
    fn test_missing_target() {
        let df = df!["NDVI" => [0.5]].unwrap();
        let err = DatasetPreparer::default()
            .prepare(Task::CropHealth, &df)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::TargetNotFound(_)));
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_empty_table() {
        let df = df!["Expected_Yield" => Vec::<f64>::new()].unwrap();
        let err = DatasetPreparer::default()
            .prepare(Task::YieldPrediction, &df)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::EmptyDataset(_)));
    }

    #[test]
    fn test_null_targets_dropped_and_features_engineered() {
        let prepared = DatasetPreparer::default()
            .prepare(Task::CropHealth, &agriculture_frame())
            .unwrap();

        assert_eq!(prepared.n_rows(), 4);
        assert_eq!(prepared.source_rows, 5);
        assert_eq!(prepared.n_features(), 26);
        assert_eq!(prepared.target, TargetValues::Continuous(vec![0.4, 0.6, 0.7, 0.9]));

        // NDVI null imputed with the median of the kept rows [0.5, 0.6, 0.7]
        let ndvi_idx = prepared.feature_names.iter().position(|n| n == "NDVI").unwrap();
        assert!((prepared.rows[2][ndvi_idx] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_rows_match_inference_features() {
        let prepared = DatasetPreparer::default()
            .prepare(Task::CropHealth, &agriculture_frame())
            .unwrap();
        let record = RawRecord::new()
            .with("NDVI", 0.5)
            .with("SAVI", 0.3)
            .with("Temperature", 24.0);

        assert_eq!(
            prepared.rows[0],
            engineer_crop_health_features(&record).values().to_vec()
        );
    }

    #[test]
    fn test_yield_outliers_removed() {
        let prepared = DatasetPreparer::default()
            .prepare(Task::YieldPrediction, &agriculture_frame())
            .unwrap();

        assert_eq!(prepared.n_rows(), 4);
        assert!(
            prepared
                .processing_steps
                .iter()
                .any(|s| s.contains("Expected_Yield"))
        );
    }

    #[test]
    fn test_fertilizer_classes_and_encoders() {
        let df = df![
            "District_Name" => ["Pune", "Pune", "Satara"],
            "Soil_color" => ["Black", "Red", "Black"],
            "Crop" => ["Wheat", "Rice", "Rice"],
            "Nitrogen" => [60.0, 40.0, 80.0],
            "Phosphorus" => [30.0, 20.0, 10.0],
            "Potassium" => [20.0, 30.0, 40.0],
            "pH" => [6.5, 7.0, 7.5],
            "Rainfall" => [500.0, 700.0, 900.0],
            "Temperature" => [25.0, 26.0, 27.0],
            "Fertilizer" => [Some("Urea"), Some("DAP"), Some("Urea")],
        ]
        .unwrap();

        let prepared = DatasetPreparer::default()
            .prepare(Task::Fertilizer, &df)
            .unwrap();

        let TargetValues::Classes { encoded, encoder } = &prepared.target else {
            panic!("fertilizer target should be categorical");
        };
        assert_eq!(encoded, &vec![1, 0, 1]);
        assert_eq!(encoder.classes(), &["DAP", "Urea"]);

        let encoders = prepared.fertilizer_encoders.as_ref().unwrap();
        assert_eq!(encoders.baseline("Pune").nitrogen, 50.0);

        let dev_idx = prepared
            .feature_names
            .iter()
            .position(|n| n == "district_n_deviation")
            .unwrap();
        assert_eq!(prepared.rows[0][dev_idx], 10.0);
    }

    #[test]
    fn test_min_rows() {
        let preparer = DatasetPreparer::new(
            PreparationConfig::builder().min_rows(10).build().unwrap(),
        );
        let err = preparer
            .prepare(Task::CropHealth, &agriculture_frame())
            .unwrap_err();
        assert!(matches!(err, ProcessingError::EmptyDataset(_)));
    }

    #[test]
    fn test_load_missing_csv() {
        assert!(load_csv("does/not/exist.csv").is_err());
    }
}
