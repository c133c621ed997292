//! Per-column scalers fitted on the training split.

use crate::matrix;
use agrisense_processing::Task;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Mean / population standard deviation.
    Standard,
    /// Median / interquartile range.
    Robust,
    Identity,
}

impl ScalerKind {
    /// Robust scaling for the regression tasks, standard for fertilizer.
    pub fn for_task(task: Task) -> Self {
        match task {
            Task::CropHealth | Task::YieldPrediction => ScalerKind::Robust,
            Task::Fertilizer => ScalerKind::Standard,
        }
    }
}

/// A fitted scaler: `(v - center) / scale` per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    kind: ScalerKind,
    center: Vec<f64>,
    scale: Vec<f64>,
}

/// Linearly interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

fn usable_spread(spread: f64) -> f64 {
    if spread.is_finite() && spread > 0.0 { spread } else { 1.0 }
}

impl Scaler {
    pub fn fit(kind: ScalerKind, x: &[Vec<f64>]) -> Self {
        let d = matrix::width(x);
        let records = matrix::to_array(x, d);

        let (center, scale) = match kind {
            ScalerKind::Standard if records.nrows() > 0 => {
                let mean = records
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(d));
                let std = records.std_axis(Axis(0), 0.0);
                (mean, std.mapv(usable_spread))
            }
            ScalerKind::Robust => {
                let mut center = Array1::zeros(d);
                let mut scale = Array1::ones(d);
                for (j, column) in records.axis_iter(Axis(1)).enumerate() {
                    let mut sorted = column.to_vec();
                    sorted.sort_by(f64::total_cmp);
                    center[j] = quantile(&sorted, 0.5);
                    scale[j] = usable_spread(quantile(&sorted, 0.75) - quantile(&sorted, 0.25));
                }
                (center, scale)
            }
            _ => (Array1::zeros(d), Array1::ones(d)),
        };

        Self {
            kind,
            center: center.to_vec(),
            scale: scale.to_vec(),
        }
    }

    /// A scaler that leaves `n_features` columns unchanged.
    pub fn identity(n_features: usize) -> Self {
        Self {
            kind: ScalerKind::Identity,
            center: vec![0.0; n_features],
            scale: vec![1.0; n_features],
        }
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(v, (c, s))| (v - c) / s)
            .collect()
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let records = matrix::to_array(x, self.center.len());
        let scaled = (records - &matrix::view(&self.center)) / &matrix::view(&self.scale);
        matrix::to_rows(&scaled)
    }
}
