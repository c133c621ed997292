//! Univariate "keep the k best" feature selection.
//!
//! Regression targets are ranked by the F statistic of a one-feature linear
//! fit, class targets by the one-way ANOVA F statistic. Undefined scores
//! (constant columns) rank as 0; perfect fits are capped at `f64::MAX`.

use crate::estimators::TargetData;
use crate::matrix;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Scoring function used to rank features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    FRegression,
    FClassif,
    /// Keeps every feature in order.
    Identity,
}

/// A fitted selector: the kept column indices, in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    method: SelectionMethod,
    indices: Vec<usize>,
    scores: Vec<f64>,
    n_features: usize,
}

fn column_means(x: &Array2<f64>) -> Array1<f64> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}

/// F statistic of each column's one-feature linear fit.
fn f_regression(x: &Array2<f64>, y: &[f64]) -> Vec<f64> {
    let n = x.nrows() as f64;
    let y = matrix::view(y);
    let yc = &y - y.mean().unwrap_or(0.0);
    let xc = x - &column_means(x);

    let sxy = xc.t().dot(&yc);
    let sxx = xc.mapv(|v| v * v).sum_axis(Axis(0));
    let syy = yc.dot(&yc);

    sxy.iter()
        .zip(&sxx)
        .map(|(sxy, sxx)| {
            let r2 = sxy * sxy / (sxx * syy);
            (r2 / (1.0 - r2)) * (n - 2.0)
        })
        .collect()
}

/// One-way ANOVA F statistic of each column across the classes.
fn f_classif(x: &Array2<f64>, labels: &[usize], n_classes: usize) -> Vec<f64> {
    let d = x.ncols();
    let mut sums = Array2::<f64>::zeros((n_classes, d));
    let mut counts = Array1::<f64>::zeros(n_classes);
    for (row, &label) in x.outer_iter().zip(labels) {
        let mut acc = sums.row_mut(label);
        acc += &row;
        counts[label] += 1.0;
    }
    let means = &sums / &counts.mapv(|c| c.max(1.0)).insert_axis(Axis(1));
    let grand_mean = column_means(x);

    let mut between = Array1::<f64>::zeros(d);
    for (mean, &count) in means.outer_iter().zip(&counts) {
        between += &((&mean - &grand_mean).mapv(|v| v * v) * count);
    }
    let mut within = Array1::<f64>::zeros(d);
    for (row, &label) in x.outer_iter().zip(labels) {
        within += &(&row - &means.row(label)).mapv(|v| v * v);
    }

    let groups = counts.iter().filter(|&&c| c > 0.0).count() as f64;
    let df_between = groups - 1.0;
    let df_within = x.nrows() as f64 - groups;
    between
        .iter()
        .zip(&within)
        .map(|(b, w)| (b / df_between) / (w / df_within))
        .collect()
}

impl FeatureSelector {
    /// Rank every column of `x` against `y` and keep the `k` best.
    ///
    /// `k` is capped at the column count; ties keep the lower column index.
    pub fn fit(x: &[Vec<f64>], y: &TargetData, k: usize) -> Self {
        let n_features = matrix::width(x);
        let records = matrix::to_array(x, n_features);
        let (method, raw) = match y {
            TargetData::Continuous(values) => {
                (SelectionMethod::FRegression, f_regression(&records, values))
            }
            TargetData::Classes { labels, n_classes } => (
                SelectionMethod::FClassif,
                f_classif(&records, labels, *n_classes),
            ),
        };
        let scores: Vec<f64> = raw
            .into_iter()
            .map(|s| if s.is_nan() { 0.0 } else { s.clamp(0.0, f64::MAX) })
            .collect();

        let mut ranked: Vec<usize> = (0..n_features).collect();
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        let mut indices: Vec<usize> = ranked.into_iter().take(k.min(n_features)).collect();
        indices.sort_unstable();

        Self {
            method,
            indices,
            scores,
            n_features,
        }
    }

    /// A selector that passes `n_features` columns through unchanged.
    pub fn identity(n_features: usize) -> Self {
        Self {
            method: SelectionMethod::Identity,
            indices: (0..n_features).collect(),
            scores: Vec::new(),
            n_features,
        }
    }

    pub fn method(&self) -> SelectionMethod {
        self.method
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Per-column scores from fitting (empty for the identity selector).
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Width of the rows the selector expects.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_selected(&self) -> usize {
        self.indices.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        self.indices
            .iter()
            .map(|&j| row.get(j).copied().unwrap_or(0.0))
            .collect()
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }

    /// The names of the kept columns.
    pub fn selected_names(&self, names: &[String]) -> Vec<String> {
        self.indices
            .iter()
            .filter_map(|&j| names.get(j).cloned())
            .collect()
    }
}
