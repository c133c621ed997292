//! Scoring functions and cross-validation.

use crate::error::Result;
use crate::estimators::{Estimator, EstimatorSpec, Output, TargetData, select_rows};
use crate::split;

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / y_true.len() as f64
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / y_true.len() as f64
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Support-weighted precision, recall and F1. Undefined ratios count as 0.
pub fn weighted_precision_recall_f1(
    y_true: &[usize],
    y_pred: &[usize],
    n_classes: usize,
) -> (f64, f64, f64) {
    let n = y_true.len();
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }

    let mut tp = vec![0usize; n_classes];
    let mut predicted = vec![0usize; n_classes];
    let mut support = vec![0usize; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if let Some(s) = support.get_mut(t) {
            *s += 1;
        }
        if let Some(c) = predicted.get_mut(p) {
            *c += 1;
        }
        if t == p
            && let Some(c) = tp.get_mut(t)
        {
            *c += 1;
        }
    }

    let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for c in 0..n_classes {
        let weight = support[c] as f64 / n as f64;
        let p = ratio(tp[c], predicted[c]);
        let r = ratio(tp[c], support[c]);
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }
    (precision, recall, f1)
}

/// Mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// `"low"` below a 0.05 train/test gap, `"high"` above 0.15, `"medium"` between.
pub fn overfitting_risk(train_score: f64, test_score: f64) -> &'static str {
    let gap = train_score - test_score;
    if gap < 0.05 {
        "low"
    } else if gap <= 0.15 {
        "medium"
    } else {
        "high"
    }
}

/// R² for continuous targets, accuracy for classes.
pub fn score(y: &TargetData, outputs: &[Output]) -> f64 {
    match y {
        TargetData::Continuous(values) => {
            let predictions: Vec<f64> = outputs.iter().map(Output::value).collect();
            r2_score(values, &predictions)
        }
        TargetData::Classes { labels, .. } => {
            let predictions: Vec<usize> = outputs.iter().map(Output::class).collect();
            accuracy(labels, &predictions)
        }
    }
}

/// Regression or classification extras for a set of predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetailedMetrics {
    Regression { mse: f64, rmse: f64, mae: f64 },
    Classification { accuracy: f64, precision: f64, recall: f64, f1: f64 },
}

pub fn detailed_metrics(y: &TargetData, outputs: &[Output]) -> DetailedMetrics {
    match y {
        TargetData::Continuous(values) => {
            let predictions: Vec<f64> = outputs.iter().map(Output::value).collect();
            let mse = mean_squared_error(values, &predictions);
            DetailedMetrics::Regression {
                mse,
                rmse: mse.sqrt(),
                mae: mean_absolute_error(values, &predictions),
            }
        }
        TargetData::Classes { labels, n_classes } => {
            let predictions: Vec<usize> = outputs.iter().map(Output::class).collect();
            let (precision, recall, f1) =
                weighted_precision_recall_f1(labels, &predictions, *n_classes);
            DetailedMetrics::Classification {
                accuracy: accuracy(labels, &predictions),
                precision,
                recall,
                f1,
            }
        }
    }
}

/// K-fold CV scores with a freshly fitted estimator per fold.
///
/// Returns an empty list when there are fewer than two rows.
pub fn cross_val_scores(
    spec: &EstimatorSpec,
    x: &[Vec<f64>],
    y: &TargetData,
    folds: usize,
    seed: u64,
) -> Result<Vec<f64>> {
    if x.len() < 2 {
        return Ok(Vec::new());
    }
    split::folds_for(y, folds.min(x.len()), seed)
        .into_iter()
        .map(|(train, test)| {
            let model = spec.fit(&select_rows(x, &train), &y.select(&train), seed)?;
            let outputs = model.predict(&select_rows(x, &test));
            Ok(score(&y.select(&test), &outputs))
        })
        .collect()
}
