//! Linear meta-learners: ridge regression and multinomial logistic regression.
//!
//! Both fit through linfa on `ndarray` matrices and keep only plain weight
//! vectors, so bundles serialize the same way as the tree models.

use super::boosting::softmax;
use super::{Estimator, Output, TargetData, normalize};
use crate::error::{AgriLearningError, Result};
use crate::matrix;
use linfa::prelude::*;
use linfa_elasticnet::ElasticNet;
use linfa_logistic::MultiLogisticRegression;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

/// L2-penalized least squares with an unpenalized intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ridge {
    coefficients: Vec<f64>,
    intercept: f64,
    alpha: f64,
}

impl Ridge {
    /// Fit `min ||y - Xw - b||² + alpha ||w||²`.
    ///
    /// Zero-variance columns get a zero coefficient and are left out of the
    /// solve.
    pub(crate) fn fit(alpha: f64, x: &[Vec<f64>], y: &TargetData) -> Result<Self> {
        let TargetData::Continuous(y) = y else {
            return Err(AgriLearningError::TrainingFailed(
                "ridge regression needs a continuous target".to_string(),
            ));
        };

        let d = matrix::width(x);
        let records = matrix::to_array(x, d);
        let targets = Array1::from(y.clone());

        let varying: Vec<usize> = records
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, column)| column.std(0.0) > 0.0)
            .map(|(j, _)| j)
            .collect();

        let mut coefficients = vec![0.0; d];
        let mut intercept = targets.mean().unwrap_or(0.0);

        if !varying.is_empty() {
            let records = records.select(Axis(1), &varying);
            // linfa scales the squared loss by 1 / 2n
            let penalty = alpha.max(0.0) / records.nrows() as f64;
            let dataset = Dataset::new(records, targets);
            let model = ElasticNet::<f64>::params()
                .l1_ratio(0.0)
                .penalty(penalty)
                .tolerance(1e-8)
                .max_iterations(10_000)
                .fit(&dataset)
                .map_err(|e| AgriLearningError::TrainingFailed(format!("ridge fit: {e}")))?;

            for (&j, &c) in varying.iter().zip(model.hyperplane()) {
                coefficients[j] = c;
            }
            intercept = model.intercept();
        }

        Ok(Self {
            coefficients,
            intercept,
            alpha,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Estimator for Ridge {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_row(&self, row: &[f64]) -> Output {
        Output::Value(
            self.intercept
                + self
                    .coefficients
                    .iter()
                    .zip(row)
                    .map(|(c, v)| c * v)
                    .sum::<f64>(),
        )
    }

    fn feature_importance(&self) -> Vec<f64> {
        normalize(self.coefficients.iter().map(|c| c.abs()).collect())
    }
}

/// Multinomial logistic regression with an L2 penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Labels seen in training, ascending. Other classes predict 0.
    classes: Vec<usize>,
    /// One weight row per entry of `classes`.
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    n_features: usize,
    n_classes: usize,
}

impl LogisticRegression {
    pub(crate) fn fit(max_iter: usize, l2: f64, x: &[Vec<f64>], y: &TargetData) -> Result<Self> {
        let TargetData::Classes { labels, n_classes } = y else {
            return Err(AgriLearningError::TrainingFailed(
                "logistic regression needs a categorical target".to_string(),
            ));
        };
        let d = matrix::width(x);

        let mut classes = labels.clone();
        classes.sort_unstable();
        classes.dedup();

        let (weights, bias) = if classes.len() < 2 {
            // a single class needs no decision function
            (vec![vec![0.0; d]; classes.len()], vec![0.0; classes.len()])
        } else {
            let dataset = Dataset::new(
                matrix::to_array(x, d),
                Array1::from_iter(labels.iter().copied()),
            );
            let model = MultiLogisticRegression::<f64>::default()
                .alpha(l2.max(0.0))
                .max_iterations(max_iter as u64)
                .fit(&dataset)
                .map_err(|e| {
                    AgriLearningError::TrainingFailed(format!("logistic regression fit: {e}"))
                })?;

            // params are n_features x n_classes, classes in ascending order
            let weights: Vec<Vec<f64>> = model
                .params()
                .axis_iter(Axis(1))
                .map(|column| column.to_vec())
                .collect();
            (weights, model.intercept().to_vec())
        };

        Ok(Self {
            classes,
            weights,
            bias,
            n_features: d,
            n_classes: *n_classes,
        })
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }
}

impl Estimator for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: &[f64]) -> Output {
        let scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| b + w.iter().zip(row).map(|(w, v)| w * v).sum::<f64>())
            .collect();

        let mut proba = vec![0.0; self.n_classes];
        for (&class, p) in self.classes.iter().zip(softmax(&scores)) {
            if let Some(slot) = proba.get_mut(class) {
                *slot = p;
            }
        }
        Output::Proba(proba)
    }

    fn feature_importance(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for row in &self.weights {
            for (t, w) in totals.iter_mut().zip(row) {
                *t += w.abs();
            }
        }
        normalize(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::test_data;
    use crate::evaluation::{accuracy, r2_score};

    #[test]
    fn test_ridge_recovers_linear_relation() {
        let (x, y) = test_data::linear_regression(100);
        let model = Ridge::fit(1e-6, &x, &TargetData::Continuous(y.clone())).unwrap();

        assert!((model.coefficients()[0] - 3.0).abs() < 1e-2);
        assert!((model.coefficients()[1] + 2.0).abs() < 1e-2);
        assert!((model.intercept() - 1.0).abs() < 1e-2);

        let predictions: Vec<f64> = model.predict(&x).iter().map(Output::value).collect();
        assert!(r2_score(&y, &predictions) > 0.999);
    }

    #[test]
    fn test_ridge_penalty_shrinks_coefficients() {
        let (x, y) = test_data::linear_regression(100);
        let y = TargetData::Continuous(y);
        let loose = Ridge::fit(1e-6, &x, &y).unwrap();
        let tight = Ridge::fit(100.0, &x, &y).unwrap();
        assert!(tight.coefficients()[0].abs() < loose.coefficients()[0].abs());
    }

    #[test]
    fn test_ridge_handles_constant_column() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
        let model = Ridge::fit(0.0, &x, &TargetData::Continuous(y)).unwrap();
        assert_eq!(model.coefficients()[1], 0.0);
        assert!((model.predict_row(&[4.0, 1.0]).value() - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_ridge_rejects_classes() {
        let y = TargetData::Classes {
            labels: vec![0, 1],
            n_classes: 2,
        };
        assert!(Ridge::fit(0.1, &[vec![0.0], vec![1.0]], &y).is_err());
    }

    #[test]
    fn test_logistic_on_probability_features() {
        // meta features shaped like member class probabilities
        let mut x = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let class = i % 3;
            let strength = 0.6 + (i % 4) as f64 * 0.1;
            let mut row = vec![(1.0 - strength) / 2.0; 3];
            row[class] = strength;
            x.push(row);
            labels.push(class);
        }
        let y = TargetData::Classes {
            labels: labels.clone(),
            n_classes: 3,
        };
        let model = LogisticRegression::fit(1000, 1.0, &x, &y).unwrap();

        let predicted: Vec<usize> = model.predict(&x).iter().map(Output::class).collect();
        assert_eq!(accuracy(&labels, &predicted), 1.0);
        assert_eq!(model.classes(), &[0, 1, 2]);
    }

    #[test]
    fn test_logistic_scatters_missing_classes() {
        // class 1 never appears in this fold
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 10.0]).collect();
        let labels: Vec<usize> = (0..20).map(|i| if i < 10 { 0 } else { 2 }).collect();
        let y = TargetData::Classes {
            labels,
            n_classes: 3,
        };
        let model = LogisticRegression::fit(500, 1.0, &x, &y).unwrap();

        let Output::Proba(proba) = model.predict_row(&[1.9]) else {
            panic!("expected probabilities");
        };
        assert_eq!(proba.len(), 3);
        assert_eq!(proba[1], 0.0);
        assert!(proba[2] > proba[0]);
    }

    #[test]
    fn test_logistic_single_class() {
        let y = TargetData::Classes {
            labels: vec![1, 1, 1],
            n_classes: 2,
        };
        let model = LogisticRegression::fit(100, 1.0, &[vec![0.0], vec![1.0], vec![2.0]], &y)
            .unwrap();
        assert_eq!(model.predict_row(&[5.0]), Output::Proba(vec![0.0, 1.0]));
    }

    #[test]
    fn test_logistic_rejects_continuous() {
        let y = TargetData::Continuous(vec![0.0, 1.0]);
        assert!(LogisticRegression::fit(10, 1.0, &[vec![0.0], vec![1.0]], &y).is_err());
    }
}
