//! Gradient-boosted regression trees.
//!
//! Regression boosts squared loss from the target mean. Classification
//! boosts one tree per class on the multinomial deviance, starting from the
//! log class priors, with Newton-step leaf values.

use super::tree::{DecisionTree, TreeParams, TreeTarget};
use super::{Estimator, Output, TargetData, normalize};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BoostingParams {
    pub rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub min_samples_leaf: usize,
}

/// A fitted gradient boosting model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// Initial raw score per output.
    init: Vec<f64>,
    learning_rate: f64,
    /// One tree per output for every boosting round.
    stages: Vec<Vec<DecisionTree>>,
    n_features: usize,
    n_classes: Option<usize>,
}

pub(crate) fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

impl GradientBoosting {
    pub(crate) fn fit(params: BoostingParams, x: &[Vec<f64>], y: &TargetData, seed: u64) -> Self {
        let n = x.len();
        let tree_params = TreeParams {
            max_depth: Some(params.max_depth.max(1)),
            min_samples_leaf: params.min_samples_leaf.max(1),
            ..TreeParams::default()
        };
        let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(seed);

        let (init, outputs) = match y {
            TargetData::Continuous(values) => {
                (vec![values.iter().sum::<f64>() / n as f64], 1)
            }
            TargetData::Classes { labels, n_classes } => {
                let mut counts = vec![0usize; *n_classes];
                for &label in labels {
                    if let Some(c) = counts.get_mut(label) {
                        *c += 1;
                    }
                }
                let priors = counts
                    .iter()
                    .map(|&c| (c as f64 / n as f64).max(1e-12).ln())
                    .collect();
                (priors, *n_classes)
            }
        };

        // Raw scores per row and output
        let mut raw: Vec<Vec<f64>> = vec![init.clone(); n];
        let mut stages = Vec::with_capacity(params.rounds);

        for _ in 0..params.rounds {
            let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
            let mut round = Vec::with_capacity(outputs);

            match y {
                TargetData::Continuous(values) => {
                    let residuals: Vec<f64> =
                        values.iter().zip(&raw).map(|(t, f)| t - f[0]).collect();
                    let tree = DecisionTree::fit(
                        x,
                        TreeTarget::Regression(&residuals),
                        &sample,
                        &tree_params,
                        &mut rng,
                    );
                    for (row, f) in x.iter().zip(raw.iter_mut()) {
                        f[0] += params.learning_rate * tree.predict_value(row);
                    }
                    round.push(tree);
                }
                TargetData::Classes { labels, n_classes } => {
                    let proba: Vec<Vec<f64>> = raw.iter().map(|f| softmax(f)).collect();
                    for k in 0..*n_classes {
                        let residuals: Vec<f64> = labels
                            .iter()
                            .zip(&proba)
                            .map(|(&label, p)| f64::from(u8::from(label == k)) - p[k])
                            .collect();
                        let mut tree = DecisionTree::fit(
                            x,
                            TreeTarget::Regression(&residuals),
                            &sample,
                            &tree_params,
                            &mut rng,
                        );
                        newton_leaves(&mut tree, x, &residuals, &sample, *n_classes);
                        for (row, f) in x.iter().zip(raw.iter_mut()) {
                            f[k] += params.learning_rate * tree.predict_value(row);
                        }
                        round.push(tree);
                    }
                }
            }
            stages.push(round);
        }

        Self {
            init,
            learning_rate: params.learning_rate,
            stages,
            n_features: x.first().map_or(0, Vec::len),
            n_classes: y.n_classes(),
        }
    }

    pub fn n_rounds(&self) -> usize {
        self.stages.len()
    }

    fn raw_scores(&self, row: &[f64]) -> Vec<f64> {
        let mut scores = self.init.clone();
        for round in &self.stages {
            for (score, tree) in scores.iter_mut().zip(round) {
                *score += self.learning_rate * tree.predict_value(row);
            }
        }
        scores
    }
}

/// Replace each leaf with `(K-1)/K * sum(r) / sum(|r|(1-|r|))` over the
/// sampled rows it holds.
fn newton_leaves(
    tree: &mut DecisionTree,
    x: &[Vec<f64>],
    residuals: &[f64],
    sample: &[usize],
    n_classes: usize,
) {
    let mut sums = vec![(0.0_f64, 0.0_f64); tree.n_nodes()];
    for &i in sample {
        let leaf = tree.leaf_index(&x[i]);
        if let Some((num, den)) = sums.get_mut(leaf) {
            let r = residuals[i];
            *num += r;
            *den += r.abs() * (1.0 - r.abs());
        }
    }

    let scale = (n_classes.saturating_sub(1)) as f64 / n_classes.max(1) as f64;
    for (leaf, (num, den)) in sums.into_iter().enumerate() {
        let value = if den.abs() < 1e-150 { 0.0 } else { scale * num / den };
        tree.set_leaf_value(leaf, vec![value]);
    }
}

impl Estimator for GradientBoosting {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: &[f64]) -> Output {
        let scores = self.raw_scores(row);
        match self.n_classes {
            None => Output::Value(scores.first().copied().unwrap_or(0.0)),
            Some(_) => Output::Proba(softmax(&scores)),
        }
    }

    fn feature_importance(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in self.stages.iter().flatten() {
            for (acc, v) in total.iter_mut().zip(tree.feature_importance()) {
                *acc += v;
            }
        }
        normalize(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::test_data;
    use crate::evaluation::{accuracy, r2_score};

    fn params(rounds: usize) -> BoostingParams {
        BoostingParams {
            rounds,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 0.8,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_softmax_is_stable() {
        let p = softmax(&[1000.0, 1000.0, -1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!(p[2] < 1e-12);
    }

    #[test]
    fn test_regression_improves_with_rounds() {
        let (x, y) = test_data::linear_regression(80);
        let target = TargetData::Continuous(y.clone());

        let score = |rounds| {
            let model = GradientBoosting::fit(params(rounds), &x, &target, 42);
            let predictions: Vec<f64> = model.predict(&x).iter().map(Output::value).collect();
            r2_score(&y, &predictions)
        };

        let few = score(5);
        let many = score(100);
        assert!(many > few);
        assert!(many > 0.95);
    }

    #[test]
    fn test_zero_rounds_predicts_mean() {
        let y = vec![1.0, 2.0, 3.0, 6.0];
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let model = GradientBoosting::fit(params(0), &x, &TargetData::Continuous(y), 0);
        assert_eq!(model.predict_row(&[10.0]), Output::Value(3.0));
    }

    #[test]
    fn test_multiclass_boosting() {
        let (x, labels) = test_data::three_classes(15);
        let y = TargetData::Classes {
            labels: labels.clone(),
            n_classes: 3,
        };
        let model = GradientBoosting::fit(params(30), &x, &y, 5);

        assert_eq!(model.n_rounds(), 30);
        let outputs = model.predict(&x);
        let predicted: Vec<usize> = outputs.iter().map(Output::class).collect();
        assert!(accuracy(&labels, &predicted) > 0.95);
        let sum: f64 = outputs[0].probabilities().unwrap().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
