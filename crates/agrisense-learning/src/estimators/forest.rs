//! Random forests and extremely randomized trees.

use super::tree::{DecisionTree, MaxFeatures, Splitter, TreeParams, TreeTarget};
use super::{Estimator, Output, TargetData, normalize};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Per-class sample weighting for classification forests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every row weighs 1.
    #[default]
    None,
    /// `n_rows / (n_present_classes * class_count)`, so each class present
    /// in training carries the same total weight.
    Balanced,
}

impl ClassWeight {
    /// Weights per class for `labels`, or `None` when rows are unweighted.
    pub fn weights(&self, labels: &[usize], n_classes: usize) -> Option<Vec<f64>> {
        match self {
            ClassWeight::None => None,
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &label in labels {
                    if let Some(c) = counts.get_mut(label) {
                        *c += 1;
                    }
                }
                let present = counts.iter().filter(|&&c| c > 0).count().max(1) as f64;
                let n = labels.len() as f64;
                Some(
                    counts
                        .iter()
                        .map(|&c| if c == 0 { 0.0 } else { n / (present * c as f64) })
                        .collect(),
                )
            }
        }
    }
}

fn default_min_samples_split() -> usize {
    2
}

/// Parameters shared by random forest and extra trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Draw a bootstrap sample per tree.
    pub bootstrap: bool,
    pub splitter: Splitter,
    pub max_features: MaxFeatures,
    /// Ignored by regression forests.
    #[serde(default)]
    pub class_weight: ClassWeight,
}

impl ForestParams {
    /// Bootstrapped trees with exhaustive splits.
    pub fn random_forest(n_trees: usize, max_depth: Option<usize>, min_samples_leaf: usize) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf,
            bootstrap: true,
            splitter: Splitter::Best,
            max_features: MaxFeatures::All,
            class_weight: ClassWeight::None,
        }
    }

    /// Full-sample trees with random thresholds.
    pub fn extra_trees(n_trees: usize, max_depth: Option<usize>, min_samples_leaf: usize) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf,
            bootstrap: false,
            splitter: Splitter::Random,
            max_features: MaxFeatures::All,
            class_weight: ClassWeight::None,
        }
    }

    /// Consider `sqrt(n_features)` features per node, the usual choice for
    /// classification forests.
    #[must_use]
    pub fn with_sqrt_features(mut self) -> Self {
        self.max_features = MaxFeatures::Sqrt;
        self
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    #[must_use]
    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }
}

/// A fitted forest: the average of its trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    name: String,
    trees: Vec<DecisionTree>,
    n_features: usize,
    /// Set for classification forests.
    n_classes: Option<usize>,
}

impl Forest {
    pub(crate) fn fit(
        name: &str,
        params: &ForestParams,
        x: &[Vec<f64>],
        y: &TargetData,
        seed: u64,
    ) -> Self {
        let n = x.len();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            min_samples_leaf: params.min_samples_leaf.max(1),
            max_features: params.max_features,
            splitter: params.splitter,
        };
        let class_weights = match y {
            TargetData::Classes { labels, n_classes } => {
                params.class_weight.weights(labels, *n_classes)
            }
            TargetData::Continuous(_) => None,
        };
        let target = match y {
            TargetData::Continuous(values) => TreeTarget::Regression(values),
            TargetData::Classes { labels, n_classes } => TreeTarget::Classification {
                labels,
                n_classes: *n_classes,
                class_weights: class_weights.as_deref(),
            },
        };

        let trees = (0..params.n_trees.max(1))
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let indices: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(x, target, &indices, &tree_params, &mut rng)
            })
            .collect();

        Self {
            name: name.to_string(),
            trees,
            n_features: x.first().map_or(0, Vec::len),
            n_classes: y.n_classes(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Estimator for Forest {
    fn name(&self) -> &'static str {
        match self.name.as_str() {
            "extra_trees" => "extra_trees",
            _ => "random_forest",
        }
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: &[f64]) -> Output {
        let count = self.trees.len().max(1) as f64;
        match self.n_classes {
            None => Output::Value(
                self.trees.iter().map(|t| t.predict_value(row)).sum::<f64>() / count,
            ),
            Some(k) => {
                let mut proba = vec![0.0; k];
                for tree in &self.trees {
                    for (p, v) in proba.iter_mut().zip(tree.leaf_value(row)) {
                        *p += v;
                    }
                }
                proba.iter_mut().for_each(|p| *p /= count);
                Output::Proba(proba)
            }
        }
    }

    fn feature_importance(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, v) in total.iter_mut().zip(tree.feature_importance()) {
                *acc += v;
            }
        }
        normalize(total)
    }
}
