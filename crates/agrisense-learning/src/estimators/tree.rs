//! CART decision trees stored as a flat node arena.
//!
//! Regression trees split on squared error and predict leaf means;
//! classification trees split on Gini impurity and predict leaf class
//! proportions, both optionally under per-class weights. Trees are the
//! building block of forests and boosting.

use super::{Output, normalize};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// How split thresholds are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Splitter {
    /// Exhaustive search over midpoints between sorted values.
    Best,
    /// One uniform random threshold per candidate feature.
    Random,
}

/// How many features are considered at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().round() as usize).clamp(1, n_features),
        }
    }
}

/// Training parameters for a single tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    /// Nodes with fewer rows become leaves.
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub splitter: Splitter,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            splitter: Splitter::Best,
        }
    }
}

/// Targets a tree is grown on.
#[derive(Debug, Clone, Copy)]
pub enum TreeTarget<'a> {
    Regression(&'a [f64]),
    Classification {
        labels: &'a [usize],
        n_classes: usize,
        /// Per-class sample weight; `None` weighs every row 1.
        class_weights: Option<&'a [f64]>,
    },
}

/// One node of the arena. Leaves carry `value`; splits carry children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    /// Leaf mean (length 1) or class proportions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<f64>>,
}

impl Node {
    fn leaf(value: Vec<f64>) -> Self {
        Self {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }
}

/// A fitted decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    /// Total impurity decrease per feature, unnormalized.
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` listed in `indices`.
    ///
    /// `indices` may repeat rows (bootstrap samples).
    pub fn fit(
        x: &[Vec<f64>],
        target: TreeTarget<'_>,
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = TreeBuilder {
            x,
            target,
            params,
            rng,
            n_features,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.build_node(indices, 0);

        Self {
            nodes: builder.nodes,
            n_features,
            importances: builder.importances,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Arena index of the leaf `row` falls into.
    pub fn leaf_index(&self, row: &[f64]) -> usize {
        let mut idx = 0;
        while let Some(node) = self.nodes.get(idx) {
            if node.value.is_some() {
                return idx;
            }
            idx = if row.get(node.feature).copied().unwrap_or(0.0) <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
        idx
    }

    /// The leaf value for `row`.
    pub fn leaf_value(&self, row: &[f64]) -> &[f64] {
        self.nodes
            .get(self.leaf_index(row))
            .and_then(|node| node.value.as_deref())
            .unwrap_or(&[])
    }

    /// Replace the value of a leaf. Used by boosting for Newton leaf steps.
    pub(crate) fn set_leaf_value(&mut self, leaf: usize, value: Vec<f64>) {
        if let Some(node) = self.nodes.get_mut(leaf)
            && node.value.is_some()
        {
            node.value = Some(value);
        }
    }

    /// Scalar prediction of a regression tree.
    pub fn predict_value(&self, row: &[f64]) -> f64 {
        self.leaf_value(row).first().copied().unwrap_or(0.0)
    }

    pub fn predict_row(&self, row: &[f64]) -> Output {
        let value = self.leaf_value(row);
        if value.len() == 1 {
            Output::Value(value[0])
        } else {
            Output::Proba(value.to_vec())
        }
    }

    /// Impurity-decrease importances normalized to sum to 1.
    pub fn feature_importance(&self) -> Vec<f64> {
        normalize(self.importances.clone())
    }
}

/// Sufficient statistics of a node for impurity computation.
///
/// `count` is always the number of rows; `weight` and `counts` are the
/// class-weighted totals used for impurity and leaf votes.
#[derive(Debug, Clone)]
enum Stats {
    Regression {
        count: f64,
        sum: f64,
        sum_sq: f64,
    },
    Classification {
        count: f64,
        weight: f64,
        counts: Vec<f64>,
    },
}

impl Stats {
    fn empty(target: &TreeTarget<'_>) -> Self {
        match target {
            TreeTarget::Regression(_) => Stats::Regression {
                count: 0.0,
                sum: 0.0,
                sum_sq: 0.0,
            },
            TreeTarget::Classification { n_classes, .. } => Stats::Classification {
                count: 0.0,
                weight: 0.0,
                counts: vec![0.0; *n_classes],
            },
        }
    }

    fn of(target: &TreeTarget<'_>, indices: &[usize]) -> Self {
        let mut stats = Self::empty(target);
        for &i in indices {
            stats.add(target, i);
        }
        stats
    }

    fn add(&mut self, target: &TreeTarget<'_>, i: usize) {
        self.update(target, i, 1.0);
    }

    fn remove(&mut self, target: &TreeTarget<'_>, i: usize) {
        self.update(target, i, -1.0);
    }

    fn update(&mut self, target: &TreeTarget<'_>, i: usize, sign: f64) {
        match (self, target) {
            (Stats::Regression { count, sum, sum_sq }, TreeTarget::Regression(y)) => {
                *count += sign;
                *sum += sign * y[i];
                *sum_sq += sign * y[i] * y[i];
            }
            (
                Stats::Classification {
                    count,
                    weight,
                    counts,
                },
                TreeTarget::Classification {
                    labels,
                    class_weights,
                    ..
                },
            ) => {
                let label = labels[i];
                let w = class_weights.map_or(1.0, |cw| cw.get(label).copied().unwrap_or(0.0));
                *count += sign;
                *weight += sign * w;
                if let Some(c) = counts.get_mut(label) {
                    *c += sign * w;
                }
            }
            _ => {}
        }
    }

    fn count(&self) -> f64 {
        match self {
            Stats::Regression { count, .. } | Stats::Classification { count, .. } => *count,
        }
    }

    /// Impurity times sample count: SSE for regression, `weight * gini` for
    /// classes.
    fn weighted_impurity(&self) -> f64 {
        match self {
            Stats::Regression { count, sum, sum_sq } => {
                if *count <= 0.0 {
                    0.0
                } else {
                    (sum_sq - sum * sum / count).max(0.0)
                }
            }
            Stats::Classification { weight, counts, .. } => {
                if *weight <= 0.0 {
                    0.0
                } else {
                    (weight - counts.iter().map(|c| c * c).sum::<f64>() / weight).max(0.0)
                }
            }
        }
    }

    fn leaf_value(&self) -> Vec<f64> {
        match self {
            Stats::Regression { count, sum, .. } => {
                vec![if *count > 0.0 { sum / count } else { 0.0 }]
            }
            Stats::Classification { weight, counts, .. } => {
                if *weight > 0.0 {
                    counts.iter().map(|c| c / weight).collect()
                } else {
                    vec![1.0 / counts.len().max(1) as f64; counts.len()]
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a, 'r> {
    x: &'a [Vec<f64>],
    target: TreeTarget<'a>,
    params: &'a TreeParams,
    rng: &'r mut StdRng,
    n_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_, '_> {
    fn build_node(&mut self, indices: &[usize], depth: usize) -> usize {
        let current = self.nodes.len();
        let stats = Stats::of(&self.target, indices);
        let impurity = stats.weighted_impurity();

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf
            || impurity <= 1e-12
        {
            self.nodes.push(Node::leaf(stats.leaf_value()));
            return current;
        }

        let Some(split) = self.find_best_split(indices, &stats) else {
            self.nodes.push(Node::leaf(stats.leaf_value()));
            return current;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        self.importances[split.feature] += split.gain;

        // Reserve the split node, then patch children once they exist
        self.nodes.push(Node {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
            value: None,
        });
        let left_idx = self.build_node(&left, depth + 1);
        let right_idx = self.build_node(&right, depth + 1);
        self.nodes[current].left = left_idx;
        self.nodes[current].right = right_idx;

        current
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        let k = self.params.max_features.resolve(self.n_features);
        if k < self.n_features {
            features.shuffle(&mut *self.rng);
            features.truncate(k);
            features.sort_unstable();
        }
        features
    }

    fn find_best_split(&mut self, indices: &[usize], parent: &Stats) -> Option<SplitCandidate> {
        let parent_impurity = parent.weighted_impurity();
        let mut best: Option<SplitCandidate> = None;

        for feature in self.candidate_features() {
            let candidate = match self.params.splitter {
                Splitter::Best => self.best_threshold(indices, feature, parent, parent_impurity),
                Splitter::Random => self.random_threshold(indices, feature, parent_impurity),
            };
            if let Some(c) = candidate
                && c.gain > 1e-12
                && best.is_none_or(|b| c.gain > b.gain)
            {
                best = Some(c);
            }
        }

        best
    }

    /// Sweep sorted values, moving one row at a time from right to left.
    fn best_threshold(
        &self,
        indices: &[usize],
        feature: usize,
        parent: &Stats,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

        let min_leaf = self.params.min_samples_leaf as f64;
        let mut left = Stats::empty(&self.target);
        let mut right = parent.clone();
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..order.len() - 1 {
            let i = order[pos];
            left.add(&self.target, i);
            right.remove(&self.target, i);

            let value = self.x[i][feature];
            let next = self.x[order[pos + 1]][feature];
            if next <= value || left.count() < min_leaf || right.count() < min_leaf {
                continue;
            }

            let gain = parent_impurity - left.weighted_impurity() - right.weighted_impurity();
            if best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: value + (next - value) / 2.0,
                    gain,
                });
            }
        }

        best
    }

    fn random_threshold(
        &mut self,
        indices: &[usize],
        feature: usize,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = self.x[i][feature];
            (lo.min(v), hi.max(v))
        });
        if !(min < max) {
            return None;
        }

        let threshold = self.rng.gen_range(min..max);
        let mut left = Stats::empty(&self.target);
        let mut right = Stats::empty(&self.target);
        for &i in indices {
            if self.x[i][feature] <= threshold {
                left.add(&self.target, i);
            } else {
                right.add(&self.target, i);
            }
        }

        let min_leaf = self.params.min_samples_leaf as f64;
        if left.count() < min_leaf || right.count() < min_leaf {
            return None;
        }

        Some(SplitCandidate {
            feature,
            threshold,
            gain: parent_impurity - left.weighted_impurity() - right.weighted_impurity(),
        })
    }
}
