//! The estimator plugins available to the trainer.
//!
//! A [`CapabilitySet`] is resolved once by the caller and injected into the
//! [`Trainer`](crate::Trainer). Optimized ensembles are built from its
//! members in registration order.
//!
//! # Example
//!
//! ```rust,ignore
//! use agrisense_learning::capability::{CapabilitySet, EstimatorPlugin};
//!
//! let capabilities = CapabilitySet::standard().remove("extra_trees");
//! assert_eq!(capabilities.names(), vec!["random_forest", "gradient_boosting"]);
//! ```

use crate::config::{EnsembleParams, ForestMemberParams};
use crate::error::{AgriLearningError, Result};
use crate::estimators::{EstimatorSpec, ForestParams};
use agrisense_processing::ProblemType;
use std::sync::Arc;

/// A named source of estimator specs.
pub trait EstimatorPlugin: Send + Sync {
    /// Member name used in ensembles and model comparisons.
    fn name(&self) -> &str;

    /// The recipe to fit for `problem` under `params`.
    fn spec(&self, problem: ProblemType, params: &EnsembleParams) -> EstimatorSpec;
}

/// Finish a forest recipe from its member block. Classification forests try
/// `sqrt(n_features)` per split and carry the configured class weighting.
pub(crate) fn forest_params(
    base: ForestParams,
    member: &ForestMemberParams,
    problem: ProblemType,
    params: &EnsembleParams,
) -> ForestParams {
    let base = base.with_min_samples_split(member.min_samples_split);
    match problem {
        ProblemType::Classification => base
            .with_sqrt_features()
            .with_class_weight(params.class_weight),
        ProblemType::Regression => base.with_max_features(member.max_features),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomForestPlugin;

impl EstimatorPlugin for RandomForestPlugin {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn spec(&self, problem: ProblemType, params: &EnsembleParams) -> EstimatorSpec {
        let member = &params.random_forest;
        EstimatorSpec::RandomForest(forest_params(
            ForestParams::random_forest(member.n_trees, member.max_depth, member.min_samples_leaf),
            member,
            problem,
            params,
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraTreesPlugin;

impl EstimatorPlugin for ExtraTreesPlugin {
    fn name(&self) -> &str {
        "extra_trees"
    }

    fn spec(&self, problem: ProblemType, params: &EnsembleParams) -> EstimatorSpec {
        let member = &params.extra_trees;
        EstimatorSpec::ExtraTrees(forest_params(
            ForestParams::extra_trees(member.n_trees, member.max_depth, member.min_samples_leaf),
            member,
            problem,
            params,
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GradientBoostingPlugin;

impl EstimatorPlugin for GradientBoostingPlugin {
    fn name(&self) -> &str {
        "gradient_boosting"
    }

    fn spec(&self, _problem: ProblemType, params: &EnsembleParams) -> EstimatorSpec {
        let member = &params.gradient_boosting;
        EstimatorSpec::GradientBoosting {
            rounds: member.rounds,
            learning_rate: member.learning_rate,
            max_depth: member.max_depth,
            subsample: member.subsample,
            min_samples_leaf: member.min_samples_leaf,
        }
    }
}

/// An ordered list of estimator plugins.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    plugins: Vec<Arc<dyn EstimatorPlugin>>,
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("plugins", &self.names())
            .finish()
    }
}

impl CapabilitySet {
    /// An empty set. Training with it fails with
    /// [`EmptyCapabilitySet`](AgriLearningError::EmptyCapabilitySet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Random forest, extra trees and gradient boosting.
    pub fn standard() -> Self {
        Self::new()
            .with(RandomForestPlugin)
            .with(ExtraTreesPlugin)
            .with(GradientBoostingPlugin)
    }

    /// Add a plugin, replacing any existing one with the same name.
    #[must_use]
    pub fn with<P: EstimatorPlugin + 'static>(mut self, plugin: P) -> Self {
        self.register(Arc::new(plugin));
        self
    }

    pub fn register(&mut self, plugin: Arc<dyn EstimatorPlugin>) {
        match self.plugins.iter().position(|p| p.name() == plugin.name()) {
            Some(i) => self.plugins[i] = plugin,
            None => self.plugins.push(plugin),
        }
    }

    #[must_use]
    pub fn remove(mut self, name: &str) -> Self {
        self.plugins.retain(|p| p.name() != name);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Named member specs for an ensemble over `problem`.
    pub fn member_specs(
        &self,
        problem: ProblemType,
        params: &EnsembleParams,
    ) -> Result<Vec<(String, EstimatorSpec)>> {
        if self.plugins.is_empty() {
            return Err(AgriLearningError::EmptyCapabilitySet);
        }
        Ok(self
            .plugins
            .iter()
            .map(|p| (p.name().to_string(), p.spec(problem, params)))
            .collect())
    }
}

static_assertions::assert_impl_all!(CapabilitySet: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{ClassWeight, MaxFeatures};

    struct RidgePlugin;

    impl EstimatorPlugin for RidgePlugin {
        fn name(&self) -> &str {
            "ridge"
        }

        fn spec(&self, _problem: ProblemType, params: &EnsembleParams) -> EstimatorSpec {
            EstimatorSpec::Ridge {
                alpha: params.ridge_alpha,
            }
        }
    }

    #[test]
    fn test_standard_set() {
        let set = CapabilitySet::standard();
        assert_eq!(
            set.names(),
            vec!["random_forest", "extra_trees", "gradient_boosting"]
        );
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_register_and_remove() {
        let set = CapabilitySet::standard()
            .with(RidgePlugin)
            .remove("extra_trees");
        assert_eq!(set.names(), vec!["random_forest", "gradient_boosting", "ridge"]);

        let set = set.with(RandomForestPlugin);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_empty_set_is_a_configuration_error() {
        let err = CapabilitySet::new()
            .member_specs(ProblemType::Regression, &EnsembleParams::default())
            .unwrap_err();
        assert!(matches!(err, AgriLearningError::EmptyCapabilitySet));
    }

    #[test]
    fn test_classification_forests_use_sqrt_features() {
        let specs = CapabilitySet::standard()
            .member_specs(ProblemType::Classification, &EnsembleParams::default())
            .unwrap();
        let EstimatorSpec::RandomForest(params) = &specs[0].1 else {
            panic!("expected a random forest spec");
        };
        assert_eq!(params.max_features, MaxFeatures::Sqrt);
        assert_eq!(params.n_trees, 200);
        assert_eq!(params.class_weight, ClassWeight::Balanced);
    }

    #[test]
    fn test_members_use_their_own_blocks() {
        let specs = CapabilitySet::standard()
            .member_specs(ProblemType::Regression, &EnsembleParams::default())
            .unwrap();

        let EstimatorSpec::RandomForest(rf) = &specs[0].1 else {
            panic!("expected a random forest spec");
        };
        assert_eq!(rf.max_depth, Some(15));
        assert_eq!(rf.min_samples_split, 5);
        assert_eq!(rf.min_samples_leaf, 2);
        assert_eq!(rf.max_features, MaxFeatures::Sqrt);
        // class weighting only applies to classification
        assert_eq!(rf.class_weight, ClassWeight::None);

        let EstimatorSpec::ExtraTrees(et) = &specs[1].1 else {
            panic!("expected an extra trees spec");
        };
        assert_eq!(et.max_depth, Some(20));
        assert_eq!(et.min_samples_split, 3);
        assert_eq!(et.min_samples_leaf, 1);
        assert_eq!(et.max_features, MaxFeatures::All);

        let EstimatorSpec::GradientBoosting { max_depth, .. } = &specs[2].1 else {
            panic!("expected a gradient boosting spec");
        };
        assert_eq!(*max_depth, 8);
    }

    #[test]
    fn test_debug_lists_names() {
        let debug = format!("{:?}", CapabilitySet::standard());
        assert!(debug.contains("gradient_boosting"));
    }
}
