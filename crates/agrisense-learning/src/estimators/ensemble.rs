//! Stacking and soft-voting ensembles over named members.

use super::{Estimator, EstimatorSpec, Model, Output, TargetData, normalize, select_rows};
use crate::error::{AgriLearningError, Result};
use crate::split;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn member_seed(seed: u64, member: usize, fold: usize) -> u64 {
    seed.wrapping_add((member as u64) * 1_000)
        .wrapping_add(fold as u64)
}

fn mean_importance(members: &[(String, Model)], n_features: usize) -> Vec<f64> {
    let mut total = vec![0.0; n_features];
    for (_, model) in members {
        for (acc, v) in total.iter_mut().zip(model.feature_importance()) {
            *acc += v;
        }
    }
    normalize(total)
}

/// Members fitted on the full data, combined by a meta-learner trained on
/// their out-of-fold outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stacking {
    members: Vec<(String, Model)>,
    meta: Box<Model>,
    n_features: usize,
}

impl Stacking {
    pub(crate) fn fit(
        members: &[(String, EstimatorSpec)],
        meta: &EstimatorSpec,
        folds: usize,
        x: &[Vec<f64>],
        y: &TargetData,
        seed: u64,
    ) -> Result<Self> {
        if members.is_empty() {
            return Err(AgriLearningError::TrainingFailed(
                "stacking needs at least one member".to_string(),
            ));
        }
        let n = x.len();
        let folds = folds.min(n);
        if folds < 2 {
            return Err(AgriLearningError::TrainingFailed(format!(
                "stacking needs at least 2 rows for out-of-fold features, got {n}"
            )));
        }

        let splits = split::folds_for(y, folds, seed);
        let mut meta_rows: Vec<Vec<f64>> = vec![Vec::new(); n];
        let mut fitted = Vec::with_capacity(members.len());

        for (m, (name, spec)) in members.iter().enumerate() {
            let mut block: Vec<Vec<f64>> = vec![Vec::new(); n];
            for (f, (train, test)) in splits.iter().enumerate() {
                let model = spec.fit(
                    &select_rows(x, train),
                    &y.select(train),
                    member_seed(seed, m, f + 1),
                )?;
                for &i in test {
                    block[i] = model.predict_row(&x[i]).meta_features();
                }
            }
            for (row, features) in meta_rows.iter_mut().zip(block) {
                row.extend(features);
            }

            debug!(member = %name, folds, "Out-of-fold features built");
            fitted.push((name.clone(), spec.fit(x, y, member_seed(seed, m, 0))?));
        }

        let meta = meta.fit(&meta_rows, y, seed)?;

        Ok(Self {
            members: fitted,
            meta: Box::new(meta),
            n_features: x.first().map_or(0, Vec::len),
        })
    }

    /// Fitted members with their names.
    pub fn members(&self) -> &[(String, Model)] {
        &self.members
    }

    pub fn meta(&self) -> &Model {
        &self.meta
    }
}

impl Estimator for Stacking {
    fn name(&self) -> &'static str {
        "stacking"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: &[f64]) -> Output {
        let meta_row: Vec<f64> = self
            .members
            .iter()
            .flat_map(|(_, model)| model.predict_row(row).meta_features())
            .collect();
        self.meta.predict_row(&meta_row)
    }

    fn feature_importance(&self) -> Vec<f64> {
        mean_importance(&self.members, self.n_features)
    }
}

/// Members averaged with equal weight: mean value for regression, mean
/// probabilities for classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voting {
    members: Vec<(String, Model)>,
    n_features: usize,
    n_classes: Option<usize>,
}

impl Voting {
    pub(crate) fn fit(
        members: &[(String, EstimatorSpec)],
        x: &[Vec<f64>],
        y: &TargetData,
        seed: u64,
    ) -> Result<Self> {
        if members.is_empty() {
            return Err(AgriLearningError::TrainingFailed(
                "voting needs at least one member".to_string(),
            ));
        }

        let fitted = members
            .iter()
            .enumerate()
            .map(|(m, (name, spec))| Ok((name.clone(), spec.fit(x, y, member_seed(seed, m, 0))?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            members: fitted,
            n_features: x.first().map_or(0, Vec::len),
            n_classes: y.n_classes(),
        })
    }

    pub fn members(&self) -> &[(String, Model)] {
        &self.members
    }
}

impl Estimator for Voting {
    fn name(&self) -> &'static str {
        "voting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: &[f64]) -> Output {
        let count = self.members.len().max(1) as f64;
        match self.n_classes {
            None => Output::Value(
                self.members
                    .iter()
                    .map(|(_, m)| m.predict_row(row).value())
                    .sum::<f64>()
                    / count,
            ),
            Some(k) => {
                let mut proba = vec![0.0; k];
                for (_, model) in &self.members {
                    if let Output::Proba(p) = model.predict_row(row) {
                        for (acc, v) in proba.iter_mut().zip(p) {
                            *acc += v;
                        }
                    }
                }
                proba.iter_mut().for_each(|p| *p /= count);
                Output::Proba(proba)
            }
        }
    }

    fn feature_importance(&self) -> Vec<f64> {
        mean_importance(&self.members, self.n_features)
    }
}
