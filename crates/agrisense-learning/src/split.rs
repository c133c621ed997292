//! Seeded train/test splits and k-fold partitions.
//!
//! All functions return row indices, sorted ascending within each part.

use crate::error::{AgriLearningError, Result};
use crate::estimators::TargetData;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Row indices of a train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// `(train, test)` index pairs, one per fold.
pub type Folds = Vec<(Vec<usize>, Vec<usize>)>;

fn group_by_label(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups
}

/// Split `n` rows, holding out `ceil(n * test_size)` of them.
///
/// With `stratify`, each label keeps its share of the test set and at least
/// one training row.
pub fn train_test_split(
    n: usize,
    test_size: f64,
    seed: u64,
    stratify: Option<&[usize]>,
) -> Result<TrainTestSplit> {
    if n < 2 {
        return Err(AgriLearningError::TrainingFailed(format!(
            "need at least 2 rows to split, got {n}"
        )));
    }
    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut train, mut test) = match stratify {
        None => {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            let train = order.split_off(n_test);
            (train, order)
        }
        Some(labels) => {
            let groups = group_by_label(labels);

            // Largest-remainder allocation of test rows per label
            let mut quotas: Vec<(usize, usize, f64)> = groups
                .iter()
                .map(|(&label, rows)| {
                    let exact = rows.len() as f64 * n_test as f64 / n as f64;
                    let floor = (exact.floor() as usize).min(rows.len().saturating_sub(1));
                    (label, floor, exact - floor as f64)
                })
                .collect();
            let mut assigned: usize = quotas.iter().map(|q| q.1).sum();
            let mut by_remainder: Vec<usize> = (0..quotas.len()).collect();
            by_remainder.sort_by(|&a, &b| quotas[b].2.total_cmp(&quotas[a].2).then(a.cmp(&b)));
            for idx in by_remainder.into_iter().cycle().take(quotas.len() * 2) {
                if assigned >= n_test {
                    break;
                }
                let capacity = groups[&quotas[idx].0].len().saturating_sub(1);
                if quotas[idx].1 < capacity {
                    quotas[idx].1 += 1;
                    assigned += 1;
                }
            }

            let mut train = Vec::with_capacity(n - n_test);
            let mut test = Vec::with_capacity(n_test);
            for (label, quota, _) in quotas {
                let mut rows = groups[&label].clone();
                rows.shuffle(&mut rng);
                let rest = rows.split_off(quota);
                test.extend(rows);
                train.extend(rest);
            }
            (train, test)
        }
    };

    train.sort_unstable();
    test.sort_unstable();
    Ok(TrainTestSplit { train, test })
}

/// Shuffled k-fold partition; the first `n % k` folds get one extra row.
pub fn kfold(n: usize, k: usize, seed: u64) -> Folds {
    let k = k.clamp(1, n.max(1));
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut fold_of = vec![0; n];
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        for &i in &order[start..start + size] {
            fold_of[i] = fold;
        }
        start += size;
    }
    folds_from_assignment(&fold_of, k)
}

/// K-fold partition that deals each label's rows round-robin across folds.
pub fn stratified_kfold(labels: &[usize], k: usize, seed: u64) -> Folds {
    let n = labels.len();
    let k = k.clamp(1, n.max(1));
    let mut rng = StdRng::seed_from_u64(seed);

    let mut fold_of = vec![0; n];
    let mut next_fold = 0;
    for (_, mut rows) in group_by_label(labels) {
        rows.shuffle(&mut rng);
        for i in rows {
            fold_of[i] = next_fold;
            next_fold = (next_fold + 1) % k;
        }
    }
    folds_from_assignment(&fold_of, k)
}

fn folds_from_assignment(fold_of: &[usize], k: usize) -> Folds {
    (0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..fold_of.len()).partition(|&i| fold_of[i] == fold);
            (train, test)
        })
        .filter(|(train, test)| !train.is_empty() && !test.is_empty())
        .collect()
}

/// Stratified folds for class targets, plain folds otherwise.
pub fn folds_for(y: &TargetData, k: usize, seed: u64) -> Folds {
    match y {
        TargetData::Continuous(values) => kfold(values.len(), k, seed),
        TargetData::Classes { labels, .. } => stratified_kfold(labels, k, seed),
    }
}

/// Strata from rounding a continuous target, when every stratum has at
/// least two rows.
pub fn rounded_strata(values: &[f64]) -> Option<Vec<usize>> {
    let keys: Vec<i64> = values.iter().map(|v| v.round() as i64).collect();
    let mut ids: BTreeMap<i64, usize> = BTreeMap::new();
    let strata: Vec<usize> = keys
        .iter()
        .map(|key| {
            let next = ids.len();
            *ids.entry(*key).or_insert(next)
        })
        .collect();
    every_stratum_has_two(&strata).then_some(strata)
}

/// Whether every label occurs at least twice.
pub fn every_stratum_has_two(labels: &[usize]) -> bool {
    !labels.is_empty() && group_by_label(labels).values().all(|rows| rows.len() >= 2)
}
