//! In-memory snapshots of the loaded bundles.
//!
//! The registry is an explicit object handed to request handlers by
//! reference. Readers get `Arc` snapshots; replacing a bundle swaps the whole
//! `Arc`, so a request in flight keeps the bundle it resolved.

use crate::bundle::ModelBundle;
use crate::error::{AgriLearningError, Result};
use crate::store::ModelStore;
use crate::types::ModelSource;
use agrisense_processing::Task;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

type BundleMap = HashMap<(Task, ModelSource), Arc<ModelBundle>>;

/// Number of loaded bundles per source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    pub optimized: usize,
    pub fallback: usize,
}

impl RegistryCounts {
    pub fn total(&self) -> usize {
        self.optimized + self.fallback
    }
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    bundles: RwLock<BundleMap>,
}

fn read_store(store: &ModelStore) -> BundleMap {
    let mut bundles = BundleMap::new();
    for task in Task::ALL {
        for source in ModelSource::PRIORITY {
            match store.load(task, source) {
                Ok(Some(bundle)) => {
                    bundles.insert((task, source), Arc::new(bundle));
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping {} {} bundle: {}", source, task, e),
            }
        }
    }
    bundles
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every readable bundle in `store`.
    ///
    /// Corrupt bundles are logged and skipped.
    pub fn load_from(store: &ModelStore) -> Self {
        let registry = Self::new();
        registry.refresh(store);
        registry
    }

    /// Replace the registry's contents with the store's current bundles.
    ///
    /// Returns the number of bundles loaded.
    pub fn refresh(&self, store: &ModelStore) -> usize {
        let bundles = read_store(store);
        let loaded = bundles.len();
        *self.bundles.write() = bundles;
        info!("Loaded {} bundles from {}", loaded, store.dir().display());
        loaded
    }

    /// Publish `bundle`, returning the one it replaced.
    pub fn insert(&self, bundle: ModelBundle) -> Option<Arc<ModelBundle>> {
        let key = (bundle.task(), bundle.model_source());
        self.bundles.write().insert(key, Arc::new(bundle))
    }

    pub fn remove(&self, task: Task, source: ModelSource) -> Option<Arc<ModelBundle>> {
        self.bundles.write().remove(&(task, source))
    }

    pub fn get(&self, task: Task, source: ModelSource) -> Option<Arc<ModelBundle>> {
        self.bundles.read().get(&(task, source)).cloned()
    }

    /// The highest-priority bundle for `task`.
    ///
    /// # Errors
    ///
    /// [`AgriLearningError::ArtifactMissing`] when no source has one.
    pub fn resolve(&self, task: Task) -> Result<Arc<ModelBundle>> {
        let bundles = self.bundles.read();
        ModelSource::PRIORITY
            .iter()
            .find_map(|&source| bundles.get(&(task, source)).cloned())
            .ok_or(AgriLearningError::ArtifactMissing {
                task,
                model_source: None,
            })
    }

    pub fn counts(&self) -> RegistryCounts {
        let bundles = self.bundles.read();
        let mut counts = RegistryCounts::default();
        for (_, source) in bundles.keys() {
            match source {
                ModelSource::Optimized => counts.optimized += 1,
                ModelSource::Fallback => counts.fallback += 1,
            }
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.read().is_empty()
    }
}

static_assertions::assert_impl_all!(ModelRegistry: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::fixtures::yield_bundle;

    #[test]
    fn test_resolve_prefers_optimized() {
        let registry = ModelRegistry::new();
        registry.insert(yield_bundle(ModelSource::Fallback));
        assert_eq!(
            registry
                .resolve(Task::YieldPrediction)
                .unwrap()
                .model_source(),
            ModelSource::Fallback
        );

        registry.insert(yield_bundle(ModelSource::Optimized));
        assert_eq!(
            registry
                .resolve(Task::YieldPrediction)
                .unwrap()
                .model_source(),
            ModelSource::Optimized
        );
        assert_eq!(
            registry.counts(),
            RegistryCounts {
                optimized: 1,
                fallback: 1
            }
        );
    }

    #[test]
    fn test_resolve_missing() {
        let err = ModelRegistry::new().resolve(Task::CropHealth).unwrap_err();
        assert!(matches!(
            err,
            AgriLearningError::ArtifactMissing {
                task: Task::CropHealth,
                model_source: None
            }
        ));
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let registry = ModelRegistry::new();
        registry.insert(yield_bundle(ModelSource::Optimized));
        let snapshot = registry.resolve(Task::YieldPrediction).unwrap();

        let replaced = registry.insert(yield_bundle(ModelSource::Optimized));
        assert!(replaced.is_some());
        assert!(snapshot.verify().is_ok());
        assert!(!Arc::ptr_eq(
            &snapshot,
            &registry.resolve(Task::YieldPrediction).unwrap()
        ));
    }

    #[test]
    fn test_load_from_store_skips_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&yield_bundle(ModelSource::Optimized)).unwrap();
        std::fs::write(
            store.bundle_path(Task::CropHealth, ModelSource::Optimized),
            b"{}",
        )
        .unwrap();

        let registry = ModelRegistry::load_from(&store);
        assert_eq!(registry.counts().total(), 1);
        assert!(registry.get(Task::CropHealth, ModelSource::Optimized).is_none());

        store.remove(Task::YieldPrediction, ModelSource::Optimized).unwrap();
        assert_eq!(registry.refresh(&store), 0);
        assert!(registry.is_empty());
    }
}
