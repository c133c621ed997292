//! On-disk artifact store.
//!
//! One JSON file per (task, source), named `<prefix>_<task>_bundle.json`
//! where the prefix is `optimized` or `enhanced`. Writes go to a uniquely
//! named temporary file that is persisted over the target, so readers see
//! either the old bundle or the new one and concurrent writers never share a
//! temporary file.

use crate::bundle::ModelBundle;
use crate::error::{AgriLearningError, Result, ResultExt};
use crate::types::{ModelSource, PerformanceMetrics};
use agrisense_processing::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the optimized-metrics summary.
pub const METRICS_SUMMARY_FILE: &str = "model_performance_metrics.json";

/// Optimized metrics per task, refreshed on every optimized save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub updated_at: Option<DateTime<Utc>>,
    pub tasks: BTreeMap<Task, PerformanceMetrics>,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    // the temporary file deletes itself on drop unless persisted
    let written = (|| -> std::io::Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix(".agrisense-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    })();
    written.context(format!("Writing {}", path.display()))
}

impl ModelStore {
    /// A store rooted at `dir`. Nothing is touched until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(task: Task, source: ModelSource) -> String {
        format!("{}_{}_bundle.json", source.file_prefix(), task.as_str())
    }

    pub fn bundle_path(&self, task: Task, source: ModelSource) -> PathBuf {
        self.dir.join(Self::file_name(task, source))
    }

    /// Write `bundle` atomically, returning its path.
    ///
    /// Saving an optimized bundle also refreshes [`METRICS_SUMMARY_FILE`].
    pub fn save(&self, bundle: &ModelBundle) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .context(format!("Creating models directory {}", self.dir.display()))?;

        let path = self.bundle_path(bundle.task(), bundle.model_source());
        write_atomic(&path, &serde_json::to_vec(bundle)?)?;
        info!(
            "Saved {} {} bundle to {}",
            bundle.model_source(),
            bundle.task(),
            path.display()
        );

        if bundle.model_source() == ModelSource::Optimized {
            let mut summary = self.metrics_summary().unwrap_or_else(|e| {
                warn!("Rebuilding metrics summary: {}", e);
                MetricsSummary::default()
            });
            summary.tasks.insert(bundle.task(), bundle.metrics().clone());
            summary.updated_at = Some(Utc::now());
            write_atomic(
                &self.dir.join(METRICS_SUMMARY_FILE),
                &serde_json::to_vec_pretty(&summary)?,
            )?;
        }
        Ok(path)
    }

    /// Load and verify a bundle.
    ///
    /// `Ok(None)` when no file exists; [`ArtifactCorrupt`] when the file
    /// cannot be parsed, names another task or source, has an unknown format
    /// version, or fails its content hash.
    ///
    /// [`ArtifactCorrupt`]: AgriLearningError::ArtifactCorrupt
    pub fn load(&self, task: Task, source: ModelSource) -> Result<Option<ModelBundle>> {
        let path = self.bundle_path(task, source);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No {} {} bundle at {}", source, task, path.display());
                return Ok(None);
            }
            Err(e) => return Err(AgriLearningError::from(e).with_context(path.display().to_string())),
        };

        let corrupt = |reason: String| AgriLearningError::ArtifactCorrupt {
            path: path.display().to_string(),
            reason,
        };
        let bundle: ModelBundle =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        if bundle.task() != task || bundle.model_source() != source {
            return Err(corrupt(format!(
                "holds a {} {} bundle",
                bundle.model_source(),
                bundle.task()
            )));
        }
        bundle.verify().map_err(corrupt)?;
        Ok(Some(bundle))
    }

    /// The optimized bundle if present, else the fallback one.
    pub fn load_best(&self, task: Task) -> Result<Option<ModelBundle>> {
        for source in ModelSource::PRIORITY {
            if let Some(bundle) = self.load(task, source)? {
                return Ok(Some(bundle));
            }
        }
        Ok(None)
    }

    /// Delete a bundle file. Returns whether one existed.
    pub fn remove(&self, task: Task, source: ModelSource) -> Result<bool> {
        match fs::remove_file(self.bundle_path(task, source)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// (task, source) pairs with a bundle file present, in priority order.
    pub fn list(&self) -> Vec<(Task, ModelSource)> {
        Task::ALL
            .iter()
            .flat_map(|&task| ModelSource::PRIORITY.map(|source| (task, source)))
            .filter(|&(task, source)| self.bundle_path(task, source).is_file())
            .collect()
    }

    /// The summary file's contents; empty when it does not exist yet.
    pub fn metrics_summary(&self) -> Result<MetricsSummary> {
        let path = self.dir.join(METRICS_SUMMARY_FILE);
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MetricsSummary::default()),
            Err(e) => Err(e.into()),
        }
    }
}
