//! Training orchestration.
//!
//! This module provides the [`Trainer`] struct and its builder. The trainer
//! turns a prepared table into a sealed [`ModelBundle`] for one task and one
//! [`ModelSource`], and runs whole profiles across every task.
//!
//! # Overview
//!
//! Each task goes through these stages in order:
//!
//! 1. **Preparing** - Drop null targets, impute, filter outliers, engineer features
//! 2. **Selecting** - Keep the k best features (optimized profile only)
//! 3. **Splitting** - Seeded, stratified where the target allows it
//! 4. **Scaling** - Robust or standard scaler fitted on the training split
//! 5. **Training** - Fit the ensemble built from the capability set
//! 6. **Evaluating** - Train/test scores, k-fold CV, member comparison
//! 7. **Persisting** - Seal the bundle and, in [`train_all`](Trainer::train_all), save it
//!
//! # Example
//!
//! ```rust,ignore
//! use agrisense_learning::{ModelStore, Trainer, TrainerConfig, TrainingProfile, TrainingTables};
//!
//! let trainer = Trainer::builder()
//!     .config(TrainerConfig::default())
//!     .on_progress(|update| {
//!         println!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! let tables = TrainingTables::from_csv("data/agriculture.csv", "data/fertilizer.csv");
//! let report = trainer.train_all(&tables, TrainingProfile::Both, Some(&ModelStore::new("models")))?;
//! println!("{} of {} models trained", report.succeeded().count(), report.results.len());
//! ```

use crate::bundle::{BundlePayload, ModelBundle};
use crate::cancellation::CancellationToken;
use crate::capability::{self, CapabilitySet};
use crate::config::TrainerConfig;
use crate::error::{AgriLearningError, ErrorKind, Result};
use crate::estimators::{Estimator, EstimatorSpec, ForestParams, TargetData, select_rows};
use crate::evaluation::{self, DetailedMetrics};
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::scaling::{Scaler, ScalerKind};
use crate::selection::FeatureSelector;
use crate::split;
use crate::store::ModelStore;
use crate::types::{ModelComparison, ModelSource, PerformanceMetrics, TrainingReport, TrainingResult};
use agrisense_processing::{DatasetPreparer, ProblemType, Task, TargetValues, load_csv};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which model sources a run trains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingProfile {
    #[default]
    Optimized,
    Fallback,
    Both,
}

impl TrainingProfile {
    pub fn sources(&self) -> &'static [ModelSource] {
        match self {
            TrainingProfile::Optimized => &[ModelSource::Optimized],
            TrainingProfile::Fallback => &[ModelSource::Fallback],
            TrainingProfile::Both => &ModelSource::PRIORITY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingProfile::Optimized => "optimized",
            TrainingProfile::Fallback => "fallback",
            TrainingProfile::Both => "both",
        }
    }
}

impl fmt::Display for TrainingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainingProfile {
    type Err = AgriLearningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimized" => Ok(TrainingProfile::Optimized),
            "fallback" | "enhanced" => Ok(TrainingProfile::Fallback),
            "both" | "all" => Ok(TrainingProfile::Both),
            other => Err(AgriLearningError::InvalidConfig(format!(
                "unknown training profile '{other}' (expected optimized, fallback or both)"
            ))),
        }
    }
}

/// The source tables of a training run.
///
/// Crop health and yield train on the agriculture table, fertilizer on the
/// fertilizer table.
#[derive(Debug, Clone, Default)]
pub struct TrainingTables {
    pub agriculture: DataFrame,
    pub fertilizer: DataFrame,
}

impl TrainingTables {
    pub fn new(agriculture: DataFrame, fertilizer: DataFrame) -> Self {
        Self {
            agriculture,
            fertilizer,
        }
    }

    /// Load both tables from CSV files.
    ///
    /// A table that cannot be read is logged and left empty, so its tasks
    /// fail on their own while the other tasks still train.
    pub fn from_csv(agriculture: impl AsRef<Path>, fertilizer: impl AsRef<Path>) -> Self {
        let read = |path: &Path| {
            load_csv(path).unwrap_or_else(|e| {
                warn!("Could not load {}: {}", path.display(), e);
                DataFrame::empty()
            })
        };
        Self::new(read(agriculture.as_ref()), read(fertilizer.as_ref()))
    }

    pub fn for_task(&self, task: Task) -> &DataFrame {
        match task {
            Task::CropHealth | Task::YieldPrediction => &self.agriculture,
            Task::Fertilizer => &self.fertilizer,
        }
    }
}

/// A successfully trained task: its report entry and its sealed bundle.
#[derive(Debug, Clone)]
pub struct TrainedTask {
    pub result: TrainingResult,
    pub bundle: ModelBundle,
}

/// Position of a task within a run: `(index, total)`.
type Slot = (u32, u32);

/// The model trainer.
///
/// Use [`Trainer::builder()`] to construct a trainer with the builder pattern.
///
/// # Thread Safety
///
/// `Trainer` is `Send + Sync`; training itself runs on the calling thread.
pub struct Trainer {
    config: TrainerConfig,
    capabilities: CapabilitySet,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: Option<CancellationToken>,
}

impl fmt::Debug for Trainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "cancellation_token",
                &self.cancellation_token.as_ref().map(|_| "<token>"),
            )
            .finish()
    }
}

static_assertions::assert_impl_all!(Trainer: Send, Sync);

fn estimator_label(spec: &EstimatorSpec, problem: ProblemType) -> String {
    let suffix = match problem {
        ProblemType::Regression => "regressor",
        ProblemType::Classification => "classifier",
    };
    format!("{}_{suffix}", spec.name())
}

impl Trainer {
    /// Create a new builder for `Trainer`.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Train one task with one profile.
    ///
    /// # Errors
    ///
    /// - [`Processing`](AgriLearningError::Processing): the table lacks the
    ///   target column or has no usable rows
    /// - [`TrainingFailed`](AgriLearningError::TrainingFailed): too few rows
    ///   to split, or a fit failed
    /// - [`Cancelled`](AgriLearningError::Cancelled): the token was cancelled
    pub fn train_task(&self, task: Task, source: ModelSource, df: &DataFrame) -> Result<TrainedTask> {
        self.run_task(task, source, df, (0, 1))
    }

    /// Train every task for each source of `profile`, saving bundles to
    /// `store` when given.
    ///
    /// A task that fails is recorded with `success = false` and the run moves
    /// on; only cancellation ends the run early.
    pub fn train_all(
        &self,
        tables: &TrainingTables,
        profile: TrainingProfile,
        store: Option<&ModelStore>,
    ) -> Result<TrainingReport> {
        let started = Instant::now();
        let jobs: Vec<(Task, ModelSource)> = profile
            .sources()
            .iter()
            .flat_map(|&source| Task::ALL.map(|task| (task, source)))
            .collect();
        let total = jobs.len() as u32;
        info!("Training {} models ({} profile)", total, profile);

        let mut results = Vec::with_capacity(jobs.len());
        for (index, (task, source)) in jobs.into_iter().enumerate() {
            let slot = (index as u32, total);
            let task_started = Instant::now();

            match self.run_task(task, source, tables.for_task(task), slot) {
                Ok(TrainedTask { mut result, bundle }) => {
                    if let Some(store) = store {
                        self.emit(task, TrainingStage::Persisting, slot, "Saving bundle", None);
                        if let Err(e) = store.save(&bundle) {
                            warn!("Could not save {} {} bundle: {}", source, task, e);
                            result.success = false;
                            result.warnings.push(format!("Bundle not saved: {e}"));
                        }
                    }
                    results.push(result);
                }
                Err(e) if e.kind() == ErrorKind::Cancelled => {
                    self.report_run(TrainingStage::Cancelled, "Training cancelled", (index as u32, total));
                    return Err(e);
                }
                Err(e) => {
                    warn!("{} {} training failed: {}", source, task, e);
                    self.emit(task, TrainingStage::Failed, slot, &e.to_string(), None);
                    results.push(TrainingResult::failed(
                        task,
                        source,
                        e.to_string(),
                        task_started.elapsed().as_secs_f64(),
                    ));
                }
            }
        }

        let report = TrainingReport {
            results,
            total_time_seconds: started.elapsed().as_secs_f64(),
        };
        let succeeded = report.succeeded().count();
        if report.any_success() {
            info!(
                "Training finished: {} of {} models in {:.1}s",
                succeeded,
                total,
                report.total_time_seconds
            );
            self.report_run(TrainingStage::Complete, "Training complete", (total, total));
        } else {
            warn!("Training finished without a usable model");
            self.report_run(TrainingStage::Failed, "No model trained", (total, total));
        }
        Ok(report)
    }

    fn run_task(
        &self,
        task: Task,
        source: ModelSource,
        df: &DataFrame,
        slot: Slot,
    ) -> Result<TrainedTask> {
        let started = Instant::now();
        let seed = self.config.random_seed;
        let problem = task.problem_type();
        let mut warnings = Vec::new();

        self.checkpoint(task, TrainingStage::Preparing, slot, &format!("Preparing {task} table"))?;
        let prepared = DatasetPreparer::new(self.config.preparation.clone()).prepare(task, df)?;
        let target = TargetData::from(&prepared.target);
        let n_rows = prepared.n_rows();
        for step in &prepared.processing_steps {
            debug!(%task, "{}", step);
        }

        self.checkpoint(task, TrainingStage::Selecting, slot, "Selecting features")?;
        let selector = match source {
            ModelSource::Optimized => {
                FeatureSelector::fit(&prepared.rows, &target, self.config.k_for(task))
            }
            ModelSource::Fallback => FeatureSelector::identity(prepared.n_features()),
        };
        let selected_features = selector.selected_names(&prepared.feature_names);
        debug!(%task, features = ?selected_features, "Selected features");
        let x = selector.transform(&prepared.rows);

        self.checkpoint(task, TrainingStage::Splitting, slot, "Splitting train/test")?;
        let strata = self.strata(task, &target);
        if strata.is_none() && problem == ProblemType::Classification {
            warnings.push("Some classes have a single row; split is not stratified".to_string());
        }
        let split = split::train_test_split(n_rows, self.config.test_size, seed, strata.as_deref())?;
        let y_train = target.select(&split.train);
        let y_test = target.select(&split.test);

        self.checkpoint(task, TrainingStage::Scaling, slot, "Scaling features")?;
        let scaler_kind = match source {
            ModelSource::Optimized => ScalerKind::for_task(task),
            ModelSource::Fallback => ScalerKind::Standard,
        };
        let raw_train = select_rows(&x, &split.train);
        let scaler = Scaler::fit(scaler_kind, &raw_train);
        let x_train = scaler.transform(&raw_train);
        let x_test = scaler.transform(&select_rows(&x, &split.test));

        let spec = self.model_spec(task, source)?;
        let estimator = estimator_label(&spec, problem);
        self.checkpoint(
            task,
            TrainingStage::Training,
            slot,
            &format!("Fitting {estimator} on {} rows", x_train.len()),
        )?;
        let fit_started = Instant::now();
        let model = spec.fit(&x_train, &y_train, seed)?;
        let fit_seconds = fit_started.elapsed().as_secs_f64();

        self.checkpoint(task, TrainingStage::Evaluating, slot, "Evaluating")?;
        let train_score = evaluation::score(&y_train, &model.predict(&x_train));
        let test_outputs = model.predict(&x_test);
        let test_score = evaluation::score(&y_test, &test_outputs);

        let folds = self.config.cv_folds as usize;
        let cv_scores = match evaluation::cross_val_scores(&spec, &x_train, &y_train, folds, seed) {
            Ok(scores) => scores,
            Err(e) => {
                warn!(%task, "Cross-validation skipped: {}", e);
                warnings.push(format!("Cross-validation skipped: {e}"));
                Vec::new()
            }
        };
        let (cv_mean, cv_std) = if cv_scores.is_empty() {
            (None, None)
        } else {
            let (mean, std) = evaluation::mean_std(&cv_scores);
            (Some(mean), Some(std))
        };

        let mut metrics = PerformanceMetrics {
            estimator: estimator.clone(),
            train_score,
            test_score,
            cv_mean,
            cv_std,
            selected_features: selected_features.clone(),
            ..Default::default()
        };
        match evaluation::detailed_metrics(&y_test, &test_outputs) {
            DetailedMetrics::Regression { mse, rmse, mae } => {
                metrics.mse = Some(mse);
                metrics.rmse = Some(rmse);
                metrics.mae = Some(mae);
            }
            DetailedMetrics::Classification {
                accuracy,
                precision,
                recall,
                f1,
            } => {
                metrics.accuracy = Some(accuracy);
                metrics.precision = Some(precision);
                metrics.recall = Some(recall);
                metrics.f1_score = Some(f1);
            }
        }
        info!(
            "{} {}: train {:.4}, test {:.4}, cv {}",
            source,
            task,
            train_score,
            test_score,
            cv_mean.map_or("n/a".to_string(), |m| format!("{m:.4}"))
        );

        let mut model_comparison = match source {
            ModelSource::Optimized => {
                self.compare_members(task, slot, &x_train, &y_train, &x_test, &y_test)?
            }
            ModelSource::Fallback => Vec::new(),
        };
        model_comparison.push(ModelComparison::new(
            estimator.clone(),
            train_score,
            test_score,
            fit_seconds,
            spec.hyperparameters(),
        ));

        let mut feature_importance: Vec<(String, f64)> = selected_features
            .iter()
            .cloned()
            .zip(model.feature_importance())
            .collect();
        feature_importance.sort_by(|a, b| b.1.total_cmp(&a.1));

        let label_encoder = match &prepared.target {
            TargetValues::Classes { encoder, .. } => Some(encoder.clone()),
            TargetValues::Continuous(_) => None,
        };
        let bundle = ModelBundle::new(
            task,
            source,
            n_rows,
            BundlePayload {
                feature_names: prepared.feature_names.clone(),
                selector,
                scaler,
                model,
                label_encoder,
                fertilizer_encoders: prepared.fertilizer_encoders.clone(),
                metrics: metrics.clone(),
            },
        )?;

        let result = TrainingResult {
            task,
            model_source: source,
            success: true,
            best_model_name: estimator,
            metrics: Some(metrics),
            feature_importance,
            model_comparison,
            training_rows: n_rows,
            training_time_seconds: started.elapsed().as_secs_f64(),
            warnings,
        };
        Ok(TrainedTask { result, bundle })
    }

    /// Stratification labels: class labels, or the rounded crop-health score.
    fn strata(&self, task: Task, target: &TargetData) -> Option<Vec<usize>> {
        match target {
            TargetData::Classes { labels, .. } => {
                split::every_stratum_has_two(labels).then(|| labels.clone())
            }
            TargetData::Continuous(values) if task == Task::CropHealth => {
                split::rounded_strata(values)
            }
            TargetData::Continuous(_) => None,
        }
    }

    fn model_spec(&self, task: Task, source: ModelSource) -> Result<EstimatorSpec> {
        let params = &self.config.ensemble;
        let problem = task.problem_type();

        if source == ModelSource::Fallback {
            let member = &params.fallback_forest;
            return Ok(EstimatorSpec::RandomForest(capability::forest_params(
                ForestParams::random_forest(member.n_trees, member.max_depth, member.min_samples_leaf),
                member,
                problem,
                params,
            )));
        }

        let members = self.capabilities.member_specs(problem, params)?;
        Ok(match task {
            Task::CropHealth => EstimatorSpec::Stacking {
                members,
                meta: Box::new(EstimatorSpec::Ridge {
                    alpha: params.ridge_alpha,
                }),
                folds: params.stacking_folds,
            },
            Task::YieldPrediction => EstimatorSpec::Voting { members },
            Task::Fertilizer => EstimatorSpec::Stacking {
                members,
                meta: Box::new(EstimatorSpec::LogisticRegression {
                    max_iter: params.logistic_max_iter,
                    l2: 1.0,
                }),
                folds: params.stacking_folds,
            },
        })
    }

    /// Fit each ensemble member on its own for the comparison table.
    fn compare_members(
        &self,
        task: Task,
        slot: Slot,
        x_train: &[Vec<f64>],
        y_train: &TargetData,
        x_test: &[Vec<f64>],
        y_test: &TargetData,
    ) -> Result<Vec<ModelComparison>> {
        let members = self
            .capabilities
            .member_specs(task.problem_type(), &self.config.ensemble)?;
        let mut comparison = Vec::with_capacity(members.len() + 1);

        for (name, spec) in members {
            self.check_cancelled()?;
            self.emit(
                task,
                TrainingStage::Evaluating,
                slot,
                &format!("Comparing {name}"),
                Some(&name),
            );
            let started = Instant::now();
            let model = match spec.fit(x_train, y_train, self.config.random_seed) {
                Ok(model) => model,
                Err(e) => {
                    warn!(%task, member = %name, "Member fit failed: {}", e);
                    continue;
                }
            };
            let seconds = started.elapsed().as_secs_f64();
            let train_score = evaluation::score(y_train, &model.predict(x_train));
            let test_score = evaluation::score(y_test, &model.predict(x_test));
            debug!(%task, member = %name, train_score, test_score, "Member scored");
            comparison.push(ModelComparison::new(
                name,
                train_score,
                test_score,
                seconds,
                spec.hyperparameters(),
            ));
        }
        Ok(comparison)
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation_token {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    /// Report `stage` and stop if cancellation was requested.
    fn checkpoint(&self, task: Task, stage: TrainingStage, slot: Slot, message: &str) -> Result<()> {
        self.check_cancelled()?;
        self.emit(task, stage, slot, message, None);
        Ok(())
    }

    fn emit(
        &self,
        task: Task,
        stage: TrainingStage,
        (index, total): Slot,
        message: &str,
        current_model: Option<&str>,
    ) {
        let Some(callback) = &self.progress_callback else {
            return;
        };
        let total = total.max(1);
        callback(ProgressUpdate {
            task: Some(task),
            stage,
            progress: ((index as f64 + stage.task_fraction()) / total as f64).clamp(0.0, 1.0),
            message: message.to_string(),
            current_model: current_model.map(str::to_string),
            tasks_completed: Some((index, total)),
        });
    }

    fn report_run(&self, stage: TrainingStage, message: &str, (done, total): Slot) {
        if let Some(callback) = &self.progress_callback {
            let total = total.max(1);
            callback(ProgressUpdate {
                task: None,
                stage,
                progress: (done as f64 / total as f64).clamp(0.0, 1.0),
                message: message.to_string(),
                current_model: None,
                tasks_completed: Some((done, total)),
            });
        }
    }
}

/// Builder for [`Trainer`].
///
/// # Required Configuration
///
/// - [`config()`](Self::config): Trainer configuration (required)
///
/// # Optional Configuration
///
/// - [`capabilities()`](Self::capabilities): Estimator plugins (default: [`CapabilitySet::standard`])
/// - [`on_progress()`](Self::on_progress): Progress callback for monitoring
/// - [`cancellation_token()`](Self::cancellation_token): Token for cancellation
#[derive(Default)]
pub struct TrainerBuilder {
    config: Option<TrainerConfig>,
    capabilities: Option<CapabilitySet>,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: Option<CancellationToken>,
}

impl fmt::Debug for TrainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainerBuilder")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "cancellation_token",
                &self.cancellation_token.as_ref().map(|_| "<token>"),
            )
            .finish()
    }
}

impl TrainerBuilder {
    /// Set the trainer configuration (required).
    #[must_use]
    pub fn config(mut self, config: TrainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the estimator plugins optimized ensembles are built from.
    #[must_use]
    pub fn capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Set the progress callback (optional).
    ///
    /// The callback runs on the training thread and should return quickly.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(std::sync::Arc::new(callback));
        self
    }

    /// Set the cancellation token (optional).
    ///
    /// The trainer checks the token between stages and between ensemble
    /// members.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the trainer.
    ///
    /// # Errors
    ///
    /// - [`AgriLearningError::InvalidConfig`] if no configuration was provided
    ///   or it fails validation
    /// - [`AgriLearningError::EmptyCapabilitySet`] if the capability set has
    ///   no plugins
    pub fn build(self) -> Result<Trainer> {
        let config = self.config.ok_or_else(|| {
            AgriLearningError::InvalidConfig("Trainer config is required".to_string())
        })?;
        config.validate()?;

        let capabilities = self.capabilities.unwrap_or_else(CapabilitySet::standard);
        if capabilities.is_empty() {
            return Err(AgriLearningError::EmptyCapabilitySet);
        }

        Ok(Trainer {
            config,
            capabilities,
            progress_callback: self.progress_callback,
            cancellation_token: self.cancellation_token,
        })
    }
}
