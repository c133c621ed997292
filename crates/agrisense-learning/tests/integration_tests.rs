//! Integration tests for training, persistence and inference.
//!
//! These tests train every task on the fixture tables with small ensembles,
//! persist the bundles to a temporary store and serve predictions from them.

use agrisense_learning::gateway::presentation::HealthStatus;
use agrisense_learning::{
    AgriLearningError, EnsembleParams, Gateway, ModelRegistry, ModelSource, ModelStore,
    RawRecord, Task, Trainer, TrainerConfig, TrainingProfile, TrainingReport, TrainingTables,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::PathBuf;
use std::sync::OnceLock;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

/// The fixture tables live with the processing crate.
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../agrisense-processing/tests/fixtures")
}

fn fixture_tables() -> TrainingTables {
    TrainingTables::from_csv(
        fixtures_path().join("agriculture_sample.csv"),
        fixtures_path().join("fertilizer_sample.csv"),
    )
}

fn small_config() -> TrainerConfig {
    let mut ensemble = EnsembleParams {
        stacking_folds: 3,
        ..Default::default()
    };
    ensemble.random_forest.n_trees = 10;
    ensemble.extra_trees.n_trees = 10;
    ensemble.fallback_forest.n_trees = 10;
    ensemble.gradient_boosting.rounds = 20;
    ensemble.gradient_boosting.max_depth = 3;

    TrainerConfig::builder()
        .cv_folds(3)
        .ensemble(ensemble)
        .build()
        .expect("valid config")
}

struct Trained {
    dir: TempDir,
    report: TrainingReport,
}

impl Trained {
    fn store(&self) -> ModelStore {
        ModelStore::new(self.dir.path())
    }
}

/// Both profiles trained once and shared by the tests below.
fn trained() -> &'static Trained {
    static TRAINED: OnceLock<Trained> = OnceLock::new();
    TRAINED.get_or_init(|| {
        let dir = tempfile::tempdir().expect("tempdir");
        let trainer = Trainer::builder()
            .config(small_config())
            .build()
            .expect("trainer");
        let report = trainer
            .train_all(
                &fixture_tables(),
                TrainingProfile::Both,
                Some(&ModelStore::new(dir.path())),
            )
            .expect("training run");
        Trained { dir, report }
    })
}

fn scenario() -> RawRecord {
    RawRecord::from_value(json!({
        "ndvi": 0.75, "savi": 0.45, "temperature": 29, "humidity": 70,
        "soil_ph": 6.8, "soil_moisture": 40, "nitrogen": 55,
        "phosphorus": 28, "potassium": 35, "crop": "Rice", "district": "Pune"
    }))
}

/// A registry holding only the fallback bundles of the shared store.
fn fallback_registry() -> ModelRegistry {
    let store = trained().store();
    let registry = ModelRegistry::new();
    for task in Task::ALL {
        let bundle = store
            .load(task, ModelSource::Fallback)
            .unwrap()
            .expect("fallback bundle");
        registry.insert(bundle);
    }
    registry
}

// ============================================================================
// Training
// ============================================================================

#[test]
fn test_both_profiles_train_every_task() {
    let report = &trained().report;

    assert_eq!(report.results.len(), 6);
    for result in &report.results {
        assert!(
            result.success,
            "{} {} failed: {:?}",
            result.model_source,
            result.task,
            result.warnings
        );
    }
    assert_eq!(trained().store().list().len(), 6);
    assert_eq!(trained().store().metrics_summary().unwrap().tasks.len(), 3);
}

#[test]
fn test_classification_scores_are_fractions() {
    for source in ModelSource::PRIORITY {
        let result = trained().report.get(Task::Fertilizer, source).unwrap();
        let metrics = result.metrics.as_ref().unwrap();

        assert!((0.0..=1.0).contains(&metrics.test_score));
        assert!((0.0..=1.0).contains(&metrics.cv_mean.unwrap()));
        assert!((0.0..=1.0).contains(&metrics.f1_score.unwrap()));
        assert_eq!(metrics.accuracy, Some(metrics.test_score));
    }
}

#[test]
fn test_optimized_results_report_selection_and_members() {
    let result = trained()
        .report
        .get(Task::YieldPrediction, ModelSource::Optimized)
        .unwrap();
    let metrics = result.metrics.as_ref().unwrap();

    assert_eq!(result.best_model_name, "voting_regressor");
    assert_eq!(metrics.selected_features.len(), 12);
    assert_eq!(result.feature_importance.len(), 12);
    assert!(
        result
            .feature_importance
            .windows(2)
            .all(|w| w[0].1 >= w[1].1)
    );
    assert_eq!(result.model_comparison.len(), 4);
}

#[test]
fn test_fertilizer_forests_train_class_balanced() {
    // the fertilizer fixture holds 45 Urea, 24 DAP and 21 MOP rows
    for source in ModelSource::PRIORITY {
        let result = trained().report.get(Task::Fertilizer, source).unwrap();
        let forest = result
            .model_comparison
            .iter()
            .find(|c| c.name.starts_with("random_forest"))
            .expect("random forest entry");
        assert_eq!(forest.hyperparameters.get("class_weight"), Some(&json!("balanced")));
    }
}

#[test]
fn test_members_train_with_their_own_parameters() {
    let result = trained()
        .report
        .get(Task::CropHealth, ModelSource::Optimized)
        .unwrap();
    let params = |name: &str| {
        result
            .model_comparison
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.hyperparameters.clone())
            .expect("member entry")
    };

    let rf = params("random_forest");
    assert_eq!(rf.get("max_depth"), Some(&json!(15)));
    assert_eq!(rf.get("min_samples_split"), Some(&json!(5)));
    assert_eq!(rf.get("max_features"), Some(&json!("sqrt")));
    let et = params("extra_trees");
    assert_eq!(et.get("max_depth"), Some(&json!(20)));
    assert_eq!(et.get("min_samples_split"), Some(&json!(3)));
    assert_eq!(params("gradient_boosting").get("max_depth"), Some(&json!(3)));
}

#[test]
fn test_missing_target_fails_task_and_run_continues() {
    let trainer = Trainer::builder()
        .config(small_config())
        .build()
        .unwrap();
    let agriculture = fixture_tables().agriculture;
    let tables = TrainingTables::new(agriculture.clone(), agriculture);

    let report = trainer
        .train_all(&tables, TrainingProfile::Fallback, None)
        .unwrap();

    assert!(report.is_partial());
    assert_eq!(report.succeeded().count(), 2);
    let failed = report.get(Task::Fertilizer, ModelSource::Fallback).unwrap();
    assert!(!failed.success);
    assert!(failed.warnings[0].contains("Fertilizer"));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_loaded_bundle_predicts_identically() {
    let store = trained().store();
    let first = store
        .load(Task::CropHealth, ModelSource::Optimized)
        .unwrap()
        .unwrap();
    let second = store
        .load(Task::CropHealth, ModelSource::Optimized)
        .unwrap()
        .unwrap();

    let raw = scenario();
    assert_eq!(
        first.predict(&raw).unwrap().value().to_bits(),
        second.predict(&raw).unwrap().value().to_bits()
    );
}

#[test]
fn test_swapped_component_is_reported_corrupt() {
    let source = trained().store();
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());

    let mut bundle = source
        .load(Task::Fertilizer, ModelSource::Optimized)
        .unwrap()
        .unwrap();
    let scaler = source
        .load(Task::Fertilizer, ModelSource::Fallback)
        .unwrap()
        .unwrap()
        .payload
        .scaler;
    bundle.payload.scaler = scaler;
    std::fs::write(
        store.bundle_path(Task::Fertilizer, ModelSource::Optimized),
        serde_json::to_vec(&bundle).unwrap(),
    )
    .unwrap();

    let err = store
        .load(Task::Fertilizer, ModelSource::Optimized)
        .unwrap_err();
    assert!(matches!(err, AgriLearningError::ArtifactCorrupt { .. }));

    let registry = ModelRegistry::load_from(&store);
    assert!(registry.is_empty());
}

// ============================================================================
// Inference
// ============================================================================

#[test]
fn test_scenario_health_status_matches_score() {
    let registry = ModelRegistry::load_from(&trained().store());
    let response = Gateway::new(&registry).predict_crop_health(&scenario());

    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.model_type(), "optimized");
    let health = response.health().unwrap();
    assert_eq!(health.health_status, HealthStatus::from_score(health.health_score));
    assert_eq!(health.risk_level, health.health_status.risk_level());
    assert_eq!(health.features_analyzed, 26);

    let confidence = response.confidence.unwrap();
    assert!((0.0..=1.0).contains(&confidence));
}

#[test]
fn test_fallback_serves_when_optimized_absent() {
    let registry = fallback_registry();
    let gateway = Gateway::new(&registry);

    for (task, confidence) in [
        (Task::CropHealth, 0.85),
        (Task::YieldPrediction, 0.82),
        (Task::Fertilizer, 0.87),
    ] {
        let response = gateway.predict(task, &scenario());
        assert!(response.success);
        assert_eq!(response.model_type(), "fallback");
        assert_eq!(response.confidence, Some(confidence));
    }
}

#[test]
fn test_no_models_reports_failure() {
    let registry = ModelRegistry::new();
    let response = Gateway::new(&registry).recommend_fertilizer(&scenario());

    assert!(!response.success);
    assert_eq!(response.model_type(), "none");
    assert!(response.error.is_some());
}

#[test]
fn test_fertilizer_is_a_trained_class() {
    let registry = ModelRegistry::load_from(&trained().store());
    let response = Gateway::new(&registry).recommend_fertilizer(&scenario());

    let advice = response.fertilizer().unwrap();
    assert!(["DAP", "MOP", "Urea"].contains(&advice.recommended_fertilizer.as_str()));
    assert!(!advice.label_approximated);
    assert!(advice.application_rate.ends_with("kg per acre"));
    assert_eq!(advice.npk_analysis.nitrogen, 55.0);
}

#[test]
fn test_yield_prediction_is_repeatable() {
    let registry = ModelRegistry::load_from(&trained().store());
    let gateway = Gateway::new(&registry);

    let first = gateway.predict_yield(&scenario());
    let second = gateway.predict_yield(&scenario());
    assert_eq!(first.prediction, second.prediction);
    assert_eq!(first.yield_forecast().unwrap().crop_type, "Rice");
}

#[test]
fn test_missing_fields_use_defaults() {
    let registry = ModelRegistry::load_from(&trained().store());
    let gateway = Gateway::new(&registry);

    for task in Task::ALL {
        let response = gateway.predict(task, &RawRecord::new());
        assert!(response.success, "{task}: {:?}", response.error);
    }
}

#[test]
fn test_analyze_all_combines_tasks() {
    let registry = ModelRegistry::load_from(&trained().store());
    let analysis = Gateway::new(&registry).analyze_all(&scenario());

    assert!(analysis.crop_health.success);
    assert!(analysis.yield_prediction.success);
    assert!(analysis.fertilizer.success);
    assert!(analysis.overall_score.is_some());
    assert!(
        analysis
            .recommendations
            .iter()
            .any(|r| r.starts_with("Apply "))
    );
}

#[test]
fn test_system_status_counts_bundles() {
    let registry = ModelRegistry::load_from(&trained().store());
    let status = Gateway::new(&registry).system_status();

    assert_eq!(status.optimized_models_available, 3);
    assert_eq!(status.fallback_models_available, 3);
    assert_eq!(status.total_models, 6);
    assert_eq!(status.performance_boost, "Available");
    assert_eq!(status.estimated_accuracy.len(), 3);

    let value = serde_json::to_value(&status).unwrap();
    assert!(value["estimated_accuracy"]["fertilizer"]["improvement"].is_string());
}
