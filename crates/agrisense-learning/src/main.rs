//! CLI entry point for AgriSense training and inference.

use agrisense_learning::{
    Gateway, ModelRegistry, ModelStore, RawRecord, Task, Trainer, TrainerConfig, TrainingProfile,
    TrainingReport, TrainingTables,
};
use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

const MODELS_DIR_ENV: &str = "AGRISENSE_MODELS_DIR";
const DEFAULT_MODELS_DIR: &str = "./models";

/// CLI-compatible task enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTask {
    /// Crop health score (regression)
    CropHealth,
    /// Yield in tonnes per hectare (regression)
    Yield,
    /// Fertilizer recommendation (classification)
    Fertilizer,
}

impl From<CliTask> for Task {
    fn from(cli: CliTask) -> Self {
        match cli {
            CliTask::CropHealth => Task::CropHealth,
            CliTask::Yield => Task::YieldPrediction,
            CliTask::Fertilizer => Task::Fertilizer,
        }
    }
}

/// CLI-compatible training profile enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProfile {
    /// Feature-selected ensembles
    Optimized,
    /// Plain random forests on all features
    Fallback,
    /// Both profiles
    Both,
}

impl From<CliProfile> for TrainingProfile {
    fn from(cli: CliProfile) -> Self {
        match cli {
            CliProfile::Optimized => TrainingProfile::Optimized,
            CliProfile::Fallback => TrainingProfile::Fallback,
            CliProfile::Both => TrainingProfile::Both,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "AgriSense crop decision pipeline",
    long_about = "Trains the crop health, yield and fertilizer models and serves predictions \
                  from them, preferring optimized models and falling back to simpler ones.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  AGRISENSE_MODELS_DIR  Models directory (also read from .env)\n  \
                  RUST_LOG              Overrides the log filter\n\n\
                  EXAMPLES:\n  \
                  agrisense train --agriculture agri.csv --fertilizer fert.csv --profile both\n  \
                  agrisense predict --task yield --input '{\"ndvi\": 0.8, \"crop\": \"Wheat\"}'\n  \
                  agrisense analyze --input @field.json\n  \
                  agrisense status --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the model bundles
    ///
    /// Defaults to $AGRISENSE_MODELS_DIR, then ./models
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write only JSON to stdout; disables logging
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train models from the agriculture and fertilizer tables
    Train(TrainArgs),
    /// Run one task on a JSON record
    Predict {
        #[arg(short, long, value_enum)]
        task: CliTask,

        /// JSON object, or @path to a JSON file
        #[arg(short, long)]
        input: String,
    },
    /// Run all three tasks on a JSON record
    Analyze {
        /// JSON object, or @path to a JSON file
        #[arg(short, long)]
        input: String,
    },
    /// Show which models are loaded and their estimated accuracy
    Status,
    /// Show the accuracy of the models that would serve each task
    Accuracy,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Agriculture table (crop health and yield)
    #[arg(long)]
    agriculture: PathBuf,

    /// Fertilizer table
    #[arg(long)]
    fertilizer: PathBuf,

    #[arg(long, value_enum, default_value = "optimized")]
    profile: CliProfile,

    /// Trainer configuration as JSON; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn models_dir(cli: &Cli) -> PathBuf {
    cli.models_dir
        .clone()
        .or_else(|| std::env::var_os(MODELS_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR))
}

/// Parse `--input`: inline JSON, or `@path` to a JSON file.
fn read_record(input: &str) -> Result<RawRecord> {
    let text = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Reading input file {path}"))?,
        None => input.to_string(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&text).context("Input is not valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("Input must be a JSON object of field readings"));
    }
    Ok(RawRecord::from_value(value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    // Load environment variables from .env file
    dotenv().ok();

    let store = ModelStore::new(models_dir(&cli));

    match &cli.command {
        Command::Train(args) => run_train(&cli, args, &store),
        Command::Predict { task, input } => {
            let registry = ModelRegistry::load_from(&store);
            let response = Gateway::new(&registry).predict((*task).into(), &read_record(input)?);
            print_json(&response)?;
            if !response.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Analyze { input } => {
            let registry = ModelRegistry::load_from(&store);
            let analysis = Gateway::new(&registry).analyze_all(&read_record(input)?);
            print_json(&analysis)?;
            if !analysis.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Status => {
            let registry = ModelRegistry::load_from(&store);
            print_json(&Gateway::new(&registry).system_status())
        }
        Command::Accuracy => {
            let registry = ModelRegistry::load_from(&store);
            let report = Gateway::new(&registry).accuracy_report();
            if cli.json {
                return print_json(&report);
            }
            if report.tasks.is_empty() {
                println!("No models available in {}", store.dir().display());
                return Ok(());
            }
            println!("{:<18} {:<10} {:>9}  STATUS", "TASK", "MODEL", "ACCURACY");
            for entry in &report.tasks {
                println!(
                    "{:<18} {:<10} {:>8.1}%  {}",
                    entry.task.as_str(),
                    entry.model_type.as_str(),
                    entry.accuracy_percent,
                    entry.status
                );
            }
            if let Some(average) = report.average_accuracy {
                println!("\nAverage accuracy: {average:.1}%");
            }
            Ok(())
        }
    }
}

fn run_train(cli: &Cli, args: &TrainArgs, store: &ModelStore) -> Result<()> {
    let config = match &args.config {
        Some(path) => TrainerConfig::from_json_file(path)?,
        None => TrainerConfig::default(),
    };

    let mut builder = Trainer::builder().config(config);
    if !cli.quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage,
                update.message
            );
        });
    }
    let trainer = builder.build()?;

    info!("Loading training tables");
    let tables = TrainingTables::from_csv(&args.agriculture, &args.fertilizer);
    let report = trainer.train_all(&tables, args.profile.into(), Some(store))?;

    if cli.json {
        print_json(&report)?;
    } else {
        print_summary(&report, store);
    }

    if !report.any_success() {
        return Err(anyhow!("No model could be trained"));
    }
    if report.is_partial() {
        warn!("Some models failed to train; see the summary above");
    }
    Ok(())
}

/// Print a human-readable training summary.
///
/// Uses `println!` for user-facing output; logging goes through `tracing`.
fn print_summary(report: &TrainingReport, store: &ModelStore) {
    println!("\n{}", "=".repeat(72));
    println!("TRAINING SUMMARY");
    println!("{}", "=".repeat(72));
    for result in &report.results {
        match (&result.metrics, result.success) {
            (Some(metrics), true) => println!(
                "  [ok]   {:<10} {:<18} {:<26} test {:.4}  cv {}",
                result.model_source.as_str(),
                result.task.as_str(),
                result.best_model_name,
                metrics.test_score,
                metrics
                    .cv_mean
                    .map_or("n/a".to_string(), |cv| format!("{cv:.4}"))
            ),
            _ => println!(
                "  [fail] {:<10} {:<18} {}",
                result.model_source.as_str(),
                result.task.as_str(),
                result.warnings.first().map_or("", String::as_str)
            ),
        }
    }
    println!("{}", "-".repeat(72));
    println!(
        "  {} of {} models trained in {:.1}s, saved to {}",
        report.succeeded().count(),
        report.results.len(),
        report.total_time_seconds,
        store.dir().display()
    );
}
