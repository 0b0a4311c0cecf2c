mod align;
mod backtest;
mod error;
mod metrics;
mod optimizer;
mod params;
mod sources;
mod types;
mod validate;
mod workflow;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use backtest::{BacktestEngine, StrategyProfile};
use params::{Adjustment, AdjustmentMap, JsonFileBackend, ParameterStore};
use sources::{JsonPredictionSource, JsonResultSource, PredictionSource, ResultSource};
use types::DateRange;
use validate::CrossValidator;
use workflow::{OptimizationLevel, Orchestrator};

#[derive(Parser)]
#[command(name = "mlb-prediction-tuner")]
#[command(version = "0.1.0")]
#[command(about = "Tuning, validation and backtesting for the MLB prediction engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Predictions cache file
    #[arg(long, default_value = "unified_predictions_cache.json")]
    predictions: String,

    /// Game scores cache file
    #[arg(long, default_value = "game_scores_cache.json")]
    scores: String,

    /// Parameter configuration file
    #[arg(short, long, default_value = "data/prediction_config.json")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full tuning workflow over a date range
    Tune {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end: String,
        /// Optimization level (conservative, moderate, aggressive)
        #[arg(short, long, default_value = "moderate")]
        level: String,
        /// Write the markdown report to this file
        #[arg(short, long)]
        report: Option<String>,
    },
    /// Compute accuracy metrics over a date range
    Metrics {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end: String,
    },
    /// Backtest betting strategies over a date range
    Backtest {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end: String,
        /// Strategy profile (conservative, moderate, aggressive); all when omitted
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Cross-validate metric stability over a date range
    Validate {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end: String,
        /// Number of forward-chaining splits
        #[arg(short, long, default_value = "3")]
        splits: usize,
    },
    /// Show or adjust the current parameter set
    Params {
        /// Apply "key=multiplier" adjustments (repeatable)
        #[arg(long)]
        set: Vec<String>,
        /// Roll back to the most recent backup
        #[arg(long)]
        rollback: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("MLB Prediction Tuner v0.1.0");

    let store = ParameterStore::open(JsonFileBackend::new(&cli.config));
    let predictions = JsonPredictionSource::new(&cli.predictions);
    let scores = JsonResultSource::new(&cli.scores);

    match cli.command {
        Commands::Tune {
            start,
            end,
            level,
            report,
        } => {
            let range = parse_range(&start, &end)?;
            let level: OptimizationLevel = level.parse()?;
            let mut orchestrator = Orchestrator::new(predictions, scores, store);
            let result = orchestrator.run_tuning(range, level);

            println!("\n=== Tuning Run Complete ===");
            println!("Steps completed: {}", result.steps_completed.len());
            println!("Errors: {}", result.errors.len());
            println!("Baseline: {}", result.baseline_metrics);
            if let Some(version) = &result.applied_version {
                println!("Parameters now at version {}", version);
            }
            println!("Final grade: {}", result.final_grade);

            if let Some(path) = report {
                std::fs::write(&path, result.to_markdown())?;
                info!("Report saved to {}", path);
            }
        }
        Commands::Metrics { start, end } => {
            let range = parse_range(&start, &end)?;
            let games = load_games(&predictions, &scores, &range)?;
            let metrics = metrics::MetricsEngine::compute(&games)?;

            println!("\n=== Metrics for {} ===", range);
            println!("Games analyzed:   {}", games.len());
            println!("Score MAE:        {:.2} runs", metrics.score_mae);
            println!("Score RMSE:       {:.2} runs", metrics.score_rmse);
            println!("Total MAE:        {:.2} runs", metrics.total_mae);
            println!(
                "Win accuracy:     {:.1}%",
                metrics.win_probability_accuracy * 100.0
            );
            println!("Betting ROI:      {:.2}%", metrics.betting_roi);
            println!("Calibration:      {:.3}", metrics.confidence_calibration);
        }
        Commands::Backtest {
            start,
            end,
            strategy,
        } => {
            let range = parse_range(&start, &end)?;
            let games = load_games(&predictions, &scores, &range)?;
            let strategies = match strategy {
                Some(s) => vec![s.parse::<StrategyProfile>()?],
                None => StrategyProfile::all().to_vec(),
            };

            println!("\n=== Backtest for {} ===", range);
            for profile in strategies {
                let result = BacktestEngine::run(profile, &games);
                println!("{}", result);
                println!(
                    "  profit factor {:.2}, largest win {:.2}, largest loss {:.2}",
                    result.profit_factor, result.largest_win, result.largest_loss
                );
            }
        }
        Commands::Validate { start, end, splits } => {
            let range = parse_range(&start, &end)?;
            let games = load_games(&predictions, &scores, &range)?;
            let report = CrossValidator::new(splits).run(&games)?;

            println!("\n=== Cross-Validation for {} ===", range);
            for fold in &report.folds {
                println!(
                    "fold {}: {} train / {} test, mae {:.2}, win acc {:.1}%",
                    fold.fold,
                    fold.train_games,
                    fold.test_games,
                    fold.metrics.score_mae,
                    fold.metrics.win_probability_accuracy * 100.0
                );
            }
            println!(
                "score MAE {:.3} +/- {:.3}, win accuracy {:.1}%, stability {}",
                report.mean_score_mae,
                report.std_score_mae,
                report.mean_win_accuracy * 100.0,
                report.stability
            );
        }
        Commands::Params { set, rollback } => {
            let mut store = store;
            if rollback {
                let restored = store.rollback()?;
                println!("Rolled back to version {}", restored.version);
            } else if !set.is_empty() {
                let mut adjustments = AdjustmentMap::new();
                for entry in &set {
                    let (key, value) = entry
                        .split_once('=')
                        .ok_or_else(|| anyhow!("expected key=multiplier, got: {}", entry))?;
                    adjustments.insert(key.to_string(), Adjustment::Multiply(value.parse()?));
                }
                let updated = store.apply_adjustments(&adjustments)?;
                println!("Applied {} adjustment(s)", adjustments.len());
                println!("Version: {}", updated.version);
            }

            let summary = store.current().summary();
            println!("\n=== Parameter Set ===");
            println!("{}", summary);
        }
    }

    Ok(())
}

fn parse_range(start: &str, end: &str) -> Result<DateRange> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid start date format. Use YYYY-MM-DD"))?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid end date format. Use YYYY-MM-DD"))?;
    DateRange::new(start, end).ok_or_else(|| anyhow!("End date must not precede start date"))
}

fn load_games(
    predictions: &JsonPredictionSource,
    scores: &JsonResultSource,
    range: &DateRange,
) -> Result<Vec<types::AlignedGame>> {
    let prediction_records = predictions.fetch(range)?;
    let result_records = scores.fetch(range)?;
    let alignment = align::DataAligner::align(range, &prediction_records, &result_records);
    info!(
        "aligned {} of {} predictions ({} completed)",
        alignment.matched_count(),
        alignment.games.len(),
        alignment.completed_count()
    );
    Ok(alignment.games)
}
