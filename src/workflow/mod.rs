use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::align::DataAligner;
use crate::backtest::{BacktestEngine, BacktestResult, StrategyProfile};
use crate::error::{Result, TunerError};
use crate::metrics::MetricsEngine;
use crate::optimizer::{ModelOptimizer, Optimizer, TuningRecommendation};
use crate::params::{Adjustment, AdjustmentMap, ConfigBackend, ParameterSet, ParameterStore};
use crate::sources::{PredictionSource, ResultSource};
use crate::types::{AlignedGame, DateRange, TuningMetrics};
use crate::validate::{CrossValidationReport, CrossValidator};

const CV_SPLITS: usize = 3;

/// How far a single tuning run is allowed to move any parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    Conservative,
    Moderate,
    Aggressive,
}

impl OptimizationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationLevel::Conservative => "conservative",
            OptimizationLevel::Moderate => "moderate",
            OptimizationLevel::Aggressive => "aggressive",
        }
    }

    /// Cap on per-parameter multiplier distance from 1.0.
    pub fn max_adjustment(&self) -> f64 {
        match self {
            OptimizationLevel::Conservative => 0.1,
            OptimizationLevel::Moderate => 0.2,
            OptimizationLevel::Aggressive => 0.4,
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OptimizationLevel {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(OptimizationLevel::Conservative),
            "moderate" => Ok(OptimizationLevel::Moderate),
            "aggressive" => Ok(OptimizationLevel::Aggressive),
            other => Err(TunerError::InvalidConfiguration(format!(
                "unknown optimization level: {}",
                other
            ))),
        }
    }
}

/// Everything one tuning run produced, including what went wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub range: DateRange,
    pub level: OptimizationLevel,
    pub steps_completed: Vec<String>,
    pub errors: Vec<String>,
    pub baseline_metrics: TuningMetrics,
    pub recommendations: Vec<TuningRecommendation>,
    pub backtest_results: Vec<BacktestResult>,
    pub cross_validation: Option<CrossValidationReport>,
    pub applied_version: Option<String>,
    pub final_grade: String,
}

impl WorkflowReport {
    /// Render the run as a markdown document. Writing it anywhere is the
    /// caller's business.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Tuning Workflow Report\n\n");
        out.push_str(&format!("Generated: {}\n\n", self.finished_at.format("%Y-%m-%d %H:%M:%S")));

        out.push_str("## Workflow Summary\n");
        out.push_str(&format!("- **Date Range**: {}\n", self.range));
        out.push_str(&format!("- **Optimization Level**: {}\n", self.level));
        out.push_str(&format!("- **Steps Completed**: {}\n", self.steps_completed.len()));
        out.push_str(&format!("- **Errors Encountered**: {}\n\n", self.errors.len()));

        out.push_str("## Performance Analysis\n");
        out.push_str(&format!("- **Score MAE**: {:.2} runs\n", self.baseline_metrics.score_mae));
        out.push_str(&format!("- **Total Runs MAE**: {:.2} runs\n", self.baseline_metrics.total_mae));
        out.push_str(&format!(
            "- **Win Accuracy**: {:.1}%\n",
            self.baseline_metrics.win_probability_accuracy * 100.0
        ));
        out.push_str(&format!("- **Betting ROI**: {:.2}%\n", self.baseline_metrics.betting_roi));
        out.push_str(&format!("- **Overall Grade**: {}\n\n", self.final_grade));

        if let Some(version) = &self.applied_version {
            out.push_str(&format!("## Parameters\n- **Applied Version**: {}\n\n", version));
        }

        out.push_str(&format!(
            "## Recommendations\nTotal: {} recommendation(s)\n\n",
            self.recommendations.len()
        ));
        for rec in &self.recommendations {
            out.push_str(&format!("- [{}] {}\n", rec.priority, rec.description));
        }

        if !self.backtest_results.is_empty() {
            out.push_str("\n## Backtest Results\n");
            for result in &self.backtest_results {
                out.push_str(&format!("- {}\n", result));
            }
        }

        if let Some(cv) = &self.cross_validation {
            out.push_str("\n## Cross-Validation\n");
            out.push_str(&format!(
                "- **Score MAE**: {:.3} +/- {:.3}\n- **Win Accuracy**: {:.1}%\n- **Stability**: {}\n",
                cv.mean_score_mae,
                cv.std_score_mae,
                cv.mean_win_accuracy * 100.0,
                cv.stability
            ));
        }

        if !self.errors.is_empty() {
            out.push_str("\n## Errors\n");
            for e in &self.errors {
                out.push_str(&format!("- {}\n", e));
            }
        }

        out
    }
}

/// Weighted performance score mapped to a letter grade.
pub fn performance_grade(metrics: &TuningMetrics) -> String {
    let score = (100.0 - metrics.score_mae * 20.0) * 0.3
        + (100.0 - metrics.total_mae * 25.0) * 0.3
        + metrics.win_probability_accuracy * 100.0 * 0.4;

    let letter = if score >= 85.0 {
        "A"
    } else if score >= 75.0 {
        "B"
    } else if score >= 65.0 {
        "C"
    } else if score >= 55.0 {
        "D"
    } else {
        "F"
    };
    format!("{} ({:.1})", letter, score)
}

/// Sequences one full tuning run: align, measure, optimize, apply,
/// backtest, cross-validate, grade. Best effort throughout: every step
/// failure is recorded and a fallback substituted, and a report always
/// comes back.
pub struct Orchestrator<P, R, B>
where
    P: PredictionSource,
    R: ResultSource,
    B: ConfigBackend,
{
    predictions: P,
    results: R,
    store: ParameterStore<B>,
}

impl<P, R, B> Orchestrator<P, R, B>
where
    P: PredictionSource,
    R: ResultSource,
    B: ConfigBackend,
{
    pub fn new(predictions: P, results: R, store: ParameterStore<B>) -> Self {
        Self {
            predictions,
            results,
            store,
        }
    }

    pub fn run_tuning(&mut self, range: DateRange, level: OptimizationLevel) -> WorkflowReport {
        let started_at = Utc::now();
        let mut steps = Vec::new();
        let mut errors = Vec::new();

        info!("starting tuning run over {} at level {}", range, level);

        // Load and align. Missing data degrades to an empty sample.
        let games = self.load_aligned(&range, &mut errors);
        steps.push(format!("historical_data_loaded ({} games)", games.len()));

        let baseline = match MetricsEngine::compute(&games) {
            Ok(m) => {
                steps.push("baseline_analysis".to_string());
                m
            }
            Err(e) => {
                error!("baseline metrics failed: {}", e);
                errors.push(format!("baseline_analysis: {}", e));
                TuningMetrics::empty()
            }
        };

        steps.push(format!(
            "parameters_loaded (version {})",
            self.store.current().version
        ));

        // Rule-based recommendations from the policy table. A null
        // baseline carries no signal worth acting on.
        let recommendations = if baseline.is_empty() {
            warn!("null baseline metrics, skipping rule-based optimization");
            Vec::new()
        } else {
            Optimizer::new().recommend(&baseline)
        };
        let mut adjustments = Optimizer::to_adjustments(&recommendations, level.max_adjustment());
        steps.push(format!(
            "optimization_complete ({} recommendations)",
            recommendations.len()
        ));

        // ML-assisted signals supplement the rules; a short sample only
        // skips this step. Rule adjustments win on key collisions.
        match ModelOptimizer::new().derive_signals(&games) {
            Ok(signals) => {
                let cap = level.max_adjustment();
                for (key, adjustment) in signals.to_adjustments() {
                    let adjustment = match adjustment {
                        Adjustment::Multiply(m) => {
                            Adjustment::Multiply(m.clamp(1.0 - cap, 1.0 + cap))
                        }
                        other => other,
                    };
                    adjustments.entry(key).or_insert(adjustment);
                }
                steps.push("model_signals_derived".to_string());
            }
            Err(e) => {
                warn!("skipping model-assisted optimization: {}", e);
                errors.push(format!("model_optimization: {}", e));
            }
        }

        let applied_version = if adjustments.is_empty() {
            info!("no adjustments to apply, parameters left untouched");
            steps.push("no_adjustments_needed".to_string());
            None
        } else {
            match self.store.apply_adjustments(&adjustments) {
                Ok(set) => {
                    let version = set.version.to_string();
                    steps.push(format!("optimizations_applied (version {})", version));
                    Some(version)
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("applying adjustments failed: {}", e);
                    } else {
                        error!("applying adjustments rejected: {}", e);
                    }
                    errors.push(format!("apply_optimizations: {}", e));
                    None
                }
            }
        };

        let mut backtest_results = Vec::new();
        for strategy in StrategyProfile::all() {
            backtest_results.push(BacktestEngine::run(strategy, &games));
        }
        steps.push("backtests_complete".to_string());

        let cross_validation = match CrossValidator::new(CV_SPLITS).run(&games) {
            Ok(report) => {
                steps.push("validation_complete".to_string());
                Some(report)
            }
            Err(e) => {
                warn!("cross-validation failed: {}", e);
                errors.push(format!("cross_validation: {}", e));
                None
            }
        };

        let final_grade = performance_grade(&baseline);
        steps.push("final_report_generated".to_string());
        info!("tuning run finished with grade {}", final_grade);

        WorkflowReport {
            started_at,
            finished_at: Utc::now(),
            range,
            level,
            steps_completed: steps,
            errors,
            baseline_metrics: baseline,
            recommendations,
            backtest_results,
            cross_validation,
            applied_version,
            final_grade,
        }
    }

    /// Metrics over the range without touching parameters.
    pub fn get_metrics(&self, range: DateRange) -> Result<TuningMetrics> {
        let mut errors = Vec::new();
        let games = self.load_aligned(&range, &mut errors);
        MetricsEngine::compute(&games)
    }

    pub fn get_parameters(&self) -> &ParameterSet {
        self.store.current()
    }

    pub fn apply_parameters(&mut self, adjustments: &AdjustmentMap) -> Result<ParameterSet> {
        self.store.apply_adjustments(adjustments).cloned()
    }

    fn load_aligned(&self, range: &DateRange, errors: &mut Vec<String>) -> Vec<AlignedGame> {
        let predictions = match self.predictions.fetch(range) {
            Ok(p) => p,
            Err(e) => {
                warn!("prediction source failed: {}", e);
                errors.push(format!("load_predictions: {}", e));
                Vec::new()
            }
        };
        let results = match self.results.fetch(range) {
            Ok(r) => r,
            Err(e) => {
                warn!("result source failed: {}", e);
                errors.push(format!("load_results: {}", e));
                Vec::new()
            }
        };
        let alignment = DataAligner::align(range, &predictions, &results);
        for diagnostic in &alignment.unmatched_predictions {
            errors.push(format!("unmatched prediction: {}", diagnostic));
        }
        alignment.games
    }
}
