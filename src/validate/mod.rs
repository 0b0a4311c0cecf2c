use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::error::{Result, TunerError};
use crate::metrics::MetricsEngine;
use crate::types::{AlignedGame, TuningMetrics};

/// Qualitative stability of the per-fold score error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stability {
    High,
    Medium,
    Low,
}

impl Stability {
    fn from_std(std: f64) -> Self {
        if std < 0.3 {
            Stability::High
        } else if std < 0.5 {
            Stability::Medium
        } else {
            Stability::Low
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stability::High => write!(f, "HIGH"),
            Stability::Medium => write!(f, "MEDIUM"),
            Stability::Low => write!(f, "LOW"),
        }
    }
}

/// Metrics for one forward-chaining fold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold: usize,
    pub train_games: usize,
    pub test_games: usize,
    pub metrics: TuningMetrics,
}

/// Aggregate over all folds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldReport>,
    pub mean_score_mae: f64,
    pub std_score_mae: f64,
    pub mean_win_accuracy: f64,
    pub stability: Stability,
}

/// Forward-chaining time-series cross-validation. Each fold trains on a
/// strictly earlier prefix and tests on the block that follows it, so no
/// fold ever sees the future.
pub struct CrossValidator {
    n_splits: usize,
}

impl CrossValidator {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn run(&self, games: &[AlignedGame]) -> Result<CrossValidationReport> {
        if self.n_splits == 0 {
            return Err(TunerError::InvalidConfiguration(
                "cross-validation needs at least one split".into(),
            ));
        }
        if games.len() < self.n_splits + 1 {
            // Too few games to form even one-game blocks; report null
            // placeholders instead of failing the whole run.
            warn!(
                "only {} games for {} splits, recording null folds",
                games.len(),
                self.n_splits
            );
            let folds: Vec<FoldReport> = (1..=self.n_splits)
                .map(|fold| FoldReport {
                    fold,
                    train_games: 0,
                    test_games: 0,
                    metrics: TuningMetrics::empty(),
                })
                .collect();
            return Ok(CrossValidationReport {
                folds,
                mean_score_mae: 0.0,
                std_score_mae: 0.0,
                mean_win_accuracy: 0.0,
                stability: Stability::High,
            });
        }

        let mut ordered: Vec<&AlignedGame> = games.iter().collect();
        ordered.sort_by_key(|g| g.prediction.date);

        // n_splits + 1 contiguous blocks; fold i trains on blocks 0..=i
        // and tests on block i + 1.
        let block = ordered.len() / (self.n_splits + 1);
        let mut folds = Vec::with_capacity(self.n_splits);
        for i in 0..self.n_splits {
            let train_end = block * (i + 1);
            let test_end = if i == self.n_splits - 1 {
                ordered.len()
            } else {
                block * (i + 2)
            };
            let test: Vec<AlignedGame> =
                ordered[train_end..test_end].iter().map(|g| (*g).clone()).collect();

            let metrics = if test.iter().any(|g| g.is_complete()) {
                MetricsEngine::compute(&test)?
            } else {
                warn!("fold {} has no completed games, recording null metrics", i + 1);
                TuningMetrics::empty()
            };

            folds.push(FoldReport {
                fold: i + 1,
                train_games: train_end,
                test_games: test.len(),
                metrics,
            });
        }

        let maes: Vec<f64> = folds.iter().map(|f| f.metrics.score_mae).collect();
        let mean_score_mae = mean(&maes);
        let std_score_mae = std_dev(&maes, mean_score_mae);
        let accuracies: Vec<f64> = folds
            .iter()
            .map(|f| f.metrics.win_probability_accuracy)
            .collect();
        let mean_win_accuracy = mean(&accuracies);
        let stability = Stability::from_std(std_score_mae);

        info!(
            "cross-validation over {} folds: mae {:.3} +/- {:.3}, win acc {:.3}, stability {}",
            folds.len(),
            mean_score_mae,
            std_score_mae,
            mean_win_accuracy,
            stability
        );

        Ok(CrossValidationReport {
            folds,
            mean_score_mae,
            std_score_mae,
            mean_win_accuracy,
            stability,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
