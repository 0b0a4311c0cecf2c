use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{Result, TunerError};
use crate::types::{ActualResult, AlignedGame, Confidence, PredictionRecord, TuningMetrics};

/// Flat stake used when grading recommendation ROI, in units.
pub const STAKE_UNIT: f64 = 100.0;
/// Profit per unit staked at assumed American odds of -110.
pub const WIN_PROFIT_PER_UNIT: f64 = 100.0 / 110.0;

/// Computes accuracy and profitability metrics over aligned games.
///
/// Pure: identical inputs always produce identical output. Each metric
/// independently excludes games missing the fields it needs; missing data
/// for one metric never suppresses another.
pub struct MetricsEngine;

impl MetricsEngine {
    pub fn compute(games: &[AlignedGame]) -> Result<TuningMetrics> {
        let completed: Vec<(&PredictionRecord, &ActualResult)> = games
            .iter()
            .filter_map(|g| g.final_result().map(|r| (&g.prediction, r)))
            .collect();

        if completed.is_empty() {
            warn!("no completed games in sample, returning null metrics");
            return Ok(TuningMetrics::empty());
        }

        let (score_mae, score_rmse) = Self::score_errors(&completed);
        let total_mae = Self::total_error(&completed);
        let win_probability_accuracy = Self::win_accuracy(&completed)?;
        let betting_roi = Self::betting_roi(&completed);
        let confidence_calibration = Self::confidence_calibration(&completed);

        let metrics = TuningMetrics {
            score_mae,
            score_rmse,
            total_mae,
            win_probability_accuracy,
            betting_roi,
            confidence_calibration,
        };
        debug!("computed metrics over {} completed games: {}", completed.len(), metrics);
        Ok(metrics)
    }

    /// MAE/RMSE over the flattened away+home score list, restricted to
    /// games where all four values are present.
    fn score_errors(completed: &[(&PredictionRecord, &ActualResult)]) -> (f64, f64) {
        let mut predicted = Vec::new();
        let mut actual = Vec::new();
        for (p, r) in completed.iter().filter(|(p, _)| p.has_score_prediction()) {
            if let (Some(pa), Some(ph)) = (p.predicted_away_score, p.predicted_home_score) {
                predicted.push(pa);
                predicted.push(ph);
                actual.push(r.away_score as f64);
                actual.push(r.home_score as f64);
            }
        }
        if predicted.is_empty() {
            return (0.0, 0.0);
        }

        let n = predicted.len() as f64;
        let mae = predicted
            .iter()
            .zip(&actual)
            .map(|(p, a)| (p - a).abs())
            .sum::<f64>()
            / n;
        let mse = predicted
            .iter()
            .zip(&actual)
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / n;
        (mae, mse.sqrt())
    }

    fn total_error(completed: &[(&PredictionRecord, &ActualResult)]) -> f64 {
        let errors: Vec<f64> = completed
            .iter()
            .filter_map(|(p, r)| {
                p.predicted_total
                    .map(|predicted| (predicted - r.total() as f64).abs())
            })
            .collect();
        if errors.is_empty() {
            return 0.0;
        }
        errors.iter().sum::<f64>() / errors.len() as f64
    }

    fn win_accuracy(completed: &[(&PredictionRecord, &ActualResult)]) -> Result<f64> {
        let mut predicted = Vec::new();
        let mut actual = Vec::new();
        for (p, r) in completed {
            if let Some(call) = p.predicts_home_win() {
                predicted.push(call);
                actual.push(r.home_won());
            }
        }
        Self::paired_accuracy(&predicted, &actual)
    }

    /// Accuracy over paired boolean series. A length mismatch is a bug in
    /// the caller's pairing and is surfaced, never truncated away.
    pub fn paired_accuracy(predicted: &[bool], actual: &[bool]) -> Result<f64> {
        if predicted.len() != actual.len() {
            return Err(TunerError::AlignmentMismatch(format!(
                "paired series disagree on length: {} predictions vs {} outcomes",
                predicted.len(),
                actual.len()
            )));
        }
        if predicted.is_empty() {
            return Ok(0.0);
        }
        let correct = predicted
            .iter()
            .zip(actual)
            .filter(|(p, a)| p == a)
            .count();
        Ok(correct as f64 / predicted.len() as f64)
    }

    /// ROI% of HIGH-confidence recommendations, each staked at a flat
    /// [`STAKE_UNIT`] and graded at assumed -110 odds.
    fn betting_roi(completed: &[(&PredictionRecord, &ActualResult)]) -> f64 {
        let mut staked = 0.0;
        let mut returned = 0.0;

        for (p, r) in completed {
            for rec in &p.recommendations {
                if rec.confidence != Confidence::High {
                    continue;
                }
                staked += STAKE_UNIT;
                if rec.kind.wins_against(r) {
                    returned += STAKE_UNIT * (1.0 + WIN_PROFIT_PER_UNIT);
                }
            }
        }

        if staked == 0.0 {
            return 0.0;
        }
        (returned - staked) / staked * 100.0
    }

    /// Per-bucket empirical accuracy of the home-win call against the
    /// bucket targets. Buckets with no observations are excluded from the
    /// mean instead of dragging it down.
    fn confidence_calibration(completed: &[(&PredictionRecord, &ActualResult)]) -> f64 {
        let mut outcomes: HashMap<Confidence, Vec<bool>> = HashMap::new();
        for (p, r) in completed {
            if let Some(call) = p.predicts_home_win() {
                outcomes
                    .entry(p.confidence)
                    .or_default()
                    .push(call == r.home_won());
            }
        }

        let mut scores = Vec::new();
        for bucket in Confidence::all() {
            if let Some(observed) = outcomes.get(&bucket) {
                if observed.is_empty() {
                    continue;
                }
                let accuracy =
                    observed.iter().filter(|c| **c).count() as f64 / observed.len() as f64;
                scores.push(1.0 - (accuracy - bucket.target_accuracy()).abs());
            }
        }

        if scores.is_empty() {
            return 0.0;
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BetSide, Recommendation};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn game(
        pred_away: f64,
        pred_home: f64,
        home_win_prob: f64,
        confidence: Confidence,
        recommendations: Vec<Recommendation>,
        away_score: u32,
        home_score: u32,
    ) -> AlignedGame {
        let prediction = PredictionRecord {
            date: date("2025-08-14"),
            away_team: "New York Yankees".into(),
            home_team: "Boston Red Sox".into(),
            predicted_away_score: Some(pred_away),
            predicted_home_score: Some(pred_home),
            predicted_total: Some(pred_away + pred_home),
            home_win_probability: Some(home_win_prob),
            away_pitcher: None,
            home_pitcher: None,
            confidence,
            recommendations,
            source: "test".into(),
        };
        let result = ActualResult {
            date: date("2025-08-14"),
            away_team: "New York Yankees".into(),
            home_team: "Boston Red Sox".into(),
            away_score,
            home_score,
            is_final: true,
            game_id: None,
        };
        AlignedGame::new(prediction, Some(result))
    }

    #[test]
    fn test_scenario_a_score_mae() {
        // pred 5.2/4.1 vs actual 6/3: mean(|5.2-6|, |4.1-3|) = 0.95
        let games = vec![game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3)];
        let metrics = MetricsEngine::compute(&games).unwrap();
        assert!((metrics.score_mae - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_b_win_accuracy() {
        // 0.42 implies away favored; away won, so the call was correct.
        let games = vec![game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3)];
        let metrics = MetricsEngine::compute(&games).unwrap();
        assert_eq!(metrics.win_probability_accuracy, 1.0);
    }

    #[test]
    fn test_rmse_at_least_mae() {
        let games = vec![
            game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3),
            game(3.0, 7.0, 0.7, Confidence::High, vec![], 2, 4),
        ];
        let metrics = MetricsEngine::compute(&games).unwrap();
        assert!(metrics.score_rmse >= metrics.score_mae);
    }

    #[test]
    fn test_total_mae() {
        // predicted total 9.3 vs actual 9 -> 0.3
        let games = vec![game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3)];
        let metrics = MetricsEngine::compute(&games).unwrap();
        assert!((metrics.total_mae - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_betting_roi_single_winner() {
        let rec = Recommendation::moneyline(BetSide::Away, Confidence::High);
        let games = vec![game(5.2, 4.1, 0.42, Confidence::High, vec![rec], 6, 3)];
        let metrics = MetricsEngine::compute(&games).unwrap();
        // One 100-unit stake returning 190.909...: ROI ~ 90.9%
        assert!((metrics.betting_roi - 90.909).abs() < 0.01);
    }

    #[test]
    fn test_betting_roi_ignores_non_high() {
        let rec = Recommendation::moneyline(BetSide::Away, Confidence::Medium);
        let games = vec![game(5.2, 4.1, 0.42, Confidence::Medium, vec![rec], 6, 3)];
        let metrics = MetricsEngine::compute(&games).unwrap();
        assert_eq!(metrics.betting_roi, 0.0);
    }

    #[test]
    fn test_calibration_skips_empty_buckets() {
        // Only MEDIUM observed, and its call was correct: empirical 1.0 vs
        // target 0.6 gives 1 - 0.4 = 0.6 with no dilution from HIGH/LOW.
        let games = vec![game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3)];
        let metrics = MetricsEngine::compute(&games).unwrap();
        assert!((metrics.confidence_calibration - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_missing_fields_isolated_per_metric() {
        let mut g = game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3);
        g.prediction.predicted_total = None;
        g.prediction.home_win_probability = None;
        let metrics = MetricsEngine::compute(&[g]).unwrap();
        // Scores still graded even though total and win prob are absent.
        assert!((metrics.score_mae - 0.95).abs() < 1e-9);
        assert_eq!(metrics.total_mae, 0.0);
        assert_eq!(metrics.win_probability_accuracy, 0.0);
    }

    #[test]
    fn test_non_final_games_excluded() {
        let mut g = game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3);
        g.result.as_mut().unwrap().is_final = false;
        let metrics = MetricsEngine::compute(&[g]).unwrap();
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_determinism() {
        let games = vec![
            game(5.2, 4.1, 0.42, Confidence::Medium, vec![], 6, 3),
            game(3.0, 7.0, 0.7, Confidence::High, vec![], 2, 4),
        ];
        let a = MetricsEngine::compute(&games).unwrap();
        let b = MetricsEngine::compute(&games).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_paired_accuracy_rejects_length_mismatch() {
        let err = MetricsEngine::paired_accuracy(&[true, false], &[true]).unwrap_err();
        assert!(matches!(err, TunerError::AlignmentMismatch(_)));
    }
}
