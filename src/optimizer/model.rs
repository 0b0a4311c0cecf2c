use ndarray::{Array2, Axis};
use tracing::{debug, info};

use crate::error::{Result, TunerError};
use crate::params::{Adjustment, AdjustmentMap};
use crate::types::AlignedGame;

/// Minimum completed games before a fit is attempted.
pub const MIN_TRAINING_GAMES: usize = 10;

const NUM_FEATURES: usize = 6;
const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "away_team",
    "home_team",
    "away_pitcher",
    "home_pitcher",
    "day_of_week",
    "month",
];

/// One fitted ridge regressor: coefficients over z-scored features.
#[derive(Debug, Clone)]
struct FittedModel {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl FittedModel {
    /// Normalized absolute coefficient magnitudes, summing to 1 when any
    /// coefficient is nonzero.
    fn importances(&self) -> Vec<f64> {
        let magnitudes: Vec<f64> = self.coefficients.iter().map(|c| c.abs()).collect();
        let sum: f64 = magnitudes.iter().sum();
        if sum < 1e-12 {
            return vec![0.0; magnitudes.len()];
        }
        magnitudes.iter().map(|m| m / sum).collect()
    }
}

/// Aggregated feature importances across the three targets, expressed as
/// weights the parameter model understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSignals {
    pub pitcher_weight: f64,
    pub team_weight: f64,
    pub seasonal_adjustment: f64,
}

impl FeatureSignals {
    /// Map each signal onto a bounded multiplier for its semantic
    /// parameter key. A signal at the uniform baseline (1/6 per feature)
    /// leaves the parameter unchanged.
    pub fn to_adjustments(&self) -> AdjustmentMap {
        const BASELINE: f64 = 1.0 / NUM_FEATURES as f64;
        let multiplier = |signal: f64| (1.0 + (signal - BASELINE)).clamp(0.8, 1.3);

        let mut map = AdjustmentMap::new();
        map.insert(
            "pitcher_impact_weight".to_string(),
            Adjustment::Multiply(multiplier(self.pitcher_weight)),
        );
        map.insert(
            "team_strength_weight".to_string(),
            Adjustment::Multiply(multiplier(self.team_weight)),
        );
        map.insert(
            "seasonal_adjustment".to_string(),
            Adjustment::Multiply(multiplier(self.seasonal_adjustment)),
        );
        map
    }
}

/// Fits small per-target regressors over completed games and reads
/// feature importances back out as parameter adjustment signals.
pub struct ModelOptimizer {
    max_iter: usize,
    learning_rate: f64,
    lambda: f64,
}

impl ModelOptimizer {
    pub fn new() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.01,
            lambda: 0.01,
        }
    }

    /// Train one model per target (away score, home score, total runs)
    /// and aggregate their importances into signals.
    pub fn derive_signals(&self, games: &[AlignedGame]) -> Result<FeatureSignals> {
        let samples: Vec<([f64; NUM_FEATURES], [f64; 3])> = games
            .iter()
            .filter_map(|g| {
                let result = g.final_result()?;
                let features = encode_features(g);
                let targets = [
                    result.away_score as f64,
                    result.home_score as f64,
                    result.total() as f64,
                ];
                Some((features, targets))
            })
            .collect();

        if samples.len() < MIN_TRAINING_GAMES {
            return Err(TunerError::InsufficientSample {
                have: samples.len(),
                need: MIN_TRAINING_GAMES,
            });
        }

        let n = samples.len();
        let mut features = Array2::<f64>::zeros((n, NUM_FEATURES));
        for (i, (feat, _)) in samples.iter().enumerate() {
            for (j, &val) in feat.iter().enumerate() {
                features[[i, j]] = val;
            }
        }
        let normalized = z_score(&features);

        let mut per_model_signals = Vec::with_capacity(3);
        for target_idx in 0..3 {
            let targets: Vec<f64> = samples.iter().map(|(_, t)| t[target_idx]).collect();
            let model = self.fit_ridge(&normalized, &targets);
            let importances = model.importances();
            debug!("target {} intercept {:.3}", target_idx, model.intercept);
            for (name, imp) in FEATURE_NAMES.iter().zip(&importances) {
                debug!("target {} importance {}={:.3}", target_idx, name, imp);
            }
            per_model_signals.push(FeatureSignals {
                // away_team + home_team
                team_weight: (importances[0] + importances[1]) / 2.0,
                // away_pitcher + home_pitcher
                pitcher_weight: (importances[2] + importances[3]) / 2.0,
                seasonal_adjustment: importances[5],
            });
        }

        let k = per_model_signals.len() as f64;
        let signals = FeatureSignals {
            pitcher_weight: per_model_signals.iter().map(|s| s.pitcher_weight).sum::<f64>() / k,
            team_weight: per_model_signals.iter().map(|s| s.team_weight).sum::<f64>() / k,
            seasonal_adjustment: per_model_signals
                .iter()
                .map(|s| s.seasonal_adjustment)
                .sum::<f64>()
                / k,
        };

        info!(
            "model signals over {} games: pitcher={:.3} team={:.3} seasonal={:.3}",
            n, signals.pitcher_weight, signals.team_weight, signals.seasonal_adjustment
        );
        Ok(signals)
    }

    /// Ridge linear regression via gradient descent.
    fn fit_ridge(&self, features: &Array2<f64>, targets: &[f64]) -> FittedModel {
        let n = features.nrows();
        let num_features = features.ncols();

        let mut coefficients = vec![0.0; num_features];
        let mut intercept = 0.0;

        for _iter in 0..self.max_iter {
            let mut grad_coef = vec![0.0; num_features];
            let mut grad_intercept = 0.0;

            for i in 0..n {
                let mut prediction = intercept;
                for j in 0..num_features {
                    prediction += coefficients[j] * features[[i, j]];
                }
                let error = prediction - targets[i];

                grad_intercept += error;
                for j in 0..num_features {
                    grad_coef[j] += error * features[[i, j]];
                }
            }

            intercept -= self.learning_rate * grad_intercept / n as f64;
            for j in 0..num_features {
                coefficients[j] -= self.learning_rate
                    * (grad_coef[j] / n as f64 + self.lambda * coefficients[j]);
            }
        }

        FittedModel {
            coefficients,
            intercept,
        }
    }
}

impl Default for ModelOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Z-score each column; constant columns collapse to zero.
fn z_score(features: &Array2<f64>) -> Array2<f64> {
    let n = features.nrows();
    let num_features = features.ncols();
    // Callers guarantee at least MIN_TRAINING_GAMES rows.
    let means = features
        .mean_axis(Axis(0))
        .unwrap_or_else(|| ndarray::Array1::zeros(num_features));
    let stds = features.std_axis(Axis(0), 1.0);

    let mut normalized = Array2::<f64>::zeros((n, num_features));
    for j in 0..num_features {
        let std = stds[j];
        if std > 1e-10 {
            for i in 0..n {
                normalized[[i, j]] = (features[[i, j]] - means[j]) / std;
            }
        }
    }
    normalized
}

fn encode_features(game: &AlignedGame) -> [f64; NUM_FEATURES] {
    use chrono::Datelike;

    let p = &game.prediction;
    [
        entity_id(&p.away_team),
        entity_id(&p.home_team),
        p.away_pitcher.as_deref().map(entity_id).unwrap_or(0.0),
        p.home_pitcher.as_deref().map(entity_id).unwrap_or(0.0),
        p.date.weekday().num_days_from_monday() as f64,
        p.date.month() as f64,
    ]
}

/// Deterministic small numeric id for a name. FNV-1a keeps the encoding
/// stable across runs and platforms.
fn entity_id(name: &str) -> f64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in name.to_lowercase().bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % 1000) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActualResult, AlignedGame, Confidence, PredictionRecord};
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn game(day: u32, away: &str, home: &str, away_score: u32, home_score: u32) -> AlignedGame {
        let prediction = PredictionRecord {
            date: date(day),
            away_team: away.into(),
            home_team: home.into(),
            predicted_away_score: Some(4.5),
            predicted_home_score: Some(4.5),
            predicted_total: Some(9.0),
            home_win_probability: Some(0.5),
            away_pitcher: Some(format!("{} Starter", away)),
            home_pitcher: Some(format!("{} Starter", home)),
            confidence: Confidence::Medium,
            recommendations: vec![],
            source: "test".into(),
        };
        let result = ActualResult {
            date: date(day),
            away_team: away.into(),
            home_team: home.into(),
            away_score,
            home_score,
            is_final: true,
            game_id: None,
        };
        AlignedGame::new(prediction, Some(result))
    }

    fn sample_games(count: u32) -> Vec<AlignedGame> {
        (1..=count)
            .map(|i| {
                game(
                    i,
                    ["Yankees", "Dodgers", "Cubs"][(i % 3) as usize],
                    ["Red Sox", "Giants", "Cardinals"][(i % 3) as usize],
                    2 + i % 5,
                    3 + i % 4,
                )
            })
            .collect()
    }

    #[test]
    fn test_rejects_small_sample() {
        let optimizer = ModelOptimizer::new();
        let err = optimizer.derive_signals(&sample_games(5)).unwrap_err();
        assert!(matches!(
            err,
            TunerError::InsufficientSample { have: 5, need: 10 }
        ));
    }

    #[test]
    fn test_signals_from_sufficient_sample() {
        let optimizer = ModelOptimizer::new();
        let signals = optimizer.derive_signals(&sample_games(20)).unwrap();
        // Importances are normalized so each signal stays in [0, 1].
        assert!((0.0..=1.0).contains(&signals.pitcher_weight));
        assert!((0.0..=1.0).contains(&signals.team_weight));
        assert!((0.0..=1.0).contains(&signals.seasonal_adjustment));
    }

    #[test]
    fn test_signals_deterministic() {
        let optimizer = ModelOptimizer::new();
        let games = sample_games(15);
        let a = optimizer.derive_signals(&games).unwrap();
        let b = optimizer.derive_signals(&games).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_adjustments_bounded() {
        let signals = FeatureSignals {
            pitcher_weight: 0.9,
            team_weight: 0.0,
            seasonal_adjustment: 1.0 / 6.0,
        };
        let map = signals.to_adjustments();
        assert_eq!(
            map.get("pitcher_impact_weight"),
            Some(&Adjustment::Multiply(1.3))
        );
        assert_eq!(
            map.get("team_strength_weight"),
            Some(&Adjustment::Multiply(1.0 - 1.0 / 6.0))
        );
        // Baseline signal means no change.
        assert_eq!(
            map.get("seasonal_adjustment"),
            Some(&Adjustment::Multiply(1.0))
        );
    }

    #[test]
    fn test_entity_id_stable_and_bounded() {
        assert_eq!(entity_id("Yankees"), entity_id("yankees"));
        assert!(entity_id("Boston Red Sox") < 1000.0);
    }
}
