pub mod store;

pub use store::{ConfigBackend, JsonFileBackend, MemoryBackend, ParameterStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TunerError};

/// Monotone "major.minor" parameter-set version. Every successful
/// adjustment bumps it by 0.1; it never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ParamVersion {
    pub major: u32,
    pub minor: u32,
}

impl ParamVersion {
    pub fn initial() -> Self {
        Self { major: 1, minor: 0 }
    }

    /// The +0.1 step, carrying into the major at .9 -> next.0.
    pub fn bump(&self) -> Self {
        if self.minor == 9 {
            Self {
                major: self.major + 1,
                minor: 0,
            }
        } else {
            Self {
                major: self.major,
                minor: self.minor + 1,
            }
        }
    }
}

impl fmt::Display for ParamVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl From<ParamVersion> for String {
    fn from(v: ParamVersion) -> Self {
        v.to_string()
    }
}

impl FromStr for ParamVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("invalid version format: {}", s))?;
        Ok(Self {
            major: major.parse().map_err(|e| format!("{}", e))?,
            minor: minor.parse().map_err(|e| format!("{}", e))?,
        })
    }
}

impl TryFrom<String> for ParamVersion {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Weights for pitcher impact on run expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitcherParameters {
    pub era_weight: f64,
    pub whip_weight: f64,
    pub k9_weight: f64,
    pub home_away_adjustment: f64,
    pub rest_days_factor: f64,
    pub recent_form_weight: f64,
    pub career_vs_team_weight: f64,
    pub ace_era_threshold: f64,
    pub good_era_threshold: f64,
    pub average_era_threshold: f64,
    pub ace_run_impact: f64,
    pub good_run_impact: f64,
    pub average_run_impact: f64,
    pub poor_run_impact: f64,
}

impl Default for PitcherParameters {
    fn default() -> Self {
        Self {
            era_weight: 0.35,
            whip_weight: 0.25,
            k9_weight: 0.20,
            home_away_adjustment: 0.15,
            rest_days_factor: 0.05,
            recent_form_weight: 0.30,
            career_vs_team_weight: 0.25,
            ace_era_threshold: 3.00,
            good_era_threshold: 3.75,
            average_era_threshold: 4.50,
            ace_run_impact: -0.8,
            good_run_impact: -0.4,
            average_run_impact: 0.0,
            poor_run_impact: 0.6,
        }
    }
}

/// Weights for team strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamParameters {
    pub offensive_runs_weight: f64,
    pub defensive_runs_weight: f64,
    pub recent_form_weight: f64,
    pub home_field_advantage: f64,
    pub win_streak_bonus: f64,
    pub loss_streak_penalty: f64,
    pub max_streak_impact: f64,
    pub h2h_weight: f64,
    pub division_rival_adjustment: f64,
}

impl Default for TeamParameters {
    fn default() -> Self {
        Self {
            offensive_runs_weight: 0.40,
            defensive_runs_weight: 0.35,
            recent_form_weight: 0.25,
            home_field_advantage: 0.15,
            win_streak_bonus: 0.05,
            loss_streak_penalty: -0.05,
            max_streak_impact: 0.25,
            h2h_weight: 0.20,
            division_rival_adjustment: 0.10,
        }
    }
}

/// Game situation factors: scheduling, weather, series position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSituationParameters {
    pub day_game_adjustment: f64,
    pub night_game_adjustment: f64,
    pub double_header_fatigue: f64,
    pub wind_speed_impact: f64,
    pub temperature_impact: f64,
    pub dome_adjustment: f64,
    pub series_opener_adjustment: f64,
    pub series_finale_adjustment: f64,
}

impl Default for GameSituationParameters {
    fn default() -> Self {
        Self {
            day_game_adjustment: -0.05,
            night_game_adjustment: 0.0,
            double_header_fatigue: -0.10,
            wind_speed_impact: 0.02,
            temperature_impact: 0.005,
            dome_adjustment: 0.0,
            series_opener_adjustment: 0.02,
            series_finale_adjustment: -0.02,
        }
    }
}

/// Recommendation generation thresholds and sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BettingParameters {
    pub high_confidence_threshold: f64,
    pub medium_confidence_threshold: f64,
    pub minimum_edge_percentage: f64,
    pub strong_edge_percentage: f64,
    pub conservative_bet_percentage: f64,
    pub aggressive_bet_percentage: f64,
    pub max_bet_percentage: f64,
    pub target_roi_percentage: f64,
    pub minimum_roi_percentage: f64,
}

impl Default for BettingParameters {
    fn default() -> Self {
        Self {
            high_confidence_threshold: 0.65,
            medium_confidence_threshold: 0.55,
            minimum_edge_percentage: 5.0,
            strong_edge_percentage: 10.0,
            conservative_bet_percentage: 1.0,
            aggressive_bet_percentage: 3.0,
            max_bet_percentage: 5.0,
            target_roi_percentage: 8.0,
            minimum_roi_percentage: 3.0,
        }
    }
}

/// Fine-tuning knobs: uncertainty, regression to mean, outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedParameters {
    pub uncertainty_scaling: f64,
    pub model_ensemble_weights: Vec<f64>,
    pub regression_factor: f64,
    pub minimum_sample_size: u32,
    pub sample_size_scaling: f64,
    pub outlier_threshold_std: f64,
    pub outlier_dampening: f64,
}

impl Default for AdvancedParameters {
    fn default() -> Self {
        Self {
            uncertainty_scaling: 1.0,
            model_ensemble_weights: vec![0.4, 0.35, 0.25],
            regression_factor: 0.15,
            minimum_sample_size: 10,
            sample_size_scaling: 0.1,
            outlier_threshold_std: 2.5,
            outlier_dampening: 0.7,
        }
    }
}

/// The complete tunable configuration of the prediction engine.
/// Exclusively owned by [`ParameterStore`]; mutate only through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub pitcher: PitcherParameters,
    pub team: TeamParameters,
    pub game_situation: GameSituationParameters,
    pub betting: BettingParameters,
    pub advanced: AdvancedParameters,
    pub version: ParamVersion,
    pub last_updated: DateTime<Utc>,
    pub performance_grade: String,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            pitcher: PitcherParameters::default(),
            team: TeamParameters::default(),
            game_situation: GameSituationParameters::default(),
            betting: BettingParameters::default(),
            advanced: AdvancedParameters::default(),
            version: ParamVersion::initial(),
            last_updated: Utc::now(),
            performance_grade: "UNTESTED".to_string(),
        }
    }
}

/// One change to a parameter field: scale it or replace it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    Multiply(f64),
    Set(f64),
}

impl Adjustment {
    fn apply_to(&self, field: &mut f64) {
        match self {
            Adjustment::Multiply(factor) => *field *= factor,
            Adjustment::Set(value) => *field = *value,
        }
    }
}

/// Keyed adjustments; BTreeMap keeps application order deterministic.
pub type AdjustmentMap = BTreeMap<String, Adjustment>;

impl ParameterSet {
    /// Apply one keyed adjustment. Keys are either semantic actions fanning
    /// out to the field group the action tunes, or a dotted
    /// `group.field` path touching exactly one field. Unknown keys are an
    /// [`TunerError::InvalidConfiguration`].
    pub fn apply(&mut self, key: &str, adjustment: Adjustment) -> Result<()> {
        match key {
            "pitcher_impact_weight" => {
                adjustment.apply_to(&mut self.pitcher.era_weight);
                adjustment.apply_to(&mut self.pitcher.whip_weight);
                Ok(())
            }
            "score_variance_reduction" => {
                adjustment.apply_to(&mut self.team.recent_form_weight);
                adjustment.apply_to(&mut self.advanced.regression_factor);
                Ok(())
            }
            "team_strength_weight" => {
                adjustment.apply_to(&mut self.team.offensive_runs_weight);
                adjustment.apply_to(&mut self.team.defensive_runs_weight);
                Ok(())
            }
            "seasonal_adjustment" => {
                adjustment.apply_to(&mut self.pitcher.recent_form_weight);
                adjustment.apply_to(&mut self.team.recent_form_weight);
                Ok(())
            }
            "win_prob_calibration" | "confidence_threshold" => {
                adjustment.apply_to(&mut self.betting.high_confidence_threshold);
                adjustment.apply_to(&mut self.betting.medium_confidence_threshold);
                Ok(())
            }
            path => match path.split_once('.') {
                Some((group, field)) => {
                    let target = self.field_mut(group, field).ok_or_else(|| {
                        TunerError::InvalidConfiguration(format!(
                            "unknown parameter path: {}",
                            path
                        ))
                    })?;
                    adjustment.apply_to(target);
                    Ok(())
                }
                None => Err(TunerError::InvalidConfiguration(format!(
                    "unknown adjustment key: {}",
                    key
                ))),
            },
        }
    }

    fn field_mut(&mut self, group: &str, field: &str) -> Option<&mut f64> {
        match group {
            "pitcher" => {
                let p = &mut self.pitcher;
                match field {
                    "era_weight" => Some(&mut p.era_weight),
                    "whip_weight" => Some(&mut p.whip_weight),
                    "k9_weight" => Some(&mut p.k9_weight),
                    "home_away_adjustment" => Some(&mut p.home_away_adjustment),
                    "rest_days_factor" => Some(&mut p.rest_days_factor),
                    "recent_form_weight" => Some(&mut p.recent_form_weight),
                    "career_vs_team_weight" => Some(&mut p.career_vs_team_weight),
                    "ace_era_threshold" => Some(&mut p.ace_era_threshold),
                    "good_era_threshold" => Some(&mut p.good_era_threshold),
                    "average_era_threshold" => Some(&mut p.average_era_threshold),
                    "ace_run_impact" => Some(&mut p.ace_run_impact),
                    "good_run_impact" => Some(&mut p.good_run_impact),
                    "average_run_impact" => Some(&mut p.average_run_impact),
                    "poor_run_impact" => Some(&mut p.poor_run_impact),
                    _ => None,
                }
            }
            "team" => {
                let t = &mut self.team;
                match field {
                    "offensive_runs_weight" => Some(&mut t.offensive_runs_weight),
                    "defensive_runs_weight" => Some(&mut t.defensive_runs_weight),
                    "recent_form_weight" => Some(&mut t.recent_form_weight),
                    "home_field_advantage" => Some(&mut t.home_field_advantage),
                    "win_streak_bonus" => Some(&mut t.win_streak_bonus),
                    "loss_streak_penalty" => Some(&mut t.loss_streak_penalty),
                    "max_streak_impact" => Some(&mut t.max_streak_impact),
                    "h2h_weight" => Some(&mut t.h2h_weight),
                    "division_rival_adjustment" => Some(&mut t.division_rival_adjustment),
                    _ => None,
                }
            }
            "game_situation" => {
                let g = &mut self.game_situation;
                match field {
                    "day_game_adjustment" => Some(&mut g.day_game_adjustment),
                    "night_game_adjustment" => Some(&mut g.night_game_adjustment),
                    "double_header_fatigue" => Some(&mut g.double_header_fatigue),
                    "wind_speed_impact" => Some(&mut g.wind_speed_impact),
                    "temperature_impact" => Some(&mut g.temperature_impact),
                    "dome_adjustment" => Some(&mut g.dome_adjustment),
                    "series_opener_adjustment" => Some(&mut g.series_opener_adjustment),
                    "series_finale_adjustment" => Some(&mut g.series_finale_adjustment),
                    _ => None,
                }
            }
            "betting" => {
                let b = &mut self.betting;
                match field {
                    "high_confidence_threshold" => Some(&mut b.high_confidence_threshold),
                    "medium_confidence_threshold" => Some(&mut b.medium_confidence_threshold),
                    "minimum_edge_percentage" => Some(&mut b.minimum_edge_percentage),
                    "strong_edge_percentage" => Some(&mut b.strong_edge_percentage),
                    "conservative_bet_percentage" => Some(&mut b.conservative_bet_percentage),
                    "aggressive_bet_percentage" => Some(&mut b.aggressive_bet_percentage),
                    "max_bet_percentage" => Some(&mut b.max_bet_percentage),
                    "target_roi_percentage" => Some(&mut b.target_roi_percentage),
                    "minimum_roi_percentage" => Some(&mut b.minimum_roi_percentage),
                    _ => None,
                }
            }
            "advanced" => {
                let a = &mut self.advanced;
                match field {
                    "uncertainty_scaling" => Some(&mut a.uncertainty_scaling),
                    "regression_factor" => Some(&mut a.regression_factor),
                    "sample_size_scaling" => Some(&mut a.sample_size_scaling),
                    "outlier_threshold_std" => Some(&mut a.outlier_threshold_std),
                    "outlier_dampening" => Some(&mut a.outlier_dampening),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Key-parameter digest for dashboards and CLI output.
    pub fn summary(&self) -> ParameterSummary {
        ParameterSummary {
            version: self.version,
            last_updated: self.last_updated,
            performance_grade: self.performance_grade.clone(),
            pitcher_era_weight: self.pitcher.era_weight,
            team_offense_weight: self.team.offensive_runs_weight,
            home_field_advantage: self.team.home_field_advantage,
            high_confidence_threshold: self.betting.high_confidence_threshold,
            minimum_edge_percentage: self.betting.minimum_edge_percentage,
        }
    }
}

/// Digest of the parameters a human actually looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub version: ParamVersion,
    pub last_updated: DateTime<Utc>,
    pub performance_grade: String,
    pub pitcher_era_weight: f64,
    pub team_offense_weight: f64,
    pub home_field_advantage: f64,
    pub high_confidence_threshold: f64,
    pub minimum_edge_percentage: f64,
}

impl fmt::Display for ParameterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version:                {}", self.version)?;
        writeln!(f, "Last updated:           {}", self.last_updated.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Performance grade:      {}", self.performance_grade)?;
        writeln!(f, "Pitcher ERA weight:     {:.3}", self.pitcher_era_weight)?;
        writeln!(f, "Team offense weight:    {:.3}", self.team_offense_weight)?;
        writeln!(f, "Home field advantage:   {:.3}", self.home_field_advantage)?;
        writeln!(f, "High conf threshold:    {:.3}", self.high_confidence_threshold)?;
        write!(f, "Minimum edge:           {:.1}%", self.minimum_edge_percentage)
    }
}
