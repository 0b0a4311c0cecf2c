use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive date range for a tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let mut current = self.start;
        let end = self.end;
        std::iter::from_fn(move || {
            if current > end {
                return None;
            }
            let d = current;
            current = current.succ_opt()?;
            Some(d)
        })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Confidence bucket attached to predictions and recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }

    /// Accuracy each bucket is supposed to deliver; calibration measures
    /// the distance between this and what actually happened.
    pub fn target_accuracy(&self) -> f64 {
        match self {
            Confidence::High => 0.80,
            Confidence::Medium => 0.60,
            Confidence::Low => 0.50,
        }
    }

    pub fn all() -> [Confidence; 3] {
        [Confidence::High, Confidence::Medium, Confidence::Low]
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HIGH" => Ok(Confidence::High),
            "MEDIUM" => Ok(Confidence::Medium),
            "LOW" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence level: {}", other)),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which club a moneyline pick backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetSide {
    Away,
    Home,
}

impl fmt::Display for BetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetSide::Away => write!(f, "away"),
            BetSide::Home => write!(f, "home"),
        }
    }
}

/// Direction of a totals pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalPick {
    Over,
    Under,
}

impl fmt::Display for TotalPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalPick::Over => write!(f, "over"),
            TotalPick::Under => write!(f, "under"),
        }
    }
}

/// The wager itself: a moneyline side or a totals pick with its line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BetKind {
    Moneyline { side: BetSide },
    Total { pick: TotalPick, line: f64 },
}

impl BetKind {
    /// Pure outcome grading against a realized result. Moneyline wins when
    /// the picked side outscored the other; totals require the actual total
    /// strictly beyond the line (a push grades as a loss).
    pub fn wins_against(&self, result: &ActualResult) -> bool {
        match self {
            BetKind::Moneyline { side } => *side == result.winner(),
            BetKind::Total { pick, line } => {
                let total = result.total() as f64;
                match pick {
                    TotalPick::Over => total > *line,
                    TotalPick::Under => total < *line,
                }
            }
        }
    }
}

/// One betting recommendation carried on a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: BetKind,
    pub confidence: Confidence,
}

impl Recommendation {
    pub fn moneyline(side: BetSide, confidence: Confidence) -> Self {
        Self {
            kind: BetKind::Moneyline { side },
            confidence,
        }
    }

    pub fn total(pick: TotalPick, line: f64, confidence: Confidence) -> Self {
        Self {
            kind: BetKind::Total { pick, line },
            confidence,
        }
    }
}

/// A prediction the upstream simulation engine produced for one game.
/// Read-only to the tuning core. Fields the engine does not always emit
/// are `Option`; missing-field handling is a checked branch downstream,
/// not a scattered default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub away_team: String,
    pub home_team: String,
    pub predicted_away_score: Option<f64>,
    pub predicted_home_score: Option<f64>,
    pub predicted_total: Option<f64>,
    pub home_win_probability: Option<f64>,
    pub away_pitcher: Option<String>,
    pub home_pitcher: Option<String>,
    pub confidence: Confidence,
    pub recommendations: Vec<Recommendation>,
    pub source: String,
}

impl PredictionRecord {
    /// Both per-club score predictions present.
    pub fn has_score_prediction(&self) -> bool {
        self.predicted_away_score.is_some() && self.predicted_home_score.is_some()
    }

    /// Binarized home-win call at the 0.5 threshold.
    pub fn predicts_home_win(&self) -> Option<bool> {
        self.home_win_probability.map(|p| p > 0.5)
    }

    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }
}

/// A realized outcome for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualResult {
    pub date: NaiveDate,
    pub away_team: String,
    pub home_team: String,
    pub away_score: u32,
    pub home_score: u32,
    pub is_final: bool,
    /// Disambiguates doubleheaders when the feed provides it.
    pub game_id: Option<String>,
}

impl ActualResult {
    pub fn total(&self) -> u32 {
        self.away_score + self.home_score
    }

    pub fn home_won(&self) -> bool {
        self.home_score > self.away_score
    }

    pub fn winner(&self) -> BetSide {
        if self.home_won() {
            BetSide::Home
        } else {
            BetSide::Away
        }
    }
}

/// A prediction joined to its realized outcome (when one was found).
/// Ephemeral: rebuilt from the sources on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedGame {
    pub prediction: PredictionRecord,
    pub result: Option<ActualResult>,
}

impl AlignedGame {
    pub fn new(prediction: PredictionRecord, result: Option<ActualResult>) -> Self {
        Self { prediction, result }
    }

    /// Only final, matched games participate in metric computation.
    pub fn final_result(&self) -> Option<&ActualResult> {
        self.result.as_ref().filter(|r| r.is_final)
    }

    pub fn is_complete(&self) -> bool {
        self.final_result().is_some()
    }
}
