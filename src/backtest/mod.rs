pub mod results;

pub use results::BacktestResult;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{Result, TunerError};
use crate::types::{AlignedGame, Confidence};

/// Flat stake per bet in units, used for the ROI denominator.
pub const BASE_STAKE: Decimal = dec!(100);

/// Which recommendations a simulated bettor takes and how much rides on
/// each. Stakes assume American odds of -110 throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyProfile {
    Conservative,
    Moderate,
    Aggressive,
}

impl StrategyProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyProfile::Conservative => "conservative",
            StrategyProfile::Moderate => "moderate",
            StrategyProfile::Aggressive => "aggressive",
        }
    }

    pub fn all() -> [StrategyProfile; 3] {
        [
            StrategyProfile::Conservative,
            StrategyProfile::Moderate,
            StrategyProfile::Aggressive,
        ]
    }

    /// Whether this profile takes bets at the given confidence.
    pub fn admits(&self, confidence: Confidence) -> bool {
        match self {
            StrategyProfile::Conservative => confidence == Confidence::High,
            StrategyProfile::Moderate => {
                matches!(confidence, Confidence::High | Confidence::Medium)
            }
            StrategyProfile::Aggressive => true,
        }
    }

    /// Units staked per bet at each confidence level.
    pub fn stake(&self, confidence: Confidence) -> Decimal {
        match (self, confidence) {
            (StrategyProfile::Conservative, Confidence::High) => dec!(100),
            (StrategyProfile::Conservative, Confidence::Medium) => dec!(50),
            (StrategyProfile::Conservative, Confidence::Low) => dec!(25),
            (StrategyProfile::Moderate, Confidence::High) => dec!(150),
            (StrategyProfile::Moderate, Confidence::Medium) => dec!(75),
            (StrategyProfile::Moderate, Confidence::Low) => dec!(40),
            (StrategyProfile::Aggressive, Confidence::High) => dec!(200),
            (StrategyProfile::Aggressive, Confidence::Medium) => dec!(100),
            (StrategyProfile::Aggressive, Confidence::Low) => dec!(50),
        }
    }
}

impl fmt::Display for StrategyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StrategyProfile {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(StrategyProfile::Conservative),
            "moderate" => Ok(StrategyProfile::Moderate),
            "aggressive" => Ok(StrategyProfile::Aggressive),
            other => Err(TunerError::InvalidConfiguration(format!(
                "unknown strategy profile: {}",
                other
            ))),
        }
    }
}

/// Replays historical recommendations against realized outcomes under a
/// strategy profile and reports the resulting ledger.
pub struct BacktestEngine;

impl BacktestEngine {
    pub fn run(strategy: StrategyProfile, games: &[AlignedGame]) -> BacktestResult {
        let mut result = BacktestResult::new(strategy.as_str());
        let win_multiplier = dec!(100) / dec!(110);

        for game in games {
            let outcome = match game.final_result() {
                Some(r) => r,
                None => continue,
            };
            for rec in &game.prediction.recommendations {
                if !strategy.admits(rec.confidence) {
                    continue;
                }
                let stake = strategy.stake(rec.confidence);
                let won = rec.kind.wins_against(outcome);
                let profit = if won {
                    stake * win_multiplier
                } else {
                    -stake
                };
                debug!(
                    "{}: {} {:?} staked {} -> {}",
                    strategy,
                    game.prediction.matchup(),
                    rec.kind,
                    stake,
                    profit
                );
                result.record(won, profit);
            }
        }

        result.finalize();
        info!(
            "backtest {} complete: {} bets, {:.2} profit, {:.2}% roi",
            strategy, result.total_bets, result.total_profit, result.roi_percentage
        );
        result
    }
}
