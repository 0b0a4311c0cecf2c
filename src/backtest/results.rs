use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::BASE_STAKE;

/// Ledger summary for one simulated strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub total_bets: u32,
    pub winning_bets: u32,
    pub losing_bets: u32,
    pub total_profit: Decimal,
    /// Profit over total staked at the flat base stake, in percent.
    pub roi_percentage: f64,
    pub win_rate: f64,
    /// Gross wins over gross losses; zero when the ledger has no losses.
    pub profit_factor: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    #[serde(skip)]
    gross_wins: Decimal,
    #[serde(skip)]
    gross_losses: Decimal,
}

impl BacktestResult {
    pub fn new(strategy_name: &str) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            total_bets: 0,
            winning_bets: 0,
            losing_bets: 0,
            total_profit: Decimal::ZERO,
            roi_percentage: 0.0,
            win_rate: 0.0,
            profit_factor: Decimal::ZERO,
            largest_win: Decimal::ZERO,
            largest_loss: Decimal::ZERO,
            gross_wins: Decimal::ZERO,
            gross_losses: Decimal::ZERO,
        }
    }

    /// Append one graded bet to the ledger.
    pub fn record(&mut self, won: bool, profit: Decimal) {
        self.total_bets += 1;
        self.total_profit += profit;
        if won {
            self.winning_bets += 1;
            self.gross_wins += profit;
            if profit > self.largest_win {
                self.largest_win = profit;
            }
        } else {
            self.losing_bets += 1;
            self.gross_losses += -profit;
            if profit < self.largest_loss {
                self.largest_loss = profit;
            }
        }
    }

    /// Compute the derived ratios once all bets are recorded.
    pub fn finalize(&mut self) {
        if self.total_bets == 0 {
            return;
        }
        self.win_rate = self.winning_bets as f64 / self.total_bets as f64;
        let staked = Decimal::from(self.total_bets) * BASE_STAKE;
        self.roi_percentage = (self.total_profit / staked * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0);
        if self.gross_losses > Decimal::ZERO {
            self.profit_factor = self.gross_wins / self.gross_losses;
        }
    }
}

impl fmt::Display for BacktestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} bets ({}W/{}L), profit {:.2}, roi {:.2}%, win rate {:.1}%",
            self.strategy_name,
            self.total_bets,
            self.winning_bets,
            self.losing_bets,
            self.total_profit,
            self.roi_percentage,
            self.win_rate * 100.0
        )
    }
}
