use serde::{Deserialize, Serialize};

/// Accuracy and profitability metrics over one set of aligned games.
/// Immutable once computed; the placeholder for an empty sample is
/// [`TuningMetrics::empty`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningMetrics {
    /// Mean absolute error over the flattened away+home score list, in runs.
    pub score_mae: f64,
    /// Root mean square error over the same list, in runs.
    pub score_rmse: f64,
    /// Mean absolute error of predicted vs actual total runs.
    pub total_mae: f64,
    /// Share of games where the binarized home-win call matched reality.
    pub win_probability_accuracy: f64,
    /// ROI% of HIGH-confidence recommendations at a flat 100-unit stake.
    pub betting_roi: f64,
    /// Mean closeness of per-bucket accuracy to the bucket targets.
    pub confidence_calibration: f64,
}

impl TuningMetrics {
    /// Null metrics used when a sample is empty (e.g. an empty CV fold).
    pub fn empty() -> Self {
        Self {
            score_mae: 0.0,
            score_rmse: 0.0,
            total_mae: 0.0,
            win_probability_accuracy: 0.0,
            betting_roi: 0.0,
            confidence_calibration: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}

impl std::fmt::Display for TuningMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MAE {:.2} / RMSE {:.2} / total MAE {:.2} / win acc {:.3} / ROI {:.2}% / calibration {:.3}",
            self.score_mae,
            self.score_rmse,
            self.total_mae,
            self.win_probability_accuracy,
            self.betting_roi,
            self.confidence_calibration,
        )
    }
}
