pub mod model;

pub use model::{FeatureSignals, ModelOptimizer, MIN_TRAINING_GAMES};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::params::{Adjustment, AdjustmentMap};
use crate::types::TuningMetrics;

/// How urgently a recommendation should be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// A metric condition that can trigger a tuning rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricCondition {
    ScoreMaeAbove(f64),
    TotalMaeAbove(f64),
    WinAccuracyBelow(f64),
    BettingRoiBelow(f64),
}

impl MetricCondition {
    pub fn triggered(&self, metrics: &TuningMetrics) -> bool {
        match self {
            MetricCondition::ScoreMaeAbove(t) => metrics.score_mae > *t,
            MetricCondition::TotalMaeAbove(t) => metrics.total_mae > *t,
            MetricCondition::WinAccuracyBelow(t) => metrics.win_probability_accuracy < *t,
            MetricCondition::BettingRoiBelow(t) => metrics.betting_roi < *t,
        }
    }
}

/// One row of the tuning policy: condition, what to adjust, by how much.
#[derive(Debug, Clone)]
pub struct TuningRule {
    pub condition: MetricCondition,
    pub priority: Priority,
    pub category: &'static str,
    pub description: &'static str,
    pub adjustment_key: &'static str,
    pub multiplier: f64,
}

/// The thresholds and multipliers that used to live scattered through
/// conditionals, collected into one declarative, independently testable
/// table.
pub fn default_policy() -> Vec<TuningRule> {
    vec![
        TuningRule {
            condition: MetricCondition::ScoreMaeAbove(1.5),
            priority: Priority::High,
            category: "score_accuracy",
            description: "Score predictions have high error; dampen score variance",
            adjustment_key: "score_variance_reduction",
            multiplier: 0.8,
        },
        TuningRule {
            condition: MetricCondition::TotalMaeAbove(1.2),
            priority: Priority::High,
            category: "total_runs",
            description: "Total runs predictions need improvement; raise pitcher impact",
            adjustment_key: "pitcher_impact_weight",
            multiplier: 1.3,
        },
        TuningRule {
            condition: MetricCondition::WinAccuracyBelow(0.58),
            priority: Priority::High,
            category: "win_probability",
            description: "Win probability accuracy is low; recalibrate probability model",
            adjustment_key: "win_prob_calibration",
            multiplier: 1.15,
        },
        TuningRule {
            condition: MetricCondition::BettingRoiBelow(3.0),
            priority: Priority::Medium,
            category: "betting_roi",
            description: "Betting ROI below target; increase selectivity",
            adjustment_key: "confidence_threshold",
            multiplier: 1.1,
        },
    ]
}

/// A triggered rule, ready for reporting and application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningRecommendation {
    pub priority: Priority,
    pub category: String,
    pub description: String,
    pub adjustment_key: String,
    pub multiplier: f64,
}

/// Derives parameter adjustments from observed metrics.
pub struct Optimizer {
    policy: Vec<TuningRule>,
}

impl Optimizer {
    pub fn new() -> Self {
        Self {
            policy: default_policy(),
        }
    }

    pub fn with_policy(policy: Vec<TuningRule>) -> Self {
        Self { policy }
    }

    /// Evaluate the policy table against the metrics.
    pub fn recommend(&self, metrics: &TuningMetrics) -> Vec<TuningRecommendation> {
        let recommendations: Vec<TuningRecommendation> = self
            .policy
            .iter()
            .filter(|rule| rule.condition.triggered(metrics))
            .map(|rule| TuningRecommendation {
                priority: rule.priority,
                category: rule.category.to_string(),
                description: rule.description.to_string(),
                adjustment_key: rule.adjustment_key.to_string(),
                multiplier: rule.multiplier,
            })
            .collect();

        info!(
            "policy evaluation produced {} recommendation(s)",
            recommendations.len()
        );
        recommendations
    }

    /// Convert recommendations into an adjustment map, with multipliers
    /// capped to `1 ± max_adjustment` per the optimization level.
    pub fn to_adjustments(
        recommendations: &[TuningRecommendation],
        max_adjustment: f64,
    ) -> AdjustmentMap {
        let mut map = AdjustmentMap::new();
        for rec in recommendations {
            let capped = rec
                .multiplier
                .clamp(1.0 - max_adjustment, 1.0 + max_adjustment);
            if (capped - rec.multiplier).abs() > f64::EPSILON {
                debug!(
                    "capping {} multiplier {:.2} -> {:.2}",
                    rec.adjustment_key, rec.multiplier, capped
                );
            }
            map.insert(rec.adjustment_key.clone(), Adjustment::Multiply(capped));
        }
        map
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
