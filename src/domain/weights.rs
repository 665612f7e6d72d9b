use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weight applied to agents missing from the seed set
pub const NEUTRAL_WEIGHT: f64 = 1.0;

/// Agent name -> weight multiplier
pub type WeightMap = BTreeMap<String, f64>;

/// Seed weights for the known agents.
///
/// Injury news and defensive matchup data have historically been the most
/// reliable signals, environmental signals the least.
pub fn default_weights() -> WeightMap {
    [
        ("DVOA", 2.0),
        ("Injury", 3.0),
        ("Matchup", 1.5),
        ("Volume", 1.5),
        ("GameScript", 1.2),
        ("Trend", 1.0),
        ("Weather", 0.8),
        ("HomeAway", 0.5),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

/// Weight for `agent`, falling back to the neutral weight
pub fn weight_for(weights: &WeightMap, agent: &str) -> f64 {
    weights.get(agent).copied().unwrap_or(NEUTRAL_WEIGHT)
}

/// Per-agent statistics over a window of graded predictions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformanceStats {
    /// Predictions where the agent's direction matched the pick
    pub aligned: u32,
    pub wins: u32,
    pub losses: u32,
    /// wins / aligned
    pub accuracy: f64,
    /// Average raw score when aligned, on a 0-1 scale
    pub avg_confidence: f64,
    /// avg_confidence - accuracy
    pub overconfidence: f64,
    pub disagreed: u32,
    /// Fraction of disagreements where the pick lost
    pub contrarian_value: f64,
}

impl AgentPerformanceStats {
    pub fn sample_size(&self) -> u32 {
        self.aligned
    }
}

/// Audit entry written for every weight decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightAdjustmentRecord {
    pub run_id: Uuid,
    pub agent: String,
    /// Week or period identifier
    pub period: String,
    pub old_weight: f64,
    pub new_weight: f64,
    pub reason: String,
    #[serde(default)]
    pub stats: Option<AgentPerformanceStats>,
    pub recorded_at: DateTime<Utc>,
}

impl WeightAdjustmentRecord {
    pub fn new(
        run_id: Uuid,
        agent: impl Into<String>,
        period: impl Into<String>,
        old_weight: f64,
        new_weight: f64,
        reason: impl Into<String>,
        stats: Option<AgentPerformanceStats>,
    ) -> Self {
        Self {
            run_id,
            agent: agent.into(),
            period: period.into(),
            old_weight,
            new_weight,
            reason: reason.into(),
            stats,
            recorded_at: Utc::now(),
        }
    }

    pub fn delta(&self) -> f64 {
        self.new_weight - self.old_weight
    }

    pub fn is_change(&self) -> bool {
        (self.new_weight - self.old_weight).abs() > f64::EPSILON
    }
}
