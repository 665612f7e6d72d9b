use serde::{Deserialize, Serialize};

use super::prop::BetDirection;
use super::signal::{AgentContribution, PropAnalysis};

/// A pick submitted for grading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub player: String,
    pub stat_type: String,
    pub line: f64,
    pub direction: BetDirection,
    pub confidence: f64,
    #[serde(default)]
    pub contributions: Vec<AgentContribution>,
}

impl From<&PropAnalysis> for PredictionInput {
    fn from(analysis: &PropAnalysis) -> Self {
        Self {
            player: analysis.prop.player.clone(),
            stat_type: analysis.prop.stat_type.clone(),
            line: analysis.prop.line,
            direction: analysis.prop.direction,
            confidence: analysis.confidence,
            contributions: analysis.contributions.clone(),
        }
    }
}

/// Graded outcome of a pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GradeResult {
    Win,
    Loss,
    Void,
    Unknown,
}

impl GradeResult {
    /// Wins and losses count towards win rate, everything else does not
    pub fn is_decided(&self) -> bool {
        matches!(self, GradeResult::Win | GradeResult::Loss)
    }
}

impl std::fmt::Display for GradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GradeResult::Win => write!(f, "WIN"),
            GradeResult::Loss => write!(f, "LOSS"),
            GradeResult::Void => write!(f, "VOID"),
            GradeResult::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Why a pick graded VOID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoidReason {
    /// No actual-stats record for the player (likely inactive)
    PlayerMissing,
    /// Stat label could not be mapped to an internal key
    UnmappableStatType,
    /// Actual value landed exactly on the line
    Push,
}

/// A pick plus its graded outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedPrediction {
    pub prediction: PredictionInput,
    pub result: GradeResult,
    pub actual: Option<f64>,
    pub void_reason: Option<VoidReason>,
}

impl GradedPrediction {
    pub fn is_win(&self) -> bool {
        self.result == GradeResult::Win
    }
}
