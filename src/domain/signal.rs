use serde::{Deserialize, Serialize};

use super::prop::{BetDirection, Prop};

/// Score an agent reports when it has no opinion
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Direction an agent leans, NONE meaning no directional evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Over,
    Under,
    None,
}

impl SignalDirection {
    /// Map to a bet direction, `None` for a neutral signal
    pub fn as_bet(&self) -> Option<BetDirection> {
        match self {
            SignalDirection::Over => Some(BetDirection::Over),
            SignalDirection::Under => Some(BetDirection::Under),
            SignalDirection::None => None,
        }
    }
}

impl From<BetDirection> for SignalDirection {
    fn from(direction: BetDirection) -> Self {
        match direction {
            BetDirection::Over => SignalDirection::Over,
            BetDirection::Under => SignalDirection::Under,
        }
    }
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalDirection::Over => write!(f, "OVER"),
            SignalDirection::Under => write!(f, "UNDER"),
            SignalDirection::None => write!(f, "NONE"),
        }
    }
}

/// One agent's opinion on one prop. Produced fresh per analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSignal {
    pub agent: String,
    /// Raw score in [0, 100], 50 = no opinion
    pub score: f64,
    pub direction: SignalDirection,
}

impl AgentSignal {
    pub fn new(agent: impl Into<String>, score: f64, direction: SignalDirection) -> Self {
        Self {
            agent: agent.into(),
            score,
            direction,
        }
    }

    /// Signal used when an agent has no data for a prop
    pub fn neutral(agent: impl Into<String>) -> Self {
        Self::new(agent, NEUTRAL_SCORE, SignalDirection::None)
    }

    /// Neutral signals carry no directional evidence
    pub fn is_neutral(&self) -> bool {
        self.direction == SignalDirection::None || self.score == NEUTRAL_SCORE
    }

    /// Alignment of this signal with a bet direction
    pub fn alignment_with(&self, bet: BetDirection) -> Alignment {
        if self.is_neutral() {
            return Alignment::Neutral;
        }
        match self.direction.as_bet() {
            Some(dir) if dir == bet => Alignment::Aligned,
            Some(_) => Alignment::Opposed,
            None => Alignment::Neutral,
        }
    }
}

/// Whether an agent agreed with the final pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Aligned,
    Opposed,
    Neutral,
}

impl std::fmt::Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alignment::Aligned => write!(f, "aligned"),
            Alignment::Opposed => write!(f, "opposed"),
            Alignment::Neutral => write!(f, "neutral"),
        }
    }
}

/// Per-agent breakdown entry of a PropAnalysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContribution {
    pub agent: String,
    pub weight: f64,
    pub raw_score: f64,
    pub direction: SignalDirection,
    pub alignment: Alignment,
    /// Signed points this agent added to the 50 baseline
    pub contribution: f64,
}

impl AgentContribution {
    pub fn is_aligned(&self) -> bool {
        self.alignment == Alignment::Aligned
    }

    pub fn is_neutral(&self) -> bool {
        self.alignment == Alignment::Neutral
    }
}

/// Result of aggregating every agent signal for one prop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropAnalysis {
    pub prop: Prop,
    pub signals: Vec<AgentSignal>,
    /// Final confidence, clamped to [0, 100]
    pub confidence: f64,
    /// Weighted confidence before the agreement adjustment
    pub raw_confidence: f64,
    pub agreement_adjustment: f64,
    /// Fraction of active agents aligned with the bet, `None` when no agent was active
    pub agreement_ratio: Option<f64>,
    pub active_agents: usize,
    /// Set when every agent was neutral
    pub low_confidence: bool,
    pub contributions: Vec<AgentContribution>,
}

impl PropAnalysis {
    pub fn meets(&self, min_confidence: f64) -> bool {
        self.confidence >= min_confidence
    }

    pub fn contribution(&self, agent: &str) -> Option<&AgentContribution> {
        self.contributions.iter().find(|c| c.agent == agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_detection() {
        assert!(AgentSignal::neutral("Injury").is_neutral());
        assert!(AgentSignal::new("DVOA", 50.0, SignalDirection::Over).is_neutral());
        assert!(AgentSignal::new("DVOA", 80.0, SignalDirection::None).is_neutral());
        assert!(!AgentSignal::new("DVOA", 50.5, SignalDirection::Under).is_neutral());
    }

    #[test]
    fn alignment_against_bet() {
        let over = AgentSignal::new("DVOA", 70.0, SignalDirection::Over);
        assert_eq!(over.alignment_with(BetDirection::Over), Alignment::Aligned);
        assert_eq!(over.alignment_with(BetDirection::Under), Alignment::Opposed);
        assert_eq!(
            AgentSignal::new("Trend", 50.0, SignalDirection::Over).alignment_with(BetDirection::Over),
            Alignment::Neutral
        );
    }
}
