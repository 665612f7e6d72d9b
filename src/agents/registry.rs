//! Explicit, ordered agent registry

use tracing::{debug, warn};

use crate::domain::{AgentSignal, Prop, SignalDirection, NEUTRAL_SCORE};
use crate::error::{PropcalError, Result};

use super::context::ScoringContext;
use super::traits::SignalAgent;

/// Agents in registration order. Names are unique.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Box<dyn SignalAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Duplicate names are rejected.
    pub fn register(&mut self, agent: Box<dyn SignalAgent>) -> Result<()> {
        if self.agents.iter().any(|a| a.name() == agent.name()) {
            return Err(PropcalError::DuplicateAgent(agent.name().to_string()));
        }
        debug!(agent = agent.name(), "registered agent");
        self.agents.push(agent);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Collect one sanitised signal per agent, in registration order
    pub fn collect_signals(&self, prop: &Prop, ctx: &ScoringContext) -> Vec<AgentSignal> {
        self.agents
            .iter()
            .map(|agent| sanitize(agent.signal(prop, ctx)))
            .collect()
    }
}

/// NaN scores become neutral; everything else is clamped to [0, 100].
fn sanitize(mut signal: AgentSignal) -> AgentSignal {
    if !signal.score.is_finite() {
        warn!(agent = %signal.agent, "non-finite score, treating as neutral");
        signal.score = NEUTRAL_SCORE;
        signal.direction = SignalDirection::None;
    }
    signal.score = signal.score.clamp(0.0, 100.0);
    signal
}
