//! Agent that replays signals captured in a history file

use std::collections::HashMap;

use crate::domain::{AgentSignal, Prop, SignalDirection, NEUTRAL_SCORE};

use super::context::ScoringContext;
use super::traits::SignalAgent;

/// Agent that answers from previously recorded signals.
///
/// Props it has no recording for get a neutral signal.
pub struct RecordedAgent {
    name: String,
    recorded: HashMap<(String, String), (f64, SignalDirection)>,
}

impl RecordedAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recorded: HashMap::new(),
        }
    }

    pub fn record(&mut self, prop: &Prop, signal: &AgentSignal) {
        self.recorded
            .insert(key(prop), (signal.score, signal.direction));
    }
}

fn key(prop: &Prop) -> (String, String) {
    (prop.player.clone(), prop.stat_type.clone())
}

impl SignalAgent for RecordedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, prop: &Prop, _ctx: &ScoringContext) -> (f64, SignalDirection) {
        self.recorded
            .get(&key(prop))
            .copied()
            .unwrap_or((NEUTRAL_SCORE, SignalDirection::None))
    }
}
