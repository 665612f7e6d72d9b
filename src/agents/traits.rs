//! SignalAgent trait
//!
//! An agent is a pure function of a prop and the scoring context. It never
//! fails: an agent without data for a prop returns a neutral signal.

use crate::domain::{AgentSignal, Prop, SignalDirection};

use super::context::ScoringContext;

/// Independent heuristic that scores a prop on a 0-100 scale.
pub trait SignalAgent: Send + Sync {
    /// Unique agent name, used as the weight key
    fn name(&self) -> &str;

    /// Score `prop`. Returns (score, direction); (50, NONE) means no opinion.
    fn score(&self, prop: &Prop, ctx: &ScoringContext) -> (f64, SignalDirection);

    /// Score and wrap into an `AgentSignal`
    fn signal(&self, prop: &Prop, ctx: &ScoringContext) -> AgentSignal {
        let (score, direction) = self.score(prop, ctx);
        AgentSignal::new(self.name(), score, direction)
    }
}
