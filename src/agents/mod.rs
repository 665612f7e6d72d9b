//! Signal agents
//!
//! Independent heuristics that each score a prop. Agents implement
//! `SignalAgent` and are called in registration order through an
//! `AgentRegistry`.

pub mod context;
pub mod recorded;
pub mod registry;
pub mod traits;

pub use context::ScoringContext;
pub use recorded::RecordedAgent;
pub use registry::AgentRegistry;
pub use traits::SignalAgent;
