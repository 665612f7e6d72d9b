//! Scoring context handed to every agent

use serde::{Deserialize, Serialize};

/// Context shared by all agents for one analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    /// Week or period being analysed
    pub period: String,
}

impl ScoringContext {
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: period.into(),
        }
    }
}
