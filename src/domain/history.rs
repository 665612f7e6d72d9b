use serde::{Deserialize, Serialize};

use super::prop::Prop;
use super::signal::AgentSignal;

/// A prop with the agent signals recorded for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEntry {
    pub prop: Prop,
    #[serde(default)]
    pub signals: Vec<AgentSignal>,
}

/// All recorded props for one week or period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPeriod {
    pub id: String,
    #[serde(default)]
    pub entries: Vec<HistoricalEntry>,
}

impl HistoricalPeriod {
    pub fn new(id: impl Into<String>, entries: Vec<HistoricalEntry>) -> Self {
        Self {
            id: id.into(),
            entries,
        }
    }
}
