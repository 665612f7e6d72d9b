pub mod agents;
pub mod cli;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod strategy;

pub use agents::{AgentRegistry, RecordedAgent, ScoringContext, SignalAgent};
pub use collector::JsonHistory;
pub use config::AppConfig;
pub use domain::{
    AgentPerformanceStats, AgentSignal, BetDirection, GradeResult, GradedPrediction,
    HistoricalEntry, HistoricalPeriod, PredictionInput, Prop, PropAnalysis, SignalDirection,
    WeightAdjustmentRecord, WeightMap,
};
pub use error::{PropcalError, Result};
pub use persistence::{FileWeightStore, MemoryWeightStore, WeightStore};
pub use strategy::{
    analyze_agent_performance, ActualsCache, ActualsSource, ConfidenceAggregator, Grader,
    OptimizationResult, SearchSpace, WeightCalibrator, WeightOptimizer,
};
