//! Strategy module
//!
//! The scoring and feedback loop around agent weights.
//!
//! ## Architecture
//!
//! - `aggregator` - Combines agent signals into one confidence per prop
//! - `grader` - Settles picks against actual stats
//! - `performance` - Per-agent accuracy and calibration statistics
//! - `calibration` - Nudges weights toward calibrated, accurate agents
//! - `optimizer` - Seeded random search over weight configurations
//!
//! `actuals` holds the per-period stat cache shared by grading and the
//! optimizer; `search_space` bounds what the optimizer may try.

// =============================================================================
// Scoring
// =============================================================================

pub mod aggregator;

pub use aggregator::{AggregationMode, AggregatorConfig, ConfidenceAggregator};

// =============================================================================
// Grading
// =============================================================================

pub mod actuals;
pub mod grader;
pub mod performance;

pub use actuals::{ActualsCache, ActualsSource, PeriodActuals, PlayerStats};
pub use grader::{map_stat_type, GradeSummary, Grader, StatKey, StatKeyResolver};
pub use performance::{
    analyze_agent_performance, calibration_report, CalibrationBucket, CalibrationReport,
};

// =============================================================================
// Weight tuning
// =============================================================================

pub mod calibration;
pub mod optimizer;
pub mod search_space;

pub use calibration::{CalibrationConfig, WeightCalibrator, WeightProposal};
pub use optimizer::{
    improvement_over_baseline, promote, EvaluationOutcome, OptimizationResult, OptimizerConfig,
    WeightOptimizer,
};
pub use search_space::{SearchSpace, WeightRange};
