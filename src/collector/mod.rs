//! Historical data collection
//!
//! Loads recorded signals and settled stats for replay by the grader,
//! the calibrator and the optimizer.

pub mod history;

pub use history::{JsonHistory, ACTUALS_FILE, SIGNALS_FILE};
