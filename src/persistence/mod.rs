//! Persistence Layer for agent weights
//!
//! Current weights live in a keyed snapshot; every change is first appended
//! to an adjustment log so history can be replayed after a crash.

pub mod weight_store;

pub use weight_store::{FileWeightStore, MemoryWeightStore, WeightStore};
