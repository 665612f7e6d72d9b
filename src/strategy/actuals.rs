//! Actual-stats supply and caching
//!
//! Historical box scores are loaded once per period through an
//! `ActualsSource` and kept in an `ActualsCache` that the grader and the
//! optimizer read from. Loading is front-loaded with `preload` so the
//! optimizer's hot loop never touches the source.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{PropcalError, Result};

/// Stat key -> observed value for one player
pub type PlayerStats = HashMap<String, f64>;

/// Player -> stats for one period
pub type PeriodActuals = HashMap<String, PlayerStats>;

/// Supplier of actual stats per historical period
#[cfg_attr(test, mockall::automock)]
pub trait ActualsSource {
    fn load_actuals(&self, period: &str) -> Result<PeriodActuals>;
}

/// Explicit per-period cache of actual stats
#[derive(Debug, Default, Clone)]
pub struct ActualsCache {
    periods: HashMap<String, PeriodActuals>,
}

impl ActualsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every period not already cached
    pub fn preload<S>(&mut self, source: &S, periods: &[String]) -> Result<()>
    where
        S: ActualsSource + ?Sized,
    {
        let mut loaded = 0usize;
        for period in periods {
            if self.periods.contains_key(period) {
                continue;
            }
            let actuals = source.load_actuals(period)?;
            debug!(period = %period, players = actuals.len(), "loaded actuals");
            self.periods.insert(period.clone(), actuals);
            loaded += 1;
        }
        info!(
            requested = periods.len(),
            loaded,
            cached = self.periods.len(),
            "preloaded actuals"
        );
        Ok(())
    }

    /// Insert actuals directly, replacing any cached copy
    pub fn insert(&mut self, period: impl Into<String>, actuals: PeriodActuals) {
        self.periods.insert(period.into(), actuals);
    }

    pub fn get(&self, period: &str) -> Option<&PeriodActuals> {
        self.periods.get(period)
    }

    /// Like `get`, but a missing period is an error
    pub fn require(&self, period: &str) -> Result<&PeriodActuals> {
        self.get(period)
            .ok_or_else(|| PropcalError::PeriodNotLoaded(period.to_string()))
    }

    pub fn contains(&self, period: &str) -> bool {
        self.periods.contains_key(period)
    }

    /// Drop one period so the next preload reloads it
    pub fn invalidate(&mut self, period: &str) -> bool {
        self.periods.remove(period).is_some()
    }

    pub fn clear(&mut self) {
        self.periods.clear();
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}
