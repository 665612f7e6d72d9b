//! Historical data directory
//!
//! Recorded signals and settled stats, one directory per period:
//!
//! ```text
//! <root>/
//!   2024-W01/
//!     signals.json   # HistoricalPeriod, or a bare array of entries
//!     actuals.json   # { "<player>": { "<stat_key>": value } }
//!   2024-W02/
//!     ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{HistoricalEntry, HistoricalPeriod};
use crate::error::{PropcalError, Result};
use crate::strategy::{ActualsSource, PeriodActuals};

pub const SIGNALS_FILE: &str = "signals.json";
pub const ACTUALS_FILE: &str = "actuals.json";

/// `signals.json` may hold the full period or just its entries
#[derive(Deserialize)]
#[serde(untagged)]
enum SignalsFile {
    Period(HistoricalPeriod),
    Entries(Vec<HistoricalEntry>),
}

/// JSON history rooted at a directory
#[derive(Debug, Clone)]
pub struct JsonHistory {
    root: PathBuf,
}

impl JsonHistory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn period_dir(&self, period: &str) -> PathBuf {
        self.root.join(period)
    }

    /// Period ids with a signals file, sorted
    pub fn list_periods(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(PropcalError::HistoryNotFound(
                self.root.display().to_string(),
            ));
        }

        let mut periods = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || !entry.path().join(SIGNALS_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                periods.push(name.to_string());
            }
        }
        periods.sort();
        Ok(periods)
    }

    /// Recorded props and signals for one period. The directory name wins
    /// over any id stored in the file.
    pub fn load_period(&self, period: &str) -> Result<HistoricalPeriod> {
        let path = self.period_dir(period).join(SIGNALS_FILE);
        let entries = match read_json::<SignalsFile>(&path)? {
            SignalsFile::Period(p) => p.entries,
            SignalsFile::Entries(entries) => entries,
        };
        debug!(period, entries = entries.len(), "loaded historical period");
        Ok(HistoricalPeriod::new(period, entries))
    }

    /// Load several periods in the order given
    pub fn load_window(&self, periods: &[String]) -> Result<Vec<HistoricalPeriod>> {
        let window = periods
            .iter()
            .map(|p| self.load_period(p))
            .collect::<Result<Vec<_>>>()?;
        info!(
            periods = window.len(),
            entries = window.iter().map(|p| p.entries.len()).sum::<usize>(),
            "loaded history window"
        );
        Ok(window)
    }

    /// Write a period's signals, creating its directory
    pub fn save_period(&self, period: &HistoricalPeriod) -> Result<()> {
        let dir = self.period_dir(&period.id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(SIGNALS_FILE), serde_json::to_string_pretty(period)?)?;
        Ok(())
    }

    /// Write a period's settled stats, creating its directory
    pub fn save_actuals(&self, period: &str, actuals: &PeriodActuals) -> Result<()> {
        let dir = self.period_dir(period);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(ACTUALS_FILE), serde_json::to_string_pretty(actuals)?)?;
        Ok(())
    }
}

impl ActualsSource for JsonHistory {
    fn load_actuals(&self, period: &str) -> Result<PeriodActuals> {
        read_json(&self.period_dir(period).join(ACTUALS_FILE))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(PropcalError::HistoryNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
