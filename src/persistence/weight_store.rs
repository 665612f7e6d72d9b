//! Weight Store
//!
//! Durable keyed storage of the current per-agent weights plus an
//! append-only adjustment log. Every write appends its audit record before
//! the current-weight snapshot is replaced. The snapshot remembers how many
//! log records it reflects, and any records past that point are replayed on
//! open, so the log stays authoritative.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{default_weights, weight_for, WeightAdjustmentRecord, WeightMap};
use crate::error::{PropcalError, Result};

pub const REASON_RESET: &str = "reset to defaults";

const SNAPSHOT_FILE: &str = "weights.json";
const LOG_FILE: &str = "adjustments.jsonl";

/// Storage for agent weights and their audit trail
pub trait WeightStore: Send + Sync {
    /// Latest committed weights
    fn get_weights(&self) -> Result<WeightMap>;

    /// Record `record` and set `agent` to `new_weight`, atomically per agent
    fn set_weight(&self, agent: &str, new_weight: f64, record: &WeightAdjustmentRecord)
        -> Result<()>;

    /// Audit records in write order, optionally for one agent
    fn history(&self, agent: Option<&str>) -> Result<Vec<WeightAdjustmentRecord>>;

    /// Current weight, or the neutral weight for an agent never seen
    fn get_weight(&self, agent: &str) -> Result<f64> {
        Ok(weight_for(&self.get_weights()?, agent))
    }

    /// Write `defaults` back for every agent, with an audit record each
    fn reset_to_defaults(
        &self,
        defaults: &WeightMap,
        period: &str,
    ) -> Result<Vec<WeightAdjustmentRecord>> {
        let current = self.get_weights()?;
        let run_id = Uuid::new_v4();
        let mut records = Vec::with_capacity(defaults.len());
        for (agent, weight) in defaults {
            let record = WeightAdjustmentRecord::new(
                run_id,
                agent.clone(),
                period,
                weight_for(&current, agent),
                *weight,
                REASON_RESET,
                None,
            );
            self.set_weight(agent, *weight, &record)?;
            records.push(record);
        }
        info!(agents = records.len(), "weights reset to defaults");
        Ok(records)
    }
}

fn validate_write(agent: &str, new_weight: f64, record: &WeightAdjustmentRecord) -> Result<()> {
    if !new_weight.is_finite() || new_weight <= 0.0 {
        return Err(PropcalError::InvalidWeight {
            agent: agent.to_string(),
            value: new_weight,
        });
    }
    if record.agent != agent {
        return Err(PropcalError::Validation(format!(
            "adjustment record for {} written against {}",
            record.agent, agent
        )));
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| PropcalError::Store("weight store lock poisoned".to_string()))
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    weights: WeightMap,
    log: Vec<WeightAdjustmentRecord>,
}

/// Non-durable store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryWeightStore {
    state: Mutex<MemoryState>,
}

impl MemoryWeightStore {
    pub fn new(seed: WeightMap) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                weights: seed,
                log: Vec::new(),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_weights())
    }
}

impl WeightStore for MemoryWeightStore {
    fn get_weights(&self) -> Result<WeightMap> {
        Ok(lock(&self.state)?.weights.clone())
    }

    fn set_weight(
        &self,
        agent: &str,
        new_weight: f64,
        record: &WeightAdjustmentRecord,
    ) -> Result<()> {
        validate_write(agent, new_weight, record)?;
        let mut state = lock(&self.state)?;
        state.log.push(record.clone());
        state.weights.insert(agent.to_string(), new_weight);
        Ok(())
    }

    fn history(&self, agent: Option<&str>) -> Result<Vec<WeightAdjustmentRecord>> {
        let state = lock(&self.state)?;
        Ok(state
            .log
            .iter()
            .filter(|r| agent.map_or(true, |a| r.agent == a))
            .cloned()
            .collect())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// On-disk snapshot of current weights
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WeightSnapshot {
    weights: WeightMap,
    /// Log records already folded into `weights`
    #[serde(default)]
    log_records: usize,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct FileState {
    weights: WeightMap,
    log_records: usize,
}

/// Durable store: `weights.json` snapshot plus `adjustments.jsonl` log
#[derive(Debug)]
pub struct FileWeightStore {
    dir: PathBuf,
    state: Mutex<FileState>,
}

impl FileWeightStore {
    /// Open (or initialise) a store in `dir`.
    ///
    /// With no snapshot on disk, weights are seeded from `seed`. Log records
    /// the snapshot has not yet absorbed (all of them, without a snapshot)
    /// are replayed on top and a fresh snapshot is written.
    pub fn open<P: AsRef<Path>>(dir: P, seed: WeightMap) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let (mut weights, applied) = if snapshot_path.exists() {
            let content = fs::read_to_string(&snapshot_path)?;
            let snapshot: WeightSnapshot = serde_json::from_str(&content)?;
            debug!(path = %snapshot_path.display(), agents = snapshot.weights.len(), "loaded weight snapshot");
            (snapshot.weights, Some(snapshot.log_records))
        } else {
            (seed, None)
        };

        let log = read_log(&dir.join(LOG_FILE))?;
        let pending = match applied {
            Some(n) if n > log.len() => {
                return Err(PropcalError::Store(format!(
                    "snapshot reflects {n} adjustments but the log holds {}",
                    log.len()
                )));
            }
            Some(n) => &log[n..],
            None => &log[..],
        };

        if !pending.is_empty() {
            warn!(
                records = pending.len(),
                snapshot = applied.is_some(),
                "weight snapshot behind adjustment log, replaying"
            );
        }
        for record in pending {
            weights.insert(record.agent.clone(), record.new_weight);
        }
        if applied.is_none() || !pending.is_empty() {
            write_snapshot(&dir, &weights, log.len())?;
        }

        info!(dir = %dir.display(), agents = weights.len(), "weight store opened");
        Ok(Self {
            dir,
            state: Mutex::new(FileState {
                weights,
                log_records: log.len(),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append_log(&self, record: &WeightAdjustmentRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(LOG_FILE))?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

fn write_snapshot(dir: &Path, weights: &WeightMap, log_records: usize) -> Result<()> {
    let snapshot = WeightSnapshot {
        weights: weights.clone(),
        log_records,
        updated_at: Utc::now(),
    };
    let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
    fs::write(&tmp, serde_json::to_string_pretty(&snapshot)?)?;
    fs::rename(&tmp, dir.join(SNAPSHOT_FILE))?;
    Ok(())
}

fn read_log(path: &Path) -> Result<Vec<WeightAdjustmentRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

impl WeightStore for FileWeightStore {
    fn get_weights(&self) -> Result<WeightMap> {
        Ok(lock(&self.state)?.weights.clone())
    }

    fn set_weight(
        &self,
        agent: &str,
        new_weight: f64,
        record: &WeightAdjustmentRecord,
    ) -> Result<()> {
        validate_write(agent, new_weight, record)?;
        let mut state = lock(&self.state)?;

        // Log first: a crash after this line is repaired by replay on open
        self.append_log(record)?;
        state.log_records += 1;
        state.weights.insert(agent.to_string(), new_weight);
        write_snapshot(&self.dir, &state.weights, state.log_records)?;

        debug!(agent, old = record.old_weight, new = new_weight, reason = %record.reason, "weight committed");
        Ok(())
    }

    fn history(&self, agent: Option<&str>) -> Result<Vec<WeightAdjustmentRecord>> {
        // Hold the lock so a concurrent write cannot leave a half-written line
        let _guard = lock(&self.state)?;
        let records = read_log(&self.dir.join(LOG_FILE))?;
        Ok(records
            .into_iter()
            .filter(|r| agent.map_or(true, |a| r.agent == a))
            .collect())
    }
}
