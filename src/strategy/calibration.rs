//! Weight Calibrator
//!
//! Turns one period's per-agent performance into weight adjustments.
//! Rules, evaluated in order:
//! 1. sample below `min_sample_size`: unchanged ("insufficient sample")
//! 2. overconfidence above the high threshold: cut proportionally, floor-bounded
//! 3. overconfidence below the low threshold: raise proportionally, ceiling-bounded
//! 4. accurate and calibrated: small raise
//! 5. inaccurate: small cut
//! 6. otherwise unchanged ("neutral performance")
//!
//! Every agent gets a record, including the unchanged ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{weight_for, AgentPerformanceStats, WeightAdjustmentRecord};
use crate::error::Result;
use crate::persistence::WeightStore;

pub const REASON_INSUFFICIENT_SAMPLE: &str = "insufficient sample";
pub const REASON_OVERCONFIDENT: &str = "overconfident";
pub const REASON_UNDERCONFIDENT: &str = "underconfident";
pub const REASON_CALIBRATED: &str = "well-calibrated and accurate";
pub const REASON_LOW_ACCURACY: &str = "low accuracy";
pub const REASON_NEUTRAL: &str = "neutral performance";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Aligned predictions required before a weight may move
    #[serde(default = "default_min_sample")]
    pub min_sample_size: u32,
    #[serde(default = "default_oc_high")]
    pub overconfidence_high: f64,
    #[serde(default = "default_oc_low")]
    pub overconfidence_low: f64,
    #[serde(default = "default_floor")]
    pub weight_floor: f64,
    #[serde(default = "default_ceiling")]
    pub weight_ceiling: f64,
    #[serde(default = "default_accurate")]
    pub accurate_threshold: f64,
    #[serde(default = "default_inaccurate")]
    pub inaccurate_threshold: f64,
    /// |overconfidence| at or below this counts as calibrated
    #[serde(default = "default_tolerance")]
    pub calibrated_tolerance: f64,
    /// Fractional weight change per unit of overconfidence
    #[serde(default = "default_step_scale")]
    pub step_scale: f64,
    /// Fractional weight change per unit of accuracy deviation from 0.5
    #[serde(default = "default_nudge_scale")]
    pub nudge_scale: f64,
    /// Largest fractional change a single run may apply
    #[serde(default = "default_max_step")]
    pub max_step_fraction: f64,
}

fn default_min_sample() -> u32 {
    10
}

fn default_oc_high() -> f64 {
    0.10
}

fn default_oc_low() -> f64 {
    -0.10
}

fn default_floor() -> f64 {
    0.1
}

fn default_ceiling() -> f64 {
    5.0
}

fn default_accurate() -> f64 {
    0.55
}

fn default_inaccurate() -> f64 {
    0.45
}

fn default_tolerance() -> f64 {
    0.05
}

fn default_step_scale() -> f64 {
    1.0
}

fn default_nudge_scale() -> f64 {
    0.2
}

fn default_max_step() -> f64 {
    0.5
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_sample_size: default_min_sample(),
            overconfidence_high: default_oc_high(),
            overconfidence_low: default_oc_low(),
            weight_floor: default_floor(),
            weight_ceiling: default_ceiling(),
            accurate_threshold: default_accurate(),
            inaccurate_threshold: default_inaccurate(),
            calibrated_tolerance: default_tolerance(),
            step_scale: default_step_scale(),
            nudge_scale: default_nudge_scale(),
            max_step_fraction: default_max_step(),
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.weight_floor <= 0.0 {
            errors.push("calibration.weight_floor must be positive".to_string());
        }
        if self.weight_ceiling <= self.weight_floor {
            errors.push("calibration.weight_ceiling must exceed weight_floor".to_string());
        }
        if self.overconfidence_low >= self.overconfidence_high {
            errors.push(
                "calibration.overconfidence_low must be below overconfidence_high".to_string(),
            );
        }
        if self.inaccurate_threshold >= self.accurate_threshold {
            errors.push(
                "calibration.inaccurate_threshold must be below accurate_threshold".to_string(),
            );
        }
        if !(0.0..1.0).contains(&self.max_step_fraction) || self.max_step_fraction == 0.0 {
            errors.push("calibration.max_step_fraction must be in (0, 1)".to_string());
        }
        if self.step_scale <= 0.0 || self.nudge_scale <= 0.0 {
            errors.push("calibration step and nudge scales must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A proposed weight and why
#[derive(Debug, Clone, PartialEq)]
pub struct WeightProposal {
    pub new_weight: f64,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct WeightCalibrator {
    config: CalibrationConfig,
}

impl WeightCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Apply the rule set to one agent
    pub fn propose(&self, old_weight: f64, stats: &AgentPerformanceStats) -> WeightProposal {
        let cfg = &self.config;
        let oc = stats.overconfidence;

        let (new_weight, reason) = if stats.sample_size() < cfg.min_sample_size {
            (old_weight, REASON_INSUFFICIENT_SAMPLE)
        } else if oc > cfg.overconfidence_high {
            let step = self.step(oc * cfg.step_scale);
            (self.cut(old_weight, step), REASON_OVERCONFIDENT)
        } else if oc < cfg.overconfidence_low {
            let step = self.step(-oc * cfg.step_scale);
            (self.raise(old_weight, step), REASON_UNDERCONFIDENT)
        } else if stats.accuracy > cfg.accurate_threshold && oc.abs() <= cfg.calibrated_tolerance {
            let step = self.step((stats.accuracy - 0.5) * cfg.nudge_scale);
            (self.raise(old_weight, step), REASON_CALIBRATED)
        } else if stats.accuracy < cfg.inaccurate_threshold {
            let step = self.step((0.5 - stats.accuracy) * cfg.nudge_scale);
            (self.cut(old_weight, step), REASON_LOW_ACCURACY)
        } else {
            (old_weight, REASON_NEUTRAL)
        };

        WeightProposal { new_weight, reason }
    }

    fn step(&self, raw: f64) -> f64 {
        raw.clamp(0.0, self.config.max_step_fraction)
    }

    /// Shrink toward the floor. A weight already under the floor stays put.
    fn cut(&self, old_weight: f64, step: f64) -> f64 {
        (old_weight * (1.0 - step)).max(self.config.weight_floor.min(old_weight))
    }

    /// Grow toward the ceiling. A weight already over the ceiling stays put.
    fn raise(&self, old_weight: f64, step: f64) -> f64 {
        (old_weight * (1.0 + step)).min(self.config.weight_ceiling.max(old_weight))
    }

    /// Propose (and unless `dry_run`, apply) new weights for every agent in
    /// `performance`. Records are ordered by move size, largest first; ties
    /// keep agent-name order.
    pub fn auto_adjust_weights(
        &self,
        store: &dyn WeightStore,
        performance: &BTreeMap<String, AgentPerformanceStats>,
        period: &str,
        dry_run: bool,
    ) -> Result<Vec<WeightAdjustmentRecord>> {
        let current = store.get_weights()?;
        let run_id = Uuid::new_v4();

        let mut records: Vec<WeightAdjustmentRecord> = performance
            .iter()
            .map(|(agent, stats)| {
                let old_weight = weight_for(&current, agent);
                let proposal = self.propose(old_weight, stats);
                if proposal.reason == REASON_INSUFFICIENT_SAMPLE {
                    warn!(
                        agent = %agent,
                        sample = stats.sample_size(),
                        min = self.config.min_sample_size,
                        "insufficient sample, weight unchanged"
                    );
                }
                WeightAdjustmentRecord::new(
                    run_id,
                    agent.clone(),
                    period,
                    old_weight,
                    proposal.new_weight,
                    proposal.reason,
                    Some(stats.clone()),
                )
            })
            .collect();

        records.sort_by(|a, b| {
            b.delta()
                .abs()
                .partial_cmp(&a.delta().abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if !dry_run {
            for record in &records {
                store.set_weight(&record.agent, record.new_weight, record)?;
            }
        }

        let changed = records.iter().filter(|r| r.is_change()).count();
        info!(
            period,
            %run_id,
            agents = records.len(),
            changed,
            dry_run,
            "calibration run complete"
        );

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryWeightStore;

    fn stats(accuracy: f64, overconfidence: f64, sample: u32) -> AgentPerformanceStats {
        AgentPerformanceStats {
            aligned: sample,
            wins: (accuracy * sample as f64).round() as u32,
            losses: sample - (accuracy * sample as f64).round() as u32,
            accuracy,
            avg_confidence: accuracy + overconfidence,
            overconfidence,
            disagreed: 0,
            contrarian_value: 0.0,
        }
    }

    fn calibrator() -> WeightCalibrator {
        WeightCalibrator::new(CalibrationConfig::default())
    }

    #[test]
    fn calibrated_and_accurate_gets_small_nudge() {
        let proposal = calibrator().propose(2.0, &stats(0.75, 0.03, 20));
        assert_eq!(proposal.reason, REASON_CALIBRATED);
        assert!(proposal.new_weight > 2.0);
        assert!(proposal.new_weight < 2.2, "nudge should be small: {}", proposal.new_weight);
    }

    #[test]
    fn small_sample_is_left_alone() {
        let proposal = calibrator().propose(2.0, &stats(0.2, 0.5, 9));
        assert_eq!(proposal.reason, REASON_INSUFFICIENT_SAMPLE);
        assert_eq!(proposal.new_weight, 2.0);
    }

    #[test]
    fn overconfidence_always_cuts_and_respects_floor() {
        let cal = calibrator();
        for oc in [0.11, 0.2, 0.35, 0.6, 0.9] {
            for old in [0.15, 0.5, 1.0, 3.0, 5.0] {
                let proposal = cal.propose(old, &stats(0.4, oc, 25));
                assert_eq!(proposal.reason, REASON_OVERCONFIDENT);
                assert!(proposal.new_weight < old, "oc {oc} old {old}");
                assert!(proposal.new_weight >= 0.1);
            }
        }
    }

    #[test]
    fn weights_outside_the_band_never_move_the_wrong_way() {
        let cal = calibrator();

        let below_floor = cal.propose(0.05, &stats(0.4, 0.4, 30));
        assert_eq!(below_floor.reason, REASON_OVERCONFIDENT);
        assert_eq!(below_floor.new_weight, 0.05);

        let weak = cal.propose(0.05, &stats(0.3, 0.05, 30));
        assert_eq!(weak.reason, REASON_LOW_ACCURACY);
        assert_eq!(weak.new_weight, 0.05);

        let above_ceiling = cal.propose(6.0, &stats(0.8, -0.3, 30));
        assert_eq!(above_ceiling.reason, REASON_UNDERCONFIDENT);
        assert_eq!(above_ceiling.new_weight, 6.0);

        let nudged = cal.propose(6.0, &stats(0.75, 0.03, 30));
        assert_eq!(nudged.reason, REASON_CALIBRATED);
        assert_eq!(nudged.new_weight, 6.0);

        // Out-of-band weights still move in the right direction
        assert!(cal.propose(0.05, &stats(0.8, -0.3, 30)).new_weight > 0.05);
        assert!(cal.propose(6.0, &stats(0.4, 0.4, 30)).new_weight < 6.0);
    }

    #[test]
    fn larger_miscalibration_moves_faster() {
        let cal = calibrator();
        let mild = cal.propose(2.0, &stats(0.5, 0.12, 30)).new_weight;
        let severe = cal.propose(2.0, &stats(0.5, 0.40, 30)).new_weight;
        assert!(severe < mild);

        let mild_up = cal.propose(2.0, &stats(0.6, -0.12, 30)).new_weight;
        let severe_up = cal.propose(2.0, &stats(0.6, -0.30, 30)).new_weight;
        assert!(severe_up > mild_up);
    }

    #[test]
    fn underconfidence_respects_ceiling() {
        let proposal = calibrator().propose(4.8, &stats(0.8, -0.3, 40));
        assert_eq!(proposal.reason, REASON_UNDERCONFIDENT);
        assert_eq!(proposal.new_weight, 5.0);
    }

    #[test]
    fn low_accuracy_and_neutral_branches() {
        let cal = calibrator();
        let low = cal.propose(1.0, &stats(0.40, 0.08, 15));
        assert_eq!(low.reason, REASON_LOW_ACCURACY);
        assert!(low.new_weight < 1.0);

        let neutral = cal.propose(1.0, &stats(0.50, 0.02, 15));
        assert_eq!(neutral.reason, REASON_NEUTRAL);
        assert_eq!(neutral.new_weight, 1.0);
    }

    #[test]
    fn dry_run_records_without_writing() {
        let store = MemoryWeightStore::with_defaults();
        let mut perf = BTreeMap::new();
        perf.insert("DVOA".to_string(), stats(0.75, 0.03, 20));
        perf.insert("Weather".to_string(), stats(0.3, 0.4, 20));
        perf.insert("Trend".to_string(), stats(0.6, 0.0, 3));

        let before = store.get_weights().unwrap();
        let records = calibrator()
            .auto_adjust_weights(&store, &perf, "W6", true)
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(store.get_weights().unwrap(), before);
        assert!(store.history(None).unwrap().is_empty());
        // Largest move first, unchanged last
        assert_eq!(records[0].agent, "Weather");
        assert_eq!(records[2].reason, REASON_INSUFFICIENT_SAMPLE);
        assert!(records.iter().all(|r| r.run_id == records[0].run_id));
    }

    #[test]
    fn apply_writes_every_record() {
        let store = MemoryWeightStore::with_defaults();
        let mut perf = BTreeMap::new();
        perf.insert("DVOA".to_string(), stats(0.75, 0.03, 20));
        perf.insert("Trend".to_string(), stats(0.6, 0.0, 3));

        let records = calibrator()
            .auto_adjust_weights(&store, &perf, "W6", false)
            .unwrap();

        let weights = store.get_weights().unwrap();
        let dvoa = records.iter().find(|r| r.agent == "DVOA").unwrap();
        assert_eq!(weights["DVOA"], dvoa.new_weight);
        assert_eq!(weights["Trend"], 1.0);
        assert_eq!(store.history(None).unwrap().len(), 2);
    }

    #[test]
    fn config_validation() {
        assert!(CalibrationConfig::default().validate().is_ok());
        let bad = CalibrationConfig {
            weight_floor: 0.0,
            weight_ceiling: 0.0,
            ..CalibrationConfig::default()
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
