//! Weight Optimizer
//!
//! Stateless random search over agent weights:
//! 1. Candidate 0 is the baseline (current) configuration.
//! 2. Candidates 1..N draw each agent weight uniformly from its range,
//!    using a seeded rng so a sweep can be replayed exactly.
//! 3. Each candidate reruns aggregation + grading over every period in the
//!    window against the preloaded actuals and sums wins, losses and voids.
//! 4. Results are ranked by win rate (voids excluded), ties kept in
//!    generation order.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    weight_for, GradeResult, HistoricalPeriod, PredictionInput, WeightAdjustmentRecord, WeightMap,
};
use crate::error::{PropcalError, Result};
use crate::persistence::WeightStore;

use super::actuals::ActualsCache;
use super::aggregator::ConfidenceAggregator;
use super::grader::Grader;
use super::search_space::{SearchSpace, WeightRange};

pub const REASON_PROMOTION: &str = "optimizer promotion";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Candidates per sweep, baseline included
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    /// Fixed seed; a random one is drawn and logged when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Picks below this final confidence are skipped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Log progress every N candidates
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    /// Range for agents without an explicit entry in `ranges`
    #[serde(default)]
    pub default_range: WeightRange,
    #[serde(default)]
    pub ranges: BTreeMap<String, WeightRange>,
}

fn default_n_samples() -> usize {
    100
}

fn default_min_confidence() -> f64 {
    55.0
}

fn default_progress_every() -> usize {
    25
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            n_samples: default_n_samples(),
            seed: None,
            min_confidence: default_min_confidence(),
            progress_every: default_progress_every(),
            default_range: WeightRange::default(),
            ranges: BTreeMap::new(),
        }
    }
}

impl OptimizerConfig {
    /// Search space over `agents` plus every agent with an explicit range
    pub fn search_space<'a, I>(&self, agents: I) -> Result<SearchSpace>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let agents: Vec<&str> = agents.into_iter().collect();
        let mut ranges = BTreeMap::new();
        // Config keys may arrive lowercased from env overrides
        for (name, range) in &self.ranges {
            let agent = agents
                .iter()
                .find(|a| a.eq_ignore_ascii_case(name))
                .map_or_else(|| name.clone(), |a| a.to_string());
            ranges.insert(agent, *range);
        }
        for agent in agents {
            ranges
                .entry(agent.to_string())
                .or_insert(self.default_range);
        }
        SearchSpace::new(ranges)
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.n_samples == 0 {
            errors.push("optimizer.n_samples must be at least 1".to_string());
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            errors.push("optimizer.min_confidence must be between 0 and 100".to_string());
        }
        if self.default_range.min <= 0.0 || self.default_range.min > self.default_range.max {
            errors.push("optimizer.default_range must satisfy 0 < min <= max".to_string());
        }
        for (agent, range) in &self.ranges {
            if range.min <= 0.0 || range.min > range.max {
                errors.push(format!(
                    "optimizer.ranges.{agent} must satisfy 0 < min <= max"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Totals from replaying one weight configuration over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Props that cleared the confidence threshold
    pub picks: u64,
    pub wins: u64,
    pub losses: u64,
    pub voids: u64,
    pub unknown: u64,
}

impl EvaluationOutcome {
    /// wins / (wins + losses), 0 with no decided picks
    pub fn win_rate(&self) -> f64 {
        let decided = self.wins + self.losses;
        if decided == 0 {
            0.0
        } else {
            self.wins as f64 / decided as f64
        }
    }
}

/// One ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// 1-based rank after sorting
    pub rank: usize,
    /// Generation index, 0 for the baseline
    pub candidate: usize,
    pub is_baseline: bool,
    pub weights: WeightMap,
    pub picks: u64,
    pub wins: u64,
    pub losses: u64,
    pub voids: u64,
    pub win_rate: f64,
}

/// Random-search optimizer over a preloaded historical window
pub struct WeightOptimizer<'a> {
    aggregator: ConfidenceAggregator,
    space: SearchSpace,
    baseline: WeightMap,
    cache: &'a ActualsCache,
    grader: Grader,
    seed: u64,
    progress_every: usize,
}

impl<'a> WeightOptimizer<'a> {
    pub fn new(
        aggregator: ConfidenceAggregator,
        space: SearchSpace,
        baseline: WeightMap,
        cache: &'a ActualsCache,
        seed: u64,
    ) -> Self {
        Self {
            aggregator,
            space,
            baseline,
            cache,
            grader: Grader::new(),
            seed,
            progress_every: default_progress_every(),
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn baseline(&self) -> &WeightMap {
        &self.baseline
    }

    /// Generate `n_samples` candidates (baseline first), evaluate each over
    /// `periods`, and return them ranked by win rate.
    pub fn run_optimization(
        &mut self,
        n_samples: usize,
        periods: &[HistoricalPeriod],
        min_confidence: f64,
    ) -> Result<Vec<OptimizationResult>> {
        if n_samples == 0 {
            return Err(PropcalError::Validation(
                "n_samples must be at least 1".to_string(),
            ));
        }
        // Fail before the sweep rather than halfway through it
        for period in periods {
            self.cache.require(&period.id)?;
        }

        let candidates = self.generate_candidates(n_samples);
        info!(
            candidates = candidates.len(),
            periods = periods.len(),
            seed = self.seed,
            min_confidence,
            "starting weight optimization"
        );

        let mut results = Vec::with_capacity(candidates.len());
        for (idx, weights) in candidates.into_iter().enumerate() {
            let outcome = self.evaluate(&weights, periods, min_confidence)?;
            debug!(candidate = idx, win_rate = outcome.win_rate(), "evaluated candidate");
            if (idx + 1) % self.progress_every == 0 {
                info!(done = idx + 1, total = n_samples, "optimization progress");
            }
            results.push(OptimizationResult {
                rank: 0,
                candidate: idx,
                is_baseline: idx == 0,
                weights,
                picks: outcome.picks,
                wins: outcome.wins,
                losses: outcome.losses,
                voids: outcome.voids,
                win_rate: outcome.win_rate(),
            });
        }

        // Stable sort keeps generation order among ties
        results.sort_by(|a, b| {
            b.win_rate
                .partial_cmp(&a.win_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i + 1;
        }

        if let Some(best) = results.first() {
            info!(
                candidate = best.candidate,
                win_rate = best.win_rate,
                wins = best.wins,
                losses = best.losses,
                improvement = improvement_over_baseline(&results).unwrap_or(0.0),
                "optimization complete"
            );
        }

        Ok(results)
    }

    fn generate_candidates(&self, n_samples: usize) -> Vec<WeightMap> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut candidates = Vec::with_capacity(n_samples);
        candidates.push(self.baseline.clone());
        for _ in 1..n_samples {
            let mut weights = self.baseline.clone();
            weights.extend(self.space.sample(&mut rng));
            candidates.push(weights);
        }
        candidates
    }

    /// Replay one weight configuration over `periods`
    pub fn evaluate(
        &mut self,
        weights: &WeightMap,
        periods: &[HistoricalPeriod],
        min_confidence: f64,
    ) -> Result<EvaluationOutcome> {
        let mut outcome = EvaluationOutcome::default();

        for period in periods {
            let actuals = self.cache.require(&period.id)?;
            for entry in &period.entries {
                let analysis = self.aggregator.analyze(&entry.prop, &entry.signals, weights);
                if !analysis.meets(min_confidence) {
                    continue;
                }
                outcome.picks += 1;

                let prediction = PredictionInput {
                    player: entry.prop.player.clone(),
                    stat_type: entry.prop.stat_type.clone(),
                    line: entry.prop.line,
                    direction: entry.prop.direction,
                    confidence: analysis.confidence,
                    contributions: Vec::new(),
                };
                match self.grader.grade_one(&prediction, actuals).result {
                    GradeResult::Win => outcome.wins += 1,
                    GradeResult::Loss => outcome.losses += 1,
                    GradeResult::Void => outcome.voids += 1,
                    GradeResult::Unknown => outcome.unknown += 1,
                }
            }
        }

        Ok(outcome)
    }
}

/// Best win rate minus the baseline's, `None` without a baseline result
pub fn improvement_over_baseline(results: &[OptimizationResult]) -> Option<f64> {
    let best = results.first()?;
    let baseline = results.iter().find(|r| r.is_baseline)?;
    Some(best.win_rate - baseline.win_rate)
}

/// Write a chosen configuration through the store, one record per agent
pub fn promote(
    store: &dyn WeightStore,
    result: &OptimizationResult,
    period: &str,
) -> Result<Vec<WeightAdjustmentRecord>> {
    let current = store.get_weights()?;
    let run_id = Uuid::new_v4();
    let mut records = Vec::with_capacity(result.weights.len());

    for (agent, weight) in &result.weights {
        let record = WeightAdjustmentRecord::new(
            run_id,
            agent.clone(),
            period,
            weight_for(&current, agent),
            *weight,
            REASON_PROMOTION,
            None,
        );
        store.set_weight(agent, *weight, &record)?;
        records.push(record);
    }

    info!(
        %run_id,
        candidate = result.candidate,
        win_rate = result.win_rate,
        "promoted optimizer weights"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentSignal, BetDirection, HistoricalEntry, Prop, SignalDirection};
    use crate::persistence::MemoryWeightStore;
    use crate::strategy::actuals::{PeriodActuals, PlayerStats};

    fn entry(player: &str, line: f64, signals: &[(&str, f64, SignalDirection)]) -> HistoricalEntry {
        HistoricalEntry {
            prop: Prop::new(player, "GB", "CHI", "Pass Yds", line, BetDirection::Over, true),
            signals: signals
                .iter()
                .map(|(a, s, d)| AgentSignal::new(*a, *s, *d))
                .collect(),
        }
    }

    fn actuals(rows: &[(&str, f64)]) -> PeriodActuals {
        rows.iter()
            .map(|(player, yds)| {
                let mut stats = PlayerStats::new();
                stats.insert("pass_yds".to_string(), *yds);
                (player.to_string(), stats)
            })
            .collect()
    }

    /// "Good" is right about every OVER it backs, "Bad" is always wrong
    fn window() -> (Vec<HistoricalPeriod>, ActualsCache) {
        use SignalDirection::{Over, Under};
        let w1 = HistoricalPeriod::new(
            "W1",
            vec![
                entry("QB1", 200.5, &[("Good", 70.0, Over), ("Bad", 70.0, Under)]),
                entry("QB2", 200.5, &[("Good", 70.0, Under), ("Bad", 70.0, Over)]),
                entry("QB3", 200.5, &[("Good", 50.0, SignalDirection::None)]),
            ],
        );
        let w2 = HistoricalPeriod::new(
            "W2",
            vec![
                entry("QB1", 220.5, &[("Good", 65.0, Over), ("Bad", 60.0, Under)]),
                entry("QB4", 180.5, &[("Bad", 75.0, Over)]),
            ],
        );
        let mut cache = ActualsCache::new();
        cache.insert("W1", actuals(&[("QB1", 250.0), ("QB2", 150.0), ("QB3", 210.0)]));
        cache.insert("W2", actuals(&[("QB1", 240.0)]));
        (vec![w1, w2], cache)
    }

    fn baseline() -> WeightMap {
        [("Good".to_string(), 1.0), ("Bad".to_string(), 1.0)]
            .into_iter()
            .collect()
    }

    fn optimizer(cache: &ActualsCache, seed: u64) -> WeightOptimizer<'_> {
        let space = SearchSpace::uniform(["Good", "Bad"], WeightRange::new(0.1, 5.0)).unwrap();
        WeightOptimizer::new(ConfidenceAggregator::default(), space, baseline(), cache, seed)
    }

    #[test]
    fn returns_n_results_sorted_with_baseline() {
        let (periods, cache) = window();
        let mut opt = optimizer(&cache, 7);
        let results = opt.run_optimization(20, &periods, 55.0).unwrap();

        assert_eq!(results.len(), 20);
        assert_eq!(results.iter().filter(|r| r.is_baseline).count(), 1);
        assert!(results.windows(2).all(|w| w[0].win_rate >= w[1].win_rate));
        assert!(results.iter().enumerate().all(|(i, r)| r.rank == i + 1));
    }

    #[test]
    fn baseline_matches_standalone_evaluation() {
        let (periods, cache) = window();
        let mut opt = optimizer(&cache, 11);
        let results = opt.run_optimization(15, &periods, 55.0).unwrap();
        let baseline_result = results.iter().find(|r| r.is_baseline).unwrap();

        let mut standalone = optimizer(&cache, 999);
        let direct = standalone.evaluate(&baseline(), &periods, 55.0).unwrap();
        assert_eq!(baseline_result.win_rate, direct.win_rate());
        assert_eq!(baseline_result.wins, direct.wins);
        assert_eq!(baseline_result.voids, direct.voids);
    }

    #[test]
    fn ties_keep_generation_order() {
        let (_, cache) = window();
        // QB4 has no actuals, so every candidate grades void or makes no pick
        let all_void = vec![HistoricalPeriod::new(
            "W2",
            vec![entry("QB4", 180.5, &[("Bad", 75.0, SignalDirection::Over)])],
        )];

        let mut opt = optimizer(&cache, 5);
        let results = opt.run_optimization(12, &all_void, 55.0).unwrap();

        assert!(results.iter().all(|r| r.win_rate == 0.0 && r.wins + r.losses == 0));
        assert!(results[0].is_baseline);
        let order: Vec<usize> = results.iter().map(|r| r.candidate).collect();
        assert_eq!(order, (0..12).collect::<Vec<_>>());
        assert_eq!(improvement_over_baseline(&results), Some(0.0));
    }

    fn weights(good: f64, bad: f64) -> WeightMap {
        [("Good".to_string(), good), ("Bad".to_string(), bad)]
            .into_iter()
            .collect()
    }

    #[test]
    fn trusting_the_good_agent_wins() {
        let (periods, cache) = window();
        let mut opt = optimizer(&cache, 3);

        let trust_good = opt.evaluate(&weights(5.0, 0.1), &periods, 55.0).unwrap();
        assert_eq!((trust_good.wins, trust_good.losses), (2, 0));

        // Only QB2 (a loss) and QB4 (no actuals) clear the threshold
        let trust_bad = opt.evaluate(&weights(0.1, 5.0), &periods, 55.0).unwrap();
        assert_eq!((trust_bad.wins, trust_bad.losses, trust_bad.voids), (0, 1, 1));
        assert_eq!(trust_bad.win_rate(), 0.0);

        let results = opt.run_optimization(60, &periods, 55.0).unwrap();
        assert_eq!(results[0].win_rate, 1.0);
        assert!(improvement_over_baseline(&results).unwrap() >= 0.0);
    }

    #[test]
    fn same_seed_same_ranking() {
        let (periods, cache) = window();
        let first = optimizer(&cache, 42).run_optimization(10, &periods, 55.0).unwrap();
        let second = optimizer(&cache, 42).run_optimization(10, &periods, 55.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn voids_are_excluded_from_win_rate() {
        let (periods, cache) = window();
        let mut opt = optimizer(&cache, 1);
        let outcome = opt.evaluate(&weights(5.0, 1.0), &periods, 55.0).unwrap();
        // QB4 has no actuals in W2 and QB3 is all-neutral (never picked)
        assert_eq!(outcome.voids, 1);
        assert_eq!(outcome.wins, 2);
        assert_eq!(outcome.picks, outcome.wins + outcome.losses + outcome.voids);
        assert_eq!(outcome.win_rate(), 1.0);
    }

    #[test]
    fn unloaded_period_fails_fast() {
        let (mut periods, cache) = window();
        periods.push(HistoricalPeriod::new("W9", vec![]));
        let err = optimizer(&cache, 1)
            .run_optimization(5, &periods, 55.0)
            .unwrap_err();
        assert!(matches!(err, PropcalError::PeriodNotLoaded(p) if p == "W9"));
    }

    #[test]
    fn zero_samples_is_rejected() {
        let (periods, cache) = window();
        assert!(optimizer(&cache, 1).run_optimization(0, &periods, 55.0).is_err());
    }

    #[test]
    fn promote_writes_through_store() {
        let (periods, cache) = window();
        let results = optimizer(&cache, 5).run_optimization(10, &periods, 55.0).unwrap();
        let store = MemoryWeightStore::new(baseline());

        let records = promote(&store, &results[0], "W2").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.reason == REASON_PROMOTION));
        assert_eq!(store.get_weights().unwrap(), results[0].weights);
    }

    #[test]
    fn search_space_merges_configured_ranges() {
        let mut cfg = OptimizerConfig::default();
        cfg.ranges
            .insert("injury".to_string(), WeightRange::new(2.0, 4.0));
        let space = cfg.search_space(["DVOA", "Injury"]).unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.range("Injury").unwrap().min, 2.0);
        assert_eq!(space.range("DVOA").unwrap(), &WeightRange::default());
    }
}
