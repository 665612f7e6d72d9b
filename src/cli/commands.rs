//! Command handlers for the `propcal` binary.
//!
//! Every command runs over the JSON history directory and the file-backed
//! weight store configured in [`AppConfig`].

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, info};

use crate::agents::{AgentRegistry, RecordedAgent, ScoringContext};
use crate::collector::JsonHistory;
use crate::config::AppConfig;
use crate::domain::{
    GradedPrediction, HistoricalPeriod, PredictionInput, PropAnalysis, WeightAdjustmentRecord,
    WeightMap,
};
use crate::error::Result as PropcalResult;
use crate::persistence::{FileWeightStore, WeightStore};
use crate::strategy::{
    analyze_agent_performance, calibration_report, improvement_over_baseline, promote,
    ActualsCache, ConfidenceAggregator, GradeSummary, Grader, OptimizationResult,
    WeightCalibrator, WeightOptimizer,
};

use super::output::{pct, print_item, print_items, print_kv, print_success, print_warn, OutputMode};
use super::{Cli, Commands, WeightsCommands};

// ============================================================================
// Table rows
// ============================================================================

#[derive(Debug, Serialize, Tabled)]
struct AnalysisRow {
    #[tabled(rename = "Prop")]
    prop: String,
    #[tabled(rename = "Conf")]
    confidence: String,
    #[tabled(rename = "Raw")]
    raw: String,
    #[tabled(rename = "Adj")]
    adjustment: String,
    #[tabled(rename = "Agree")]
    agreement: String,
    #[tabled(rename = "Active")]
    active: usize,
    #[tabled(rename = "")]
    flag: String,
}

impl From<&PropAnalysis> for AnalysisRow {
    fn from(a: &PropAnalysis) -> Self {
        Self {
            prop: a.prop.label(),
            confidence: format!("{:.1}", a.confidence),
            raw: format!("{:.1}", a.raw_confidence),
            adjustment: format!("{:+.1}", a.agreement_adjustment),
            agreement: a.agreement_ratio.map_or_else(|| "-".to_string(), pct),
            active: a.active_agents,
            flag: if a.low_confidence { "LOW".to_string() } else { String::new() },
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct GradeRow {
    #[tabled(rename = "Player")]
    player: String,
    #[tabled(rename = "Stat")]
    stat_type: String,
    #[tabled(rename = "Pick")]
    pick: String,
    #[tabled(rename = "Conf")]
    confidence: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl From<&GradedPrediction> for GradeRow {
    fn from(g: &GradedPrediction) -> Self {
        let p = &g.prediction;
        let result = match g.void_reason {
            Some(reason) => format!("{} ({reason:?})", g.result),
            None => g.result.to_string(),
        };
        Self {
            player: p.player.clone(),
            stat_type: p.stat_type.clone(),
            pick: format!("{} {}", p.direction, p.line),
            confidence: format!("{:.1}", p.confidence),
            actual: g.actual.map_or_else(|| "-".to_string(), |v| v.to_string()),
            result,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct BucketRow {
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Picks")]
    picks: usize,
    #[tabled(rename = "Wins")]
    wins: usize,
    #[tabled(rename = "Predicted")]
    predicted: String,
    #[tabled(rename = "Realized")]
    realized: String,
}

#[derive(Debug, Serialize, Tabled)]
struct AdjustmentRow {
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "Old")]
    old_weight: String,
    #[tabled(rename = "New")]
    new_weight: String,
    #[tabled(rename = "Delta")]
    delta: String,
    #[tabled(rename = "Sample")]
    sample: u32,
    #[tabled(rename = "Accuracy")]
    accuracy: String,
    #[tabled(rename = "Overconf")]
    overconfidence: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&WeightAdjustmentRecord> for AdjustmentRow {
    fn from(r: &WeightAdjustmentRecord) -> Self {
        let stats = r.stats.clone().unwrap_or_default();
        Self {
            agent: r.agent.clone(),
            old_weight: format!("{:.3}", r.old_weight),
            new_weight: format!("{:.3}", r.new_weight),
            delta: format!("{:+.3}", r.delta()),
            sample: stats.sample_size(),
            accuracy: pct(stats.accuracy),
            overconfidence: format!("{:+.3}", stats.overconfidence),
            reason: r.reason.clone(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct HistoryRow {
    #[tabled(rename = "When")]
    recorded_at: String,
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Old")]
    old_weight: String,
    #[tabled(rename = "New")]
    new_weight: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Run")]
    run_id: String,
}

impl From<&WeightAdjustmentRecord> for HistoryRow {
    fn from(r: &WeightAdjustmentRecord) -> Self {
        Self {
            recorded_at: r.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            agent: r.agent.clone(),
            period: r.period.clone(),
            old_weight: format!("{:.3}", r.old_weight),
            new_weight: format!("{:.3}", r.new_weight),
            reason: r.reason.clone(),
            run_id: r.run_id.to_string()[..8].to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct WeightRow {
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "Weight")]
    weight: String,
}

#[derive(Debug, Serialize, Tabled)]
struct OptimizationRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Cand")]
    candidate: usize,
    #[tabled(rename = "")]
    baseline: String,
    #[tabled(rename = "Win%")]
    win_rate: String,
    #[tabled(rename = "W-L-V")]
    record: String,
    #[tabled(rename = "Picks")]
    picks: u64,
    #[tabled(rename = "Weights")]
    weights: String,
}

impl From<&OptimizationResult> for OptimizationRow {
    fn from(r: &OptimizationResult) -> Self {
        Self {
            rank: r.rank,
            candidate: r.candidate,
            baseline: if r.is_baseline { "base".to_string() } else { String::new() },
            win_rate: pct(r.win_rate),
            record: format!("{}-{}-{}", r.wins, r.losses, r.voids),
            picks: r.picks,
            weights: format_weights(&r.weights),
        }
    }
}

fn format_weights(weights: &WeightMap) -> String {
    weights
        .iter()
        .map(|(agent, w)| format!("{agent}={w:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `[default_weights]` table written by `optimize --export-toml`
#[derive(Debug, Serialize)]
struct WeightsExport<'a> {
    default_weights: &'a WeightMap,
}

// ============================================================================
// Shared pipeline
// ============================================================================

/// Resolved inputs every command works against
struct Workspace {
    config: AppConfig,
    history: JsonHistory,
    store: FileWeightStore,
    aggregator: ConfidenceAggregator,
    mode: OutputMode,
}

impl Workspace {
    fn open(cli: &Cli, config: AppConfig) -> anyhow::Result<Self> {
        let history_dir = cli.history.clone().unwrap_or_else(|| config.history.dir.clone());
        let store_dir = cli.store.clone().unwrap_or_else(|| config.store_dir());
        debug!(history = %history_dir.display(), store = %store_dir.display(), "opening workspace");

        Ok(Self {
            history: JsonHistory::new(history_dir),
            store: FileWeightStore::open(&store_dir, config.seed_weights())?,
            aggregator: ConfidenceAggregator::new(config.aggregator.clone()),
            mode: OutputMode::from(cli.json),
            config,
        })
    }

    /// Requested periods, or every period on disk
    fn resolve_periods(&self, requested: &[String]) -> anyhow::Result<Vec<String>> {
        if requested.is_empty() {
            let all = self.history.list_periods()?;
            anyhow::ensure!(
                !all.is_empty(),
                "no periods found under {}",
                self.history.root().display()
            );
            Ok(all)
        } else {
            Ok(requested.to_vec())
        }
    }

    /// Score every entry of `period` through a registry of its recorded agents
    fn analyze_period(
        &self,
        period: &HistoricalPeriod,
        weights: &WeightMap,
    ) -> anyhow::Result<Vec<PropAnalysis>> {
        let registry = recorded_registry(period)?;
        let ctx = ScoringContext::new(&period.id);
        Ok(period
            .entries
            .iter()
            .map(|entry| {
                let signals = registry.collect_signals(&entry.prop, &ctx);
                self.aggregator.analyze(&entry.prop, &signals, weights)
            })
            .collect())
    }

    /// Analyze and grade picks at or above `min_confidence` across `window`
    fn grade_window(
        &self,
        window: &[HistoricalPeriod],
        cache: &ActualsCache,
        weights: &WeightMap,
        min_confidence: f64,
    ) -> anyhow::Result<Vec<GradedPrediction>> {
        let mut grader = Grader::new();
        let mut graded = Vec::new();
        for period in window {
            let predictions: Vec<PredictionInput> = self
                .analyze_period(period, weights)?
                .iter()
                .filter(|a| a.meets(min_confidence))
                .map(PredictionInput::from)
                .collect();
            graded.extend(grader.grade(&predictions, cache.require(&period.id)?));
        }
        for (label, count) in grader.unmappable_labels() {
            print_warn(&format!("unmappable stat type {label:?} voided {count} pick(s)"));
        }
        Ok(graded)
    }

    fn load_window(&self, periods: &[String]) -> anyhow::Result<(Vec<HistoricalPeriod>, ActualsCache)> {
        let window = self.history.load_window(periods)?;
        let mut cache = ActualsCache::new();
        cache.preload(&self.history, periods)?;
        Ok((window, cache))
    }
}

/// One `RecordedAgent` per agent name seen in the period, registered in
/// first-seen order
fn recorded_registry(period: &HistoricalPeriod) -> anyhow::Result<AgentRegistry> {
    let mut order: Vec<String> = Vec::new();
    let mut agents: HashMap<String, RecordedAgent> = HashMap::new();
    for entry in &period.entries {
        for signal in &entry.signals {
            let agent = agents.entry(signal.agent.clone()).or_insert_with(|| {
                order.push(signal.agent.clone());
                RecordedAgent::new(signal.agent.clone())
            });
            agent.record(&entry.prop, signal);
        }
    }

    let mut registry = AgentRegistry::new();
    for name in order {
        if let Some(agent) = agents.remove(&name) {
            registry.register(Box::new(agent))?;
        }
    }
    Ok(registry)
}

fn window_label(periods: &[String]) -> String {
    match periods {
        [] => "none".to_string(),
        [only] => only.clone(),
        [first, .., last] => format!("{first}..{last}"),
    }
}

// ============================================================================
// Commands
// ============================================================================

pub fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<()> {
    let ws = Workspace::open(cli, config)?;

    match &cli.command {
        Commands::Analyze { period, min_confidence } => run_analyze(&ws, period, *min_confidence),
        Commands::Grade { period, min_confidence, curve } => {
            run_grade(&ws, period, *min_confidence, *curve)
        }
        Commands::Calibrate { periods, apply } => run_calibrate(&ws, periods, *apply),
        Commands::Optimize {
            periods,
            samples,
            seed,
            min_confidence,
            top,
            promote,
            export_toml,
        } => run_optimize(
            &ws,
            periods,
            samples.unwrap_or(ws.config.optimizer.n_samples),
            seed.or(ws.config.optimizer.seed),
            min_confidence.unwrap_or(ws.config.optimizer.min_confidence),
            *top,
            *promote,
            export_toml.as_deref(),
        ),
        Commands::Weights(cmd) => run_weights(&ws, cmd),
    }
}

fn run_analyze(ws: &Workspace, period: &str, min_confidence: Option<f64>) -> anyhow::Result<()> {
    let period = ws.history.load_period(period)?;
    let weights = ws.store.get_weights()?;
    let analyses = ws.analyze_period(&period, &weights)?;

    let shown: Vec<&PropAnalysis> = analyses
        .iter()
        .filter(|a| min_confidence.map_or(true, |min| a.meets(min)))
        .collect();
    info!(period = %period.id, props = analyses.len(), shown = shown.len(), "analyzed period");

    match ws.mode {
        OutputMode::Json => print_item(&shown),
        OutputMode::Table => {
            let rows: Vec<AnalysisRow> = shown.into_iter().map(AnalysisRow::from).collect();
            print_items(&rows, ws.mode)
        }
    }
}

fn run_grade(
    ws: &Workspace,
    period: &str,
    min_confidence: Option<f64>,
    curve: bool,
) -> anyhow::Result<()> {
    let periods = vec![period.to_string()];
    let (window, cache) = ws.load_window(&periods)?;
    let weights = ws.store.get_weights()?;
    let min_confidence = min_confidence.unwrap_or(ws.config.optimizer.min_confidence);

    let graded = ws.grade_window(&window, &cache, &weights, min_confidence)?;
    let summary = GradeSummary::from_graded(&graded);

    if ws.mode == OutputMode::Json {
        #[derive(Serialize)]
        struct GradeOutput<'a> {
            summary: &'a GradeSummary,
            graded: &'a [GradedPrediction],
        }
        return print_item(&GradeOutput { summary: &summary, graded: &graded });
    }

    let rows: Vec<GradeRow> = graded.iter().map(GradeRow::from).collect();
    print_items(&rows, ws.mode)?;
    print_kv(
        "Record",
        &format!(
            "{}-{} ({} void, {} unknown), win rate {}",
            summary.wins,
            summary.losses,
            summary.voids(),
            summary.unknown,
            pct(summary.win_rate())
        ),
    );

    if curve {
        let report = calibration_report(&graded);
        let rows: Vec<BucketRow> = report
            .buckets
            .iter()
            .filter(|b| b.picks > 0)
            .map(|b| BucketRow {
                band: format!("{:.0}-{:.0}", b.lower, b.upper),
                picks: b.picks,
                wins: b.wins,
                predicted: pct(b.predicted),
                realized: pct(b.realized),
            })
            .collect();
        print_items(&rows, ws.mode)?;
        print_kv("Brier score", &format!("{:.4}", report.brier_score));
    }
    Ok(())
}

fn run_calibrate(ws: &Workspace, periods: &[String], apply: bool) -> anyhow::Result<()> {
    let periods = ws.resolve_periods(periods)?;
    let (window, cache) = ws.load_window(&periods)?;
    let weights = ws.store.get_weights()?;

    let graded = ws.grade_window(&window, &cache, &weights, ws.config.optimizer.min_confidence)?;
    let performance = analyze_agent_performance(&graded);

    let calibrator = WeightCalibrator::new(ws.config.calibration.clone());
    let records =
        calibrator.auto_adjust_weights(&ws.store, &performance, &window_label(&periods), !apply)?;

    let rows: Vec<AdjustmentRow> = records.iter().map(AdjustmentRow::from).collect();
    print_items(&rows, ws.mode)?;
    if ws.mode == OutputMode::Table {
        if apply {
            print_success(&format!("Applied {} weight update(s)", records.len()));
        } else {
            print_warn("Dry run: re-run with --apply to write these weights");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_optimize(
    ws: &Workspace,
    periods: &[String],
    n_samples: usize,
    seed: Option<u64>,
    min_confidence: f64,
    top: usize,
    promote_best: bool,
    export_toml: Option<&Path>,
) -> anyhow::Result<()> {
    let periods = ws.resolve_periods(periods)?;
    let (window, cache) = ws.load_window(&periods)?;
    let baseline = ws.store.get_weights()?;

    let mut agents: Vec<&str> = baseline.keys().map(String::as_str).collect();
    for entry in window.iter().flat_map(|p| &p.entries) {
        for signal in &entry.signals {
            if !agents.contains(&signal.agent.as_str()) {
                agents.push(signal.agent.as_str());
            }
        }
    }
    let space = ws.config.optimizer.search_space(agents)?;

    let seed = seed.unwrap_or_else(|| {
        let seed: u64 = rand::random();
        info!(seed, "no optimizer seed configured, drew one");
        seed
    });

    let mut optimizer =
        WeightOptimizer::new(ws.aggregator.clone(), space, baseline, &cache, seed)
            .with_progress_every(ws.config.optimizer.progress_every);
    let results = optimizer.run_optimization(n_samples, &window, min_confidence)?;
    let Some(best) = results.first() else {
        anyhow::bail!("optimizer produced no candidates");
    };

    let shown = &results[..top.min(results.len())];
    match ws.mode {
        OutputMode::Json => print_item(&shown)?,
        OutputMode::Table => {
            let rows: Vec<OptimizationRow> = shown.iter().map(OptimizationRow::from).collect();
            print_items(&rows, ws.mode)?;
            print_kv("Seed", &seed.to_string());
            if let Some(gain) = improvement_over_baseline(&results) {
                print_kv("Improvement over baseline", &format!("{:+.1} pts", gain * 100.0));
            }
        }
    }

    if let Some(path) = export_toml {
        export_weights(path, &best.weights)?;
        if ws.mode == OutputMode::Table {
            print_success(&format!("Wrote {}", path.display()));
        }
    }

    if promote_best {
        let records = promote(&ws.store, best, &window_label(&periods))?;
        if ws.mode == OutputMode::Table {
            print_success(&format!(
                "Promoted candidate {} ({} agents)",
                best.candidate,
                records.len()
            ));
        }
    }
    Ok(())
}

/// Write `weights` as a `[default_weights]` table loadable as a config file
fn export_weights(path: &Path, weights: &WeightMap) -> PropcalResult<()> {
    let body = toml::to_string_pretty(&WeightsExport { default_weights: weights })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(())
}

fn run_weights(ws: &Workspace, cmd: &WeightsCommands) -> anyhow::Result<()> {
    match cmd {
        WeightsCommands::Show => {
            let rows: Vec<WeightRow> = ws
                .store
                .get_weights()?
                .into_iter()
                .map(|(agent, weight)| WeightRow {
                    agent,
                    weight: format!("{weight:.3}"),
                })
                .collect();
            print_items(&rows, ws.mode)
        }
        WeightsCommands::History { agent, limit } => {
            let records = ws.store.history(agent.as_deref())?;
            let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
            let recent = &records[skip..];
            match ws.mode {
                OutputMode::Json => print_item(&recent),
                OutputMode::Table => {
                    let rows: Vec<HistoryRow> = recent.iter().map(HistoryRow::from).collect();
                    print_items(&rows, ws.mode)
                }
            }
        }
        WeightsCommands::Reset { period } => {
            let records = ws.store.reset_to_defaults(&ws.config.seed_weights(), period)?;
            let rows: Vec<AdjustmentRow> = records.iter().map(AdjustmentRow::from).collect();
            print_items(&rows, ws.mode)?;
            if ws.mode == OutputMode::Table {
                print_success(&format!("Reset {} agent weight(s)", records.len()));
            }
            Ok(())
        }
    }
}
