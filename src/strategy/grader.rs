//! Grader
//!
//! Compares picks to actual stats:
//! - OVER wins iff actual > line, UNDER wins iff actual < line
//! - actual == line is a push (VOID)
//! - no actuals record for the player is VOID (likely inactive), never a loss
//! - player present but stat key absent means the player recorded 0
//! - a stat label that cannot be mapped is VOID
//!
//! Stat labels go through an explicit table first and a fuzzy fallback
//! second. Resolutions are memoised because the optimizer grades the same
//! labels thousands of times.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{BetDirection, GradeResult, GradedPrediction, PredictionInput, VoidReason};

use super::actuals::PeriodActuals;

/// Canonical internal stat keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    PassYds,
    PassTds,
    PassAtt,
    PassComp,
    PassInt,
    RushYds,
    RushTds,
    RushAtt,
    RecYds,
    RecTds,
    Receptions,
}

impl StatKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKey::PassYds => "pass_yds",
            StatKey::PassTds => "pass_tds",
            StatKey::PassAtt => "pass_att",
            StatKey::PassComp => "pass_comp",
            StatKey::PassInt => "pass_int",
            StatKey::RushYds => "rush_yds",
            StatKey::RushTds => "rush_tds",
            StatKey::RushAtt => "rush_att",
            StatKey::RecYds => "rec_yds",
            StatKey::RecTds => "rec_tds",
            StatKey::Receptions => "receptions",
        }
    }
}

impl std::fmt::Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream labels with a known canonical key (normalised lowercase)
const STAT_TABLE: &[(&str, StatKey)] = &[
    ("pass yds", StatKey::PassYds),
    ("pass yards", StatKey::PassYds),
    ("passing yards", StatKey::PassYds),
    ("pass tds", StatKey::PassTds),
    ("pass td", StatKey::PassTds),
    ("passing touchdowns", StatKey::PassTds),
    ("pass attempts", StatKey::PassAtt),
    ("pass att", StatKey::PassAtt),
    ("pass completions", StatKey::PassComp),
    ("pass comp", StatKey::PassComp),
    ("completions", StatKey::PassComp),
    ("interceptions", StatKey::PassInt),
    ("pass ints", StatKey::PassInt),
    ("interceptions thrown", StatKey::PassInt),
    ("rush yds", StatKey::RushYds),
    ("rush yards", StatKey::RushYds),
    ("rushing yards", StatKey::RushYds),
    ("rush tds", StatKey::RushTds),
    ("rushing touchdowns", StatKey::RushTds),
    ("rush attempts", StatKey::RushAtt),
    ("rush att", StatKey::RushAtt),
    ("carries", StatKey::RushAtt),
    ("rec yds", StatKey::RecYds),
    ("receiving yards", StatKey::RecYds),
    ("rec tds", StatKey::RecTds),
    ("receiving touchdowns", StatKey::RecTds),
    ("receptions", StatKey::Receptions),
    ("rec", StatKey::Receptions),
];

fn normalize(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Map an upstream label to a canonical key without memoisation
pub fn map_stat_type(label: &str) -> Option<StatKey> {
    let norm = normalize(label);
    if let Some((_, key)) = STAT_TABLE.iter().find(|(name, _)| *name == norm) {
        return Some(*key);
    }
    fuzzy_stat_key(&norm)
}

fn fuzzy_stat_key(norm: &str) -> Option<StatKey> {
    let is_pass = norm.contains("pass");
    let is_rush = norm.contains("rush");
    let is_rec = norm.contains("rec");

    // Combined markets ("rush + rec yds") have no single key
    if [is_pass, is_rush, is_rec].iter().filter(|c| **c).count() > 1 {
        return None;
    }

    if norm.contains("recep") {
        return Some(StatKey::Receptions);
    }

    let yards = norm.contains("yds") || norm.contains("yard");
    let tds = norm.contains("td") || norm.contains("touchdown");
    let attempts = norm.contains("att");
    let completions = norm.contains("comp");

    if is_pass {
        if yards {
            Some(StatKey::PassYds)
        } else if tds {
            Some(StatKey::PassTds)
        } else if attempts {
            Some(StatKey::PassAtt)
        } else if completions {
            Some(StatKey::PassComp)
        } else {
            None
        }
    } else if is_rush {
        if yards {
            Some(StatKey::RushYds)
        } else if tds {
            Some(StatKey::RushTds)
        } else if attempts {
            Some(StatKey::RushAtt)
        } else {
            None
        }
    } else if is_rec {
        if yards {
            Some(StatKey::RecYds)
        } else if tds {
            Some(StatKey::RecTds)
        } else {
            None
        }
    } else {
        None
    }
}

/// Memoising wrapper around `map_stat_type`
#[derive(Debug, Default, Clone)]
pub struct StatKeyResolver {
    cache: HashMap<String, Option<StatKey>>,
}

impl StatKeyResolver {
    pub fn resolve(&mut self, label: &str) -> Option<StatKey> {
        if let Some(hit) = self.cache.get(label) {
            return *hit;
        }
        let key = map_stat_type(label);
        self.cache.insert(label.to_string(), key);
        key
    }

    pub fn cached_labels(&self) -> usize {
        self.cache.len()
    }
}

/// Grades picks against a period's actual stats
#[derive(Debug, Default, Clone)]
pub struct Grader {
    resolver: StatKeyResolver,
    unmappable: BTreeMap<String, u64>,
}

impl Grader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grade each prediction against `actuals`. Pure with respect to its
    /// inputs; only the label memo and data-quality counters change.
    pub fn grade(
        &mut self,
        predictions: &[PredictionInput],
        actuals: &PeriodActuals,
    ) -> Vec<GradedPrediction> {
        predictions
            .iter()
            .map(|p| self.grade_one(p, actuals))
            .collect()
    }

    pub fn grade_one(
        &mut self,
        prediction: &PredictionInput,
        actuals: &PeriodActuals,
    ) -> GradedPrediction {
        let Some(key) = self.resolver.resolve(&prediction.stat_type) else {
            let count = self
                .unmappable
                .entry(prediction.stat_type.clone())
                .or_insert(0);
            *count += 1;
            if *count == 1 {
                warn!(stat_type = %prediction.stat_type, "unmappable stat type, grading VOID");
            }
            return void(prediction, None, VoidReason::UnmappableStatType);
        };

        let Some(stats) = actuals.get(&prediction.player) else {
            debug!(player = %prediction.player, "player missing from actuals, grading VOID");
            return void(prediction, None, VoidReason::PlayerMissing);
        };

        let actual = stats.get(key.as_str()).copied().unwrap_or(0.0);
        GradedPrediction {
            prediction: prediction.clone(),
            result: decide(prediction.direction, actual, prediction.line),
            actual: Some(actual),
            void_reason: if actual == prediction.line {
                Some(VoidReason::Push)
            } else {
                None
            },
        }
    }

    /// Unmappable labels seen so far and how often
    pub fn unmappable_labels(&self) -> &BTreeMap<String, u64> {
        &self.unmappable
    }
}

fn decide(direction: BetDirection, actual: f64, line: f64) -> GradeResult {
    if !actual.is_finite() || !line.is_finite() {
        return GradeResult::Unknown;
    }
    if actual == line {
        return GradeResult::Void;
    }
    let won = match direction {
        BetDirection::Over => actual > line,
        BetDirection::Under => actual < line,
    };
    if won {
        GradeResult::Win
    } else {
        GradeResult::Loss
    }
}

fn void(prediction: &PredictionInput, actual: Option<f64>, reason: VoidReason) -> GradedPrediction {
    GradedPrediction {
        prediction: prediction.clone(),
        result: GradeResult::Void,
        actual,
        void_reason: Some(reason),
    }
}

/// Aggregate counts over a graded set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub player_missing: usize,
    pub unmappable: usize,
    pub unknown: usize,
}

impl GradeSummary {
    pub fn from_graded(graded: &[GradedPrediction]) -> Self {
        let mut summary = Self {
            total: graded.len(),
            ..Self::default()
        };
        for g in graded {
            match (g.result, g.void_reason) {
                (GradeResult::Win, _) => summary.wins += 1,
                (GradeResult::Loss, _) => summary.losses += 1,
                (GradeResult::Void, Some(VoidReason::PlayerMissing)) => summary.player_missing += 1,
                (GradeResult::Void, Some(VoidReason::UnmappableStatType)) => summary.unmappable += 1,
                (GradeResult::Void, _) => summary.pushes += 1,
                (GradeResult::Unknown, _) => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn voids(&self) -> usize {
        self.pushes + self.player_missing + self.unmappable
    }

    /// wins / (wins + losses); voids are excluded
    pub fn win_rate(&self) -> f64 {
        let decided = self.wins + self.losses;
        if decided == 0 {
            0.0
        } else {
            self.wins as f64 / decided as f64
        }
    }
}
