//! Per-agent performance over graded predictions
//!
//! Only decided picks (WIN/LOSS) count. For each agent:
//! - aligned: agent direction matched the pick; wins/losses tallied there
//! - accuracy: wins / aligned
//! - avg_confidence: mean raw score when aligned, scaled to 0-1
//! - overconfidence: avg_confidence - accuracy
//! - contrarian value: share of disagreements where the pick lost
//!
//! Neutral signals are never aligned and never disagree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{AgentPerformanceStats, Alignment, GradeResult, GradedPrediction};

#[derive(Default)]
struct Tally {
    aligned: u32,
    wins: u32,
    losses: u32,
    score_sum: f64,
    disagreed: u32,
    contrarian_correct: u32,
}

/// Compute AgentPerformanceStats for every agent seen in `graded`
pub fn analyze_agent_performance(
    graded: &[GradedPrediction],
) -> BTreeMap<String, AgentPerformanceStats> {
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    for g in graded.iter().filter(|g| g.result.is_decided()) {
        let won = g.result == GradeResult::Win;
        for c in &g.prediction.contributions {
            let tally = tallies.entry(c.agent.clone()).or_default();
            match c.alignment {
                Alignment::Aligned => {
                    tally.aligned += 1;
                    tally.score_sum += c.raw_score;
                    if won {
                        tally.wins += 1;
                    } else {
                        tally.losses += 1;
                    }
                }
                Alignment::Opposed => {
                    tally.disagreed += 1;
                    if !won {
                        tally.contrarian_correct += 1;
                    }
                }
                Alignment::Neutral => {}
            }
        }
    }

    tallies
        .into_iter()
        .map(|(agent, t)| {
            let (accuracy, avg_confidence) = if t.aligned > 0 {
                (
                    t.wins as f64 / t.aligned as f64,
                    t.score_sum / t.aligned as f64 / 100.0,
                )
            } else {
                (0.0, 0.0)
            };
            let contrarian_value = if t.disagreed > 0 {
                t.contrarian_correct as f64 / t.disagreed as f64
            } else {
                0.0
            };
            let stats = AgentPerformanceStats {
                aligned: t.aligned,
                wins: t.wins,
                losses: t.losses,
                accuracy,
                avg_confidence,
                overconfidence: if t.aligned > 0 {
                    avg_confidence - accuracy
                } else {
                    0.0
                },
                disagreed: t.disagreed,
                contrarian_value,
            };
            (agent, stats)
        })
        .collect()
}

/// Predicted vs realised win rate within one confidence band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub lower: f64,
    pub upper: f64,
    pub picks: usize,
    pub wins: usize,
    /// Mean final confidence in the band, 0-1
    pub predicted: f64,
    /// Realised win rate in the band
    pub realized: f64,
}

/// Calibration curve of final confidence against outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub buckets: Vec<CalibrationBucket>,
    /// Mean squared error between confidence and outcome
    pub brier_score: f64,
    pub decided: usize,
}

/// Bucket decided picks by final confidence in 10-point bands
pub fn calibration_report(graded: &[GradedPrediction]) -> CalibrationReport {
    const BAND: f64 = 10.0;
    // (picks, wins, confidence sum) per band
    let mut bands = [(0usize, 0usize, 0.0f64); 10];
    let mut brier_sum = 0.0;
    let mut decided = 0usize;

    for g in graded.iter().filter(|g| g.result.is_decided()) {
        let confidence = g.prediction.confidence.clamp(0.0, 100.0);
        let idx = ((confidence / BAND) as usize).min(9);
        let outcome = if g.is_win() { 1.0 } else { 0.0 };
        let p = confidence / 100.0;

        bands[idx].0 += 1;
        if g.is_win() {
            bands[idx].1 += 1;
        }
        bands[idx].2 += p;
        brier_sum += (p - outcome).powi(2);
        decided += 1;
    }

    let buckets = bands
        .iter()
        .enumerate()
        .filter(|(_, (picks, _, _))| *picks > 0)
        .map(|(i, (picks, wins, conf_sum))| CalibrationBucket {
            lower: i as f64 * BAND,
            upper: (i + 1) as f64 * BAND,
            picks: *picks,
            wins: *wins,
            predicted: conf_sum / *picks as f64,
            realized: *wins as f64 / *picks as f64,
        })
        .collect();

    CalibrationReport {
        buckets,
        brier_score: if decided > 0 {
            brier_sum / decided as f64
        } else {
            0.0
        },
        decided,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentContribution, BetDirection, PredictionInput, SignalDirection};

    fn contribution(agent: &str, score: f64, alignment: Alignment) -> AgentContribution {
        AgentContribution {
            agent: agent.to_string(),
            weight: 1.0,
            raw_score: score,
            direction: match alignment {
                Alignment::Aligned => SignalDirection::Over,
                Alignment::Opposed => SignalDirection::Under,
                Alignment::Neutral => SignalDirection::None,
            },
            alignment,
            contribution: 0.0,
        }
    }

    fn graded(
        result: GradeResult,
        confidence: f64,
        contributions: Vec<AgentContribution>,
    ) -> GradedPrediction {
        GradedPrediction {
            prediction: PredictionInput {
                player: "Jordan Love".to_string(),
                stat_type: "Pass Yds".to_string(),
                line: 250.5,
                direction: BetDirection::Over,
                confidence,
                contributions,
            },
            result,
            actual: Some(0.0),
            void_reason: None,
        }
    }

    #[test]
    fn aligned_accuracy_and_overconfidence() {
        let picks = vec![
            graded(GradeResult::Win, 70.0, vec![contribution("DVOA", 80.0, Alignment::Aligned)]),
            graded(GradeResult::Loss, 70.0, vec![contribution("DVOA", 80.0, Alignment::Aligned)]),
            graded(GradeResult::Loss, 70.0, vec![contribution("DVOA", 80.0, Alignment::Aligned)]),
            graded(GradeResult::Win, 70.0, vec![contribution("DVOA", 80.0, Alignment::Aligned)]),
        ];
        let stats = &analyze_agent_performance(&picks)["DVOA"];
        assert_eq!(stats.sample_size(), 4);
        assert_eq!(stats.wins, 2);
        assert!((stats.accuracy - 0.5).abs() < 1e-9);
        assert!((stats.avg_confidence - 0.8).abs() < 1e-9);
        assert!((stats.overconfidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn neutral_and_void_do_not_count() {
        let mut void = graded(GradeResult::Void, 60.0, vec![contribution("DVOA", 70.0, Alignment::Aligned)]);
        void.actual = None;
        let picks = vec![
            void,
            graded(GradeResult::Win, 60.0, vec![contribution("Injury", 50.0, Alignment::Neutral)]),
        ];
        let stats = analyze_agent_performance(&picks);
        assert!(!stats.contains_key("DVOA"));
        let injury = &stats["Injury"];
        assert_eq!(injury.aligned, 0);
        assert_eq!(injury.disagreed, 0);
        assert_eq!(injury.overconfidence, 0.0);
    }

    #[test]
    fn contrarian_value_counts_lost_picks() {
        let picks = vec![
            graded(GradeResult::Loss, 60.0, vec![contribution("Weather", 65.0, Alignment::Opposed)]),
            graded(GradeResult::Loss, 60.0, vec![contribution("Weather", 65.0, Alignment::Opposed)]),
            graded(GradeResult::Win, 60.0, vec![contribution("Weather", 65.0, Alignment::Opposed)]),
        ];
        let stats = &analyze_agent_performance(&picks)["Weather"];
        assert_eq!(stats.disagreed, 3);
        assert!((stats.contrarian_value - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn calibration_buckets_by_confidence() {
        let picks = vec![
            graded(GradeResult::Win, 72.0, vec![]),
            graded(GradeResult::Loss, 78.0, vec![]),
            graded(GradeResult::Win, 100.0, vec![]),
            graded(GradeResult::Void, 55.0, vec![]),
        ];
        let report = calibration_report(&picks);
        assert_eq!(report.decided, 3);
        assert_eq!(report.buckets.len(), 2);

        let seventies = &report.buckets[0];
        assert_eq!(seventies.lower, 70.0);
        assert_eq!(seventies.picks, 2);
        assert!((seventies.realized - 0.5).abs() < 1e-9);
        assert!((seventies.predicted - 0.75).abs() < 1e-9);

        // 100 lands in the top band
        assert_eq!(report.buckets[1].lower, 90.0);

        let expected_brier = ((0.72f64 - 1.0).powi(2) + 0.78f64.powi(2) + 0.0) / 3.0;
        assert!((report.brier_score - expected_brier).abs() < 1e-9);
    }
}
