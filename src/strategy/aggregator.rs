//! Confidence Aggregator
//!
//! Merges per-agent signals into one final confidence per prop:
//! 1. Each non-neutral agent adds `±(score - 50) × weight` to a 50 baseline
//!    (positive when it agrees with the bet direction, negative otherwise).
//! 2. The weighted sum is clamped to [0, 100].
//! 3. A bounded agreement adjustment is applied: unanimous agreement from a
//!    handful of agents is marked down slightly (groupthink), while a mixed
//!    field that still favours the bet is marked up slightly.
//!
//! Agents with no opinion contribute nothing and are recorded as neutral.
//! If every agent is neutral the confidence is exactly 50 and the analysis
//! is flagged `low_confidence`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    weight_for, AgentContribution, AgentSignal, Alignment, Prop, PropAnalysis, WeightMap,
    NEUTRAL_SCORE,
};

/// How contributions are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Sum of weighted contributions added to the baseline
    #[default]
    Sum,
    /// Weighted contributions divided by the total active weight
    WeightedAverage,
}

/// Aggregator tuning. The agreement constants were tuned empirically and are
/// expected to be overridden from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub mode: AggregationMode,
    /// Agreement ratio at or above which groupthink is suspected
    #[serde(default = "default_high_agreement")]
    pub high_agreement_ratio: f64,
    /// Active agent count below which unanimous agreement is penalised
    #[serde(default = "default_small_sample")]
    pub small_sample_agents: usize,
    /// Agreement ratio at or below which the field counts as mixed
    #[serde(default = "default_mixed_agreement")]
    pub mixed_agreement_ratio: f64,
    /// Points removed for suspected groupthink
    #[serde(default = "default_groupthink_penalty")]
    pub groupthink_penalty: f64,
    /// Points added when a mixed field still favours the bet
    #[serde(default = "default_disagreement_bonus")]
    pub disagreement_bonus: f64,
    /// Hard bound on the adjustment magnitude
    #[serde(default = "default_max_adjustment")]
    pub max_adjustment: f64,
}

fn default_high_agreement() -> f64 {
    0.85
}

fn default_small_sample() -> usize {
    4
}

fn default_mixed_agreement() -> f64 {
    0.6
}

fn default_groupthink_penalty() -> f64 {
    3.0
}

fn default_disagreement_bonus() -> f64 {
    2.0
}

fn default_max_adjustment() -> f64 {
    5.0
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::Sum,
            high_agreement_ratio: default_high_agreement(),
            small_sample_agents: default_small_sample(),
            mixed_agreement_ratio: default_mixed_agreement(),
            groupthink_penalty: default_groupthink_penalty(),
            disagreement_bonus: default_disagreement_bonus(),
            max_adjustment: default_max_adjustment(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.high_agreement_ratio) {
            errors.push("aggregator.high_agreement_ratio must be between 0 and 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.mixed_agreement_ratio) {
            errors.push("aggregator.mixed_agreement_ratio must be between 0 and 1".to_string());
        }
        if self.mixed_agreement_ratio >= self.high_agreement_ratio {
            errors.push(
                "aggregator.mixed_agreement_ratio must be below high_agreement_ratio".to_string(),
            );
        }
        if !(0.0..=5.0).contains(&self.max_adjustment) {
            errors.push("aggregator.max_adjustment must be between 0 and 5".to_string());
        }
        if self.groupthink_penalty < 0.0 || self.disagreement_bonus < 0.0 {
            errors.push("aggregator penalty and bonus must be non-negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Stateless aggregator; safe to share across evaluations.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceAggregator {
    config: AggregatorConfig,
}

impl ConfidenceAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Analyse one prop against its agent signals and the given weights.
    pub fn analyze(&self, prop: &Prop, signals: &[AgentSignal], weights: &WeightMap) -> PropAnalysis {
        let mut contributions = Vec::with_capacity(signals.len());
        let mut weighted_sum = 0.0;
        let mut active_weight = 0.0;
        let mut active = 0usize;
        let mut aligned = 0usize;

        for signal in signals {
            let weight = weight_for(weights, &signal.agent);
            let alignment = signal.alignment_with(prop.direction);
            let edge = signal.score - NEUTRAL_SCORE;
            let contribution = match alignment {
                Alignment::Aligned => edge * weight,
                Alignment::Opposed => -edge * weight,
                Alignment::Neutral => 0.0,
            };

            if alignment != Alignment::Neutral {
                active += 1;
                active_weight += weight;
                weighted_sum += contribution;
                if alignment == Alignment::Aligned {
                    aligned += 1;
                }
            }

            contributions.push(AgentContribution {
                agent: signal.agent.clone(),
                weight,
                raw_score: signal.score,
                direction: signal.direction,
                alignment,
                contribution,
            });
        }

        if active == 0 {
            debug!(prop = %prop.label(), "all agents neutral, defaulting to 50");
            return PropAnalysis {
                prop: prop.clone(),
                signals: signals.to_vec(),
                confidence: NEUTRAL_SCORE,
                raw_confidence: NEUTRAL_SCORE,
                agreement_adjustment: 0.0,
                agreement_ratio: None,
                active_agents: 0,
                low_confidence: true,
                contributions,
            };
        }

        let shift = match self.config.mode {
            AggregationMode::Sum => weighted_sum,
            AggregationMode::WeightedAverage if active_weight > 0.0 => weighted_sum / active_weight,
            AggregationMode::WeightedAverage => 0.0,
        };
        let raw_confidence = (NEUTRAL_SCORE + shift).clamp(0.0, 100.0);

        let ratio = aligned as f64 / active as f64;
        let adjustment = self.agreement_adjustment(ratio, active, raw_confidence);
        let confidence = (raw_confidence + adjustment).clamp(0.0, 100.0);

        debug!(
            prop = %prop.label(),
            raw_confidence,
            adjustment,
            confidence,
            active,
            aligned,
            "aggregated prop"
        );

        PropAnalysis {
            prop: prop.clone(),
            signals: signals.to_vec(),
            confidence,
            raw_confidence,
            agreement_adjustment: adjustment,
            agreement_ratio: Some(ratio),
            active_agents: active,
            low_confidence: false,
            contributions,
        }
    }

    /// Bounded nudge based on how unanimous the active agents are.
    fn agreement_adjustment(&self, ratio: f64, active: usize, raw_confidence: f64) -> f64 {
        let cfg = &self.config;
        let adjustment = if ratio >= cfg.high_agreement_ratio && active < cfg.small_sample_agents {
            -cfg.groupthink_penalty
        } else if ratio <= cfg.mixed_agreement_ratio && active >= 2 && raw_confidence > NEUTRAL_SCORE
        {
            // Stronger-weighted agents carried a split field in the bet's favour
            cfg.disagreement_bonus
        } else {
            0.0
        };
        adjustment.clamp(-cfg.max_adjustment, cfg.max_adjustment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BetDirection, SignalDirection};

    fn love_over() -> Prop {
        Prop::new("Jordan Love", "GB", "CHI", "Pass Yds", 250.5, BetDirection::Over, true)
    }

    fn weights(pairs: &[(&str, f64)]) -> WeightMap {
        pairs.iter().map(|(a, w)| (a.to_string(), *w)).collect()
    }

    fn signal(agent: &str, score: f64, direction: SignalDirection) -> AgentSignal {
        AgentSignal::new(agent, score, direction)
    }

    #[test]
    fn dvoa_drives_confidence_and_injury_is_neutral() {
        let aggregator = ConfidenceAggregator::default();
        let analysis = aggregator.analyze(
            &love_over(),
            &[
                signal("DVOA", 70.0, SignalDirection::Over),
                signal("Injury", 50.0, SignalDirection::None),
            ],
            &weights(&[("DVOA", 2.0), ("Injury", 3.0)]),
        );

        assert!(analysis.confidence > 50.0);
        let injury = analysis.contribution("Injury").unwrap();
        assert_eq!(injury.contribution, 0.0);
        assert_eq!(injury.alignment, Alignment::Neutral);

        let dvoa = analysis.contribution("DVOA").unwrap();
        assert!(dvoa.is_aligned());
        assert_eq!(dvoa.contribution, 40.0);
        assert_eq!(analysis.raw_confidence, 90.0);
        assert_eq!(analysis.active_agents, 1);
    }

    #[test]
    fn all_neutral_is_exactly_fifty() {
        let aggregator = ConfidenceAggregator::default();
        let analysis = aggregator.analyze(
            &love_over(),
            &[
                signal("DVOA", 50.0, SignalDirection::Over),
                signal("Injury", 85.0, SignalDirection::None),
            ],
            &weights(&[("DVOA", 2.0), ("Injury", 3.0)]),
        );

        assert_eq!(analysis.confidence, 50.0);
        assert!(analysis.low_confidence);
        assert_eq!(analysis.agreement_ratio, None);
        assert!(!analysis.meets(55.0));
    }

    #[test]
    fn no_signals_is_degenerate() {
        let analysis = ConfidenceAggregator::default().analyze(&love_over(), &[], &WeightMap::new());
        assert_eq!(analysis.confidence, 50.0);
        assert!(analysis.low_confidence);
    }

    #[test]
    fn opposing_agent_pulls_confidence_down() {
        let aggregator = ConfidenceAggregator::default();
        let analysis = aggregator.analyze(
            &love_over(),
            &[signal("Matchup", 80.0, SignalDirection::Under)],
            &weights(&[("Matchup", 1.0)]),
        );
        // 50 - 30, then groupthink does not apply (ratio 0)
        assert_eq!(analysis.raw_confidence, 20.0);
        assert_eq!(analysis.contribution("Matchup").unwrap().alignment, Alignment::Opposed);
    }

    #[test]
    fn confidence_is_clamped() {
        let aggregator = ConfidenceAggregator::default();
        let signals = vec![
            signal("A", 100.0, SignalDirection::Over),
            signal("B", 100.0, SignalDirection::Over),
            signal("C", 100.0, SignalDirection::Over),
            signal("D", 100.0, SignalDirection::Over),
        ];
        let high = aggregator.analyze(&love_over(), &signals, &weights(&[("A", 5.0), ("B", 5.0)]));
        assert_eq!(high.confidence, 100.0);

        let mut under = love_over();
        under.direction = BetDirection::Under;
        let low = aggregator.analyze(&under, &signals, &weights(&[("A", 5.0)]));
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn unanimous_small_field_gets_groupthink_penalty() {
        let aggregator = ConfidenceAggregator::default();
        let analysis = aggregator.analyze(
            &love_over(),
            &[
                signal("DVOA", 55.0, SignalDirection::Over),
                signal("Trend", 55.0, SignalDirection::Over),
            ],
            &weights(&[("DVOA", 1.0), ("Trend", 1.0)]),
        );
        assert_eq!(analysis.raw_confidence, 60.0);
        assert_eq!(analysis.agreement_adjustment, -3.0);
        assert_eq!(analysis.confidence, 57.0);
    }

    #[test]
    fn mixed_field_favouring_bet_gets_bonus() {
        let aggregator = ConfidenceAggregator::default();
        let analysis = aggregator.analyze(
            &love_over(),
            &[
                signal("Injury", 70.0, SignalDirection::Over),
                signal("Trend", 55.0, SignalDirection::Under),
                signal("Weather", 55.0, SignalDirection::Under),
            ],
            &weights(&[("Injury", 3.0), ("Trend", 1.0), ("Weather", 1.0)]),
        );
        // 50 + 60 - 5 - 5 = 100 clamped, bonus cannot push past 100
        assert_eq!(analysis.agreement_adjustment, 2.0);
        assert_eq!(analysis.confidence, 100.0);
    }

    #[test]
    fn adjustment_is_bounded_by_config() {
        let aggregator = ConfidenceAggregator::new(AggregatorConfig {
            groupthink_penalty: 20.0,
            max_adjustment: 5.0,
            ..AggregatorConfig::default()
        });
        let analysis = aggregator.analyze(
            &love_over(),
            &[signal("DVOA", 60.0, SignalDirection::Over)],
            &weights(&[("DVOA", 1.0)]),
        );
        assert_eq!(analysis.agreement_adjustment, -5.0);
    }

    #[test]
    fn weighted_average_mode_normalises_by_active_weight() {
        let aggregator = ConfidenceAggregator::new(AggregatorConfig {
            mode: AggregationMode::WeightedAverage,
            ..AggregatorConfig::default()
        });
        let signals = [
            signal("DVOA", 70.0, SignalDirection::Over),
            signal("Matchup", 60.0, SignalDirection::Under),
            signal("Volume", 60.0, SignalDirection::Over),
            signal("Trend", 60.0, SignalDirection::Over),
        ];
        let analysis = aggregator.analyze(
            &love_over(),
            &signals,
            &weights(&[("DVOA", 2.0), ("Matchup", 1.0), ("Volume", 1.0), ("Trend", 1.0)]),
        );
        // (40 - 10 + 10 + 10) / 5 = 10
        assert!((analysis.raw_confidence - 60.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_agents_use_neutral_weight() {
        let analysis = ConfidenceAggregator::default().analyze(
            &love_over(),
            &[signal("Rookie", 60.0, SignalDirection::Over)],
            &WeightMap::new(),
        );
        assert_eq!(analysis.contribution("Rookie").unwrap().weight, 1.0);
        assert_eq!(analysis.raw_confidence, 60.0);
    }

    #[test]
    fn config_validation_catches_inverted_thresholds() {
        let cfg = AggregatorConfig {
            mixed_agreement_ratio: 0.9,
            ..AggregatorConfig::default()
        };
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("mixed_agreement_ratio")));
    }
}
