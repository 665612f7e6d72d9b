//! Bounded weight search space
//!
//! Each agent gets an inclusive `[min, max]` range; candidates draw every
//! weight independently and uniformly from its range.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::WeightMap;
use crate::error::{PropcalError, Result};

/// Inclusive weight range for one agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightRange {
    pub min: f64,
    pub max: f64,
}

impl WeightRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, agent: &str) -> Result<()> {
        if !self.min.is_finite() || self.min <= 0.0 {
            return Err(PropcalError::InvalidWeight {
                agent: agent.to_string(),
                value: self.min,
            });
        }
        if !self.max.is_finite() || self.min > self.max {
            return Err(PropcalError::InvalidWeightRange {
                agent: agent.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl Default for WeightRange {
    fn default() -> Self {
        Self { min: 0.1, max: 5.0 }
    }
}

/// Validated per-agent ranges, iterated in agent-name order
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    ranges: BTreeMap<String, WeightRange>,
}

impl SearchSpace {
    /// Build a search space. An empty space or a malformed range is a hard error.
    pub fn new(ranges: BTreeMap<String, WeightRange>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(PropcalError::EmptySearchSpace);
        }
        for (agent, range) in &ranges {
            range.validate(agent)?;
        }
        Ok(Self { ranges })
    }

    /// Same range for every agent
    pub fn uniform<I, S>(agents: I, range: WeightRange) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(agents.into_iter().map(|a| (a.into(), range)).collect())
    }

    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }

    pub fn range(&self, agent: &str) -> Option<&WeightRange> {
        self.ranges.get(agent)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Draw one weight per agent. Draw order is agent-name order, so a
    /// seeded rng gives reproducible candidates.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> WeightMap {
        self.ranges
            .iter()
            .map(|(agent, range)| {
                let weight = if range.min == range.max {
                    range.min
                } else {
                    rng.gen_range(range.min..=range.max)
                };
                (agent.clone(), weight)
            })
            .collect()
    }

    /// True when every agent in the space has a weight inside its range
    pub fn admits(&self, weights: &WeightMap) -> bool {
        self.ranges
            .iter()
            .all(|(agent, range)| weights.get(agent).is_some_and(|w| range.contains(*w)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_space_is_rejected() {
        assert!(matches!(
            SearchSpace::new(BTreeMap::new()),
            Err(PropcalError::EmptySearchSpace)
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut ranges = BTreeMap::new();
        ranges.insert("DVOA".to_string(), WeightRange::new(3.0, 1.0));
        assert!(matches!(
            SearchSpace::new(ranges),
            Err(PropcalError::InvalidWeightRange { agent, .. }) if agent == "DVOA"
        ));
    }

    #[test]
    fn non_positive_minimum_is_rejected() {
        let err = SearchSpace::uniform(["Trend"], WeightRange::new(0.0, 1.0)).unwrap_err();
        assert!(matches!(err, PropcalError::InvalidWeight { .. }));
    }

    #[test]
    fn samples_stay_in_range_and_are_reproducible() {
        let mut ranges = BTreeMap::new();
        ranges.insert("DVOA".to_string(), WeightRange::new(1.0, 3.0));
        ranges.insert("Injury".to_string(), WeightRange::new(2.0, 4.0));
        ranges.insert("Pinned".to_string(), WeightRange::new(0.7, 0.7));
        let space = SearchSpace::new(ranges).unwrap();

        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let left = space.sample(&mut a);
            assert!(space.admits(&left));
            assert_eq!(left["Pinned"], 0.7);
            assert_eq!(left, space.sample(&mut b));
        }
    }
}
