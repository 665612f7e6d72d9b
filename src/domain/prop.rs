use serde::{Deserialize, Serialize};

/// Bet direction on a player prop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetDirection {
    Over,
    Under,
}

impl BetDirection {
    pub fn opposite(&self) -> Self {
        match self {
            BetDirection::Over => BetDirection::Under,
            BetDirection::Under => BetDirection::Over,
        }
    }
}

impl std::fmt::Display for BetDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetDirection::Over => write!(f, "OVER"),
            BetDirection::Under => write!(f, "UNDER"),
        }
    }
}

/// A single player-stat-line proposition.
///
/// Constructed once per analysis pass and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub player: String,
    pub team: String,
    pub opponent: String,
    /// Upstream stat label, e.g. "Pass Yds"
    pub stat_type: String,
    pub line: f64,
    pub direction: BetDirection,
    #[serde(default)]
    pub is_home: bool,
}

impl Prop {
    pub fn new(
        player: impl Into<String>,
        team: impl Into<String>,
        opponent: impl Into<String>,
        stat_type: impl Into<String>,
        line: f64,
        direction: BetDirection,
        is_home: bool,
    ) -> Self {
        Self {
            player: player.into(),
            team: team.into(),
            opponent: opponent.into(),
            stat_type: stat_type.into(),
            line,
            direction,
            is_home,
        }
    }

    /// Short label used in logs and tables
    pub fn label(&self) -> String {
        format!(
            "{} {} {} {}",
            self.player, self.stat_type, self.direction, self.line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_serializes_uppercase() {
        let json = serde_json::to_string(&BetDirection::Over).unwrap();
        assert_eq!(json, "\"OVER\"");
        let parsed: BetDirection = serde_json::from_str("\"UNDER\"").unwrap();
        assert_eq!(parsed, BetDirection::Under);
        assert_eq!(parsed.opposite(), BetDirection::Over);
    }

    #[test]
    fn prop_home_flag_defaults_to_away() {
        let prop: Prop = serde_json::from_str(
            r#"{"player":"Jordan Love","team":"GB","opponent":"CHI",
                "stat_type":"Pass Yds","line":250.5,"direction":"OVER"}"#,
        )
        .unwrap();
        assert!(!prop.is_home);
        assert_eq!(prop.label(), "Jordan Love Pass Yds OVER 250.5");
    }
}
