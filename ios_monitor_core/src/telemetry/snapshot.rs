use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// Reads the side labels servers use ("home"/"away", any case).
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "home" => Some(Self::Home),
            "away" => Some(Self::Away),
            _ => None,
        }
    }

    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Home => Self::Away,
            Self::Away => Self::Home,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Away => write!(f, "away"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalEvent {
    /// `M:SS`
    pub time: String,
    pub second: u64,
    pub side: Side,
    pub scorer: String,
    pub assist: Option<String>,
    pub own_goal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub name: String,
    pub position: String,
    pub steam_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rosters {
    pub home: Vec<RosterEntry>,
    pub away: Vec<RosterEntry>,
}

impl Rosters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.home.is_empty() && self.away.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.home.len() + self.away.len()
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec<RosterEntry> {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }
}

/// Schema independent view of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSnapshot {
    pub period: String,
    pub elapsed_seconds: u64,
    pub time_display: String,
    pub map_name: Option<String>,
    /// e.g. `8v8`
    pub format: Option<String>,
    pub team_home: String,
    pub team_away: String,
    pub code_home: Option<String>,
    pub code_away: Option<String>,
    pub goals_home: u32,
    pub goals_away: u32,
    pub active_players: u32,
    pub max_players: Option<u32>,
    pub goals: Vec<GoalEvent>,
    pub rosters: Option<Rosters>,
}

impl MatchSnapshot {
    /// Whether the ball is in play.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        matches!(self.period.as_str(), "FIRST HALF" | "SECOND HALF")
    }
}

/// `M:SS`, minutes unpadded.
#[must_use]
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Reads `M:SS` (or `MM:SS`) back into seconds.
#[must_use]
pub fn parse_clock(display: &str) -> Option<u64> {
    let (minutes, seconds) = display.trim().split_once(':')?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    minutes.checked_mul(60)?.checked_add(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(610), "10:10");
        assert_eq!(format_clock(5400), "90:00");
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock("10:10"), Some(610));
        assert_eq!(parse_clock(" 01:05 "), Some(65));
        assert_eq!(parse_clock("1:75"), None);
        assert_eq!(parse_clock("soon"), None);
        assert_eq!(parse_clock("307445734561825861:00"), None);
        assert_eq!(parse_clock("307445734561825860:15"), Some(u64::MAX));
    }

    #[test]
    fn side_labels() {
        assert_eq!(Side::parse("HOME"), Some(Side::Home));
        assert_eq!(Side::parse("away"), Some(Side::Away));
        assert_eq!(Side::parse("spectator"), None);
        assert_eq!(Side::Home.opponent(), Side::Away);
    }
}
