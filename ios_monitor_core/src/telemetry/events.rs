use std::collections::HashMap;

use super::{
    node::Node,
    snapshot::{format_clock, GoalEvent, Side},
    ParseFailure,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    Goal,
    OwnGoal,
    Other,
}

impl EventKind {
    fn parse(tag: &str) -> Self {
        let normalized: String = tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "GOAL" => Self::Goal,
            "OWNGOAL" => Self::OwnGoal,
            _ => Self::Other,
        }
    }
}

/// One entry of a match event list.
#[derive(Debug, Clone)]
pub(crate) struct MatchEvent {
    pub second: u64,
    pub kind: EventKind,
    pub team: Option<Side>,
    pub period: Option<String>,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub player1_name: Option<String>,
    pub player2_name: Option<String>,
    path: String,
}

pub(crate) fn read_events(list: &Node) -> Result<Vec<MatchEvent>, ParseFailure> {
    list.items()?
        .into_iter()
        .map(|entry| {
            let entry = entry.object()?;
            let team = entry.get("team");
            Ok(MatchEvent {
                second: entry.get("second").opt_u64()?.unwrap_or_default(),
                kind: entry
                    .get("event")
                    .opt_str()?
                    .map_or(EventKind::Other, EventKind::parse),
                team: team.opt_str()?.and_then(Side::parse),
                period: entry.get("period").opt_str()?.map(str::to_owned),
                player1: entry.get("player1SteamId").opt_id()?,
                player2: entry.get("player2SteamId").opt_id()?,
                player1_name: entry.get("player1Name").opt_str()?.map(str::to_owned),
                player2_name: entry.get("player2Name").opt_str()?.map(str::to_owned),
                path: team.path().to_owned(),
            })
        })
        .collect()
}

/// Timestamp of the chronologically last event.
pub(crate) fn latest_second(events: &[MatchEvent]) -> Option<u64> {
    events.iter().map(|e| e.second).max()
}

/// Period label of the last event that carries one, in list order.
pub(crate) fn latest_period(events: &[MatchEvent]) -> Option<&str> {
    events.iter().rev().find_map(|e| e.period.as_deref())
}

/// Elapsed match time. An explicit value always wins. Otherwise the latest
/// event's timestamp is used, unless the match has ended (`end` set and
/// non-zero) and `end - start` is no later than that timestamp.
pub(crate) fn resolve_elapsed(
    explicit: Option<u64>,
    events: &[MatchEvent],
    start: Option<u64>,
    end: Option<u64>,
) -> u64 {
    if let Some(seconds) = explicit {
        return seconds;
    }

    let from_events = latest_second(events);
    let duration = match (start, end) {
        (Some(start), Some(end)) if end > 0 => end.checked_sub(start),
        _ => None,
    };

    match (duration, from_events) {
        (Some(duration), Some(latest)) if duration <= latest => duration,
        (Some(duration), None) => duration,
        (_, latest) => latest.unwrap_or_default(),
    }
}

fn display_name(
    id: Option<&str>,
    fallback: Option<&str>,
    names: &HashMap<String, String>,
) -> Option<String> {
    let id = id.map(str::trim).filter(|id| !id.is_empty());
    id.and_then(|id| names.get(id).cloned())
        .or_else(|| fallback.map(str::to_owned))
        .or_else(|| id.map(str::to_owned))
}

/// Scoring events, in list order. Names are looked up by player id, falling
/// back to any name carried on the event and then to the raw id.
pub(crate) fn goal_events(
    events: &[MatchEvent],
    names: &HashMap<String, String>,
) -> Result<Vec<GoalEvent>, ParseFailure> {
    events
        .iter()
        .filter(|e| e.kind != EventKind::Other)
        .map(|e| {
            let team = e.team.ok_or_else(|| ParseFailure::FieldMissing {
                path: e.path.clone(),
            })?;
            let own_goal = e.kind == EventKind::OwnGoal;
            Ok(GoalEvent {
                time: format_clock(e.second),
                second: e.second,
                side: if own_goal { team.opponent() } else { team },
                scorer: display_name(
                    e.player1.as_deref(),
                    e.player1_name.as_deref(),
                    names,
                )
                .unwrap_or_else(|| "Unknown".into()),
                assist: display_name(e.player2.as_deref(), e.player2_name.as_deref(), names),
                own_goal,
            })
        })
        .collect()
}

pub(crate) fn tally(goals: &[GoalEvent]) -> (u32, u32) {
    goals.iter().fold((0, 0), |(home, away), goal| match goal.side {
        Side::Home => (home + 1, away),
        Side::Away => (home, away + 1),
    })
}
