use crate::telemetry::{
    events,
    node::Node,
    roster,
    snapshot::{format_clock, MatchSnapshot, Side},
    ParseFailure,
};

/// Position of the goal count in a team's `matchTotal.statistics` array.
/// Servers have always written goals here; the `goals` field only exists on
/// some versions.
const GOALS_STAT_INDEX: usize = 12;

struct TeamTotal {
    name: String,
    code: Option<String>,
    goals: u32,
}

fn team_goals(total: &Node) -> Result<u32, ParseFailure> {
    let stats = total.get("statistics");
    let indexed = stats.index(GOALS_STAT_INDEX);
    let from_stats = if indexed.exists() {
        indexed.opt_count()?
    } else {
        None
    };

    match (from_stats, total.get("goals").opt_count()?) {
        (Some(goals), _) if goals > 0 => Ok(goals),
        (_, Some(goals)) => Ok(goals),
        (Some(zero), None) => Ok(zero),
        (None, None) => Err(ParseFailure::FieldMissing {
            path: indexed.path().to_owned(),
        }),
    }
}

fn read_teams(teams: &Node) -> Result<(TeamTotal, TeamTotal), ParseFailure> {
    let mut home = None;
    let mut away = None;

    for team in teams.items()? {
        let total = team.get("matchTotal").object()?;
        let side_node = total.get("side");
        let Some(side) = Side::parse(side_node.str()?) else {
            continue;
        };
        let entry = TeamTotal {
            name: total.get("name").str()?.to_owned(),
            code: total.get("code").opt_str()?.map(str::to_owned),
            goals: team_goals(&total)?,
        };
        match side {
            Side::Home => home = Some(entry),
            Side::Away => away = Some(entry),
        }
    }

    let missing = |side: &str| ParseFailure::FieldMissing {
        path: format!("{}[side={side}]", teams.path()),
    };
    Ok((
        home.ok_or_else(|| missing("home"))?,
        away.ok_or_else(|| missing("away"))?,
    ))
}

/// Everything under `matchData`: match info, per-team totals, events and a
/// player list with per-period data.
pub(super) fn extract(root: &Node) -> Result<MatchSnapshot, ParseFailure> {
    let data = root.get("matchData");
    let info = data.get("matchInfo").object()?;

    let period = match info.get("lastPeriodName").opt_str()? {
        Some(period) => period,
        None => info.get("period").str()?,
    }
    .to_owned();

    let (home, away) = read_teams(&data.get("teams"))?;
    let (rosters, names) = roster::nested_players(&data.get("players"))?;

    let match_events = events::read_events(&data.get("matchEvents"))?;
    let goals = events::goal_events(&match_events, &names)?;
    let elapsed_seconds = events::resolve_elapsed(
        info.get("matchSeconds").opt_u64()?,
        &match_events,
        info.get("startTime").opt_u64()?,
        info.get("endTime").opt_u64()?,
    );

    Ok(MatchSnapshot {
        period,
        elapsed_seconds,
        time_display: format_clock(elapsed_seconds),
        map_name: info.get("mapName").opt_str()?.map(str::to_owned),
        format: info.get("format").opt_count()?.map(|n| format!("{n}v{n}")),
        team_home: home.name,
        team_away: away.name,
        code_home: home.code,
        code_away: away.code,
        goals_home: home.goals,
        goals_away: away.goals,
        active_players: u32::try_from(rosters.len()).unwrap_or(u32::MAX),
        max_players: info.get("maxPlayers").opt_count()?,
        goals,
        rosters: (!rosters.is_empty()).then_some(rosters),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn stats(goals: u64) -> Value {
        let mut stats = vec![0u64; 20];
        stats[GOALS_STAT_INDEX] = goals;
        json!(stats)
    }

    #[test]
    fn goals_come_from_the_statistics_array() {
        let total = json!({"statistics": stats(3), "goals": 1});
        assert_eq!(team_goals(&Node::root(&total)).ok(), Some(3));
    }

    #[test]
    fn zero_statistic_falls_back_to_the_goals_field() {
        let total = json!({"statistics": stats(0), "goals": 2});
        assert_eq!(team_goals(&Node::root(&total)).ok(), Some(2));

        let total = json!({"statistics": stats(0)});
        assert_eq!(team_goals(&Node::root(&total)).ok(), Some(0));

        let total = json!({"statistics": [1, 2, 3]});
        assert!(matches!(
            team_goals(&Node::root(&total)),
            Err(ParseFailure::FieldMissing { ref path }) if path == "statistics[12]"
        ));
    }

    #[test]
    fn period_prefers_last_period_name() {
        let value = json!({"matchData": {
            "matchInfo": {"lastPeriodName": "HALF TIME", "period": 2, "matchSeconds": 2700},
            "teams": [
                {"matchTotal": {"side": "home", "name": "Reds", "statistics": stats(1)}},
                {"matchTotal": {"side": "away", "name": "Blues", "statistics": stats(0)}}
            ]
        }});
        let snapshot = extract(&Node::root(&value)).expect("valid nested payload");
        assert_eq!(snapshot.period, "HALF TIME");
        assert_eq!(snapshot.time_display, "45:00");
        assert_eq!((snapshot.goals_home, snapshot.goals_away), (1, 0));
        assert!(snapshot.rosters.is_none());
    }

    #[test]
    fn missing_away_team() {
        let value = json!({"matchData": {
            "matchInfo": {"period": "FIRST HALF"},
            "teams": [{"matchTotal": {"side": "home", "name": "Reds", "goals": 0}}]
        }});
        let err = extract(&Node::root(&value)).expect_err("one team");
        assert!(matches!(err, ParseFailure::FieldMissing { ref path } if path.contains("away")));
    }
}
