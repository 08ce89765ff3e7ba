use super::flat::FlatCommon;
use crate::telemetry::{
    events,
    node::Node,
    snapshot::{format_clock, MatchSnapshot},
    ParseFailure,
};

/// Team names plus an event list, no explicit score. Goals are counted from
/// the events and the clock comes from the latest one.
pub(super) fn extract(root: &Node) -> Result<MatchSnapshot, ParseFailure> {
    let team_home = root.get("teamNameHome").str()?.to_owned();
    let team_away = root.get("teamNameAway").str()?.to_owned();

    let common = FlatCommon::read(root)?;
    let goals = events::goal_events(&common.events, &common.names)?;
    let (goals_home, goals_away) = events::tally(&goals);
    let elapsed_seconds = common.elapsed();

    let period = match root.get("matchPeriod").opt_str()? {
        Some(period) => period.to_owned(),
        None => events::latest_period(&common.events)
            .unwrap_or("N/A")
            .to_owned(),
    };

    Ok(MatchSnapshot {
        period,
        elapsed_seconds,
        time_display: format_clock(elapsed_seconds),
        map_name: common.map_name,
        format: common.format,
        team_home,
        team_away,
        code_home: common.code_home,
        code_away: common.code_away,
        goals_home,
        goals_away,
        active_players: common.active_players,
        max_players: common.max_players,
        goals,
        rosters: common.rosters,
    })
}
