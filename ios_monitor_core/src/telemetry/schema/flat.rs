use std::collections::HashMap;

use crate::telemetry::{
    events::{self, MatchEvent},
    node::Node,
    roster,
    snapshot::{format_clock, parse_clock, MatchSnapshot, Rosters},
    ParseFailure,
};

/// Fields the flat and event-log layouts share.
pub(super) struct FlatCommon {
    pub events: Vec<MatchEvent>,
    pub rosters: Option<Rosters>,
    pub names: HashMap<String, String>,
    pub explicit_seconds: Option<u64>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub map_name: Option<String>,
    pub format: Option<String>,
    pub code_home: Option<String>,
    pub code_away: Option<String>,
    pub active_players: u32,
    pub max_players: Option<u32>,
}

impl FlatCommon {
    pub(super) fn read(root: &Node) -> Result<Self, ParseFailure> {
        let events = events::read_events(&root.get("matchEvents"))?;

        let home = root.get("teamLineupHome");
        let away = root.get("teamLineupAway");
        let rosters = if home.exists() || away.exists() {
            Some(Rosters {
                home: roster::lineup(&home)?,
                away: roster::lineup(&away)?,
            })
        } else {
            None
        };
        let names = rosters
            .as_ref()
            .map(roster::name_lookup)
            .unwrap_or_default();

        let explicit_seconds = match root.get("matchSeconds").opt_u64()? {
            Some(seconds) => Some(seconds),
            None => {
                let display = root.get("matchDisplaySeconds");
                display
                    .opt_str()?
                    .map(|d| {
                        parse_clock(d).ok_or_else(|| ParseFailure::TypeMismatch {
                            path: display.path().to_owned(),
                            expected: "M:SS clock",
                        })
                    })
                    .transpose()?
            }
        };

        let active_players = match &rosters {
            Some(rosters) => u32::try_from(rosters.len()).unwrap_or(u32::MAX),
            None => root
                .get("serverPlayerCount")
                .opt_count()?
                .unwrap_or_default(),
        };

        Ok(Self {
            events,
            rosters,
            names,
            explicit_seconds,
            start: root.get("startTime").opt_u64()?,
            end: root.get("endTime").opt_u64()?,
            map_name: root.get("mapName").opt_str()?.map(str::to_owned),
            format: root
                .get("matchFormat")
                .opt_count()?
                .map(|n| format!("{n}v{n}")),
            code_home: root.get("teamCodeHome").opt_str()?.map(str::to_owned),
            code_away: root.get("teamCodeAway").opt_str()?.map(str::to_owned),
            active_players,
            max_players: root.get("serverMaxPlayers").opt_count()?,
        })
    }

    pub(super) fn elapsed(&self) -> u64 {
        events::resolve_elapsed(self.explicit_seconds, &self.events, self.start, self.end)
    }
}

/// Score, team names and timers as top-level fields.
pub(super) fn extract(root: &Node) -> Result<MatchSnapshot, ParseFailure> {
    let period = root.get("matchPeriod").str()?.to_owned();
    let team_home = root.get("teamNameHome").str()?.to_owned();
    let team_away = root.get("teamNameAway").str()?.to_owned();
    let goals_home = root.get("matchGoalsHome").count()?;
    let goals_away = root.get("matchGoalsAway").count()?;

    let common = FlatCommon::read(root)?;
    let goals = events::goal_events(&common.events, &common.names)?;
    let elapsed_seconds = common.elapsed();

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
