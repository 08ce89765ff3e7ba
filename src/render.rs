use std::fmt::Write;

use ios_monitor_core::{
    server::{ServerSnapshot, ServerStatus},
    telemetry::MatchSnapshot,
};

/// Longest reply printed by the `rcon` command.
pub const RCON_OUTPUT_LIMIT: usize = 1500;

/// Cuts `text` to at most `limit` characters, marking the cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        None => text.to_owned(),
        Some((cut, _)) => format!("{}\n... (truncated)", &text[..cut]),
    }
}

pub fn summary(snapshots: &[ServerSnapshot]) -> String {
    let online = snapshots.iter().filter(|s| s.status.is_online()).count();
    let players: u32 = snapshots.iter().filter_map(ServerSnapshot::players).sum();
    let active = snapshots
        .iter()
        .filter_map(|s| s.match_info.as_ref())
        .filter(|m| m.in_progress())
        .count();

    format!(
        "{online}/{} servers online, {players} players, {active} active match(es)",
        snapshots.len()
    )
}

fn match_block(out: &mut String, info: &MatchSnapshot) {
    let code = |code: &Option<String>| {
        code.as_deref()
            .map(|c| format!(" [{c}]"))
            .unwrap_or_default()
    };
    let _ = writeln!(
        out,
        "  {}{} {} - {} {}{}",
        info.team_home,
        code(&info.code_home),
        info.goals_home,
        info.goals_away,
        info.team_away,
        code(&info.code_away),
    );
    let _ = writeln!(out, "  {} {}", info.period, info.time_display);
    for goal in &info.goals {
        let assist = goal
            .assist
            .as_deref()
            .map(|a| format!(" (assist {a})"))
            .unwrap_or_default();
        let own = if goal.own_goal { " OG" } else { "" };
        let _ = writeln!(
            out,
            "    {} {} {}{own}{assist}",
            goal.time, goal.side, goal.scorer
        );
    }
    if let Some(rosters) = &info.rosters {
        for (side, players) in [("Home", &rosters.home), ("Away", &rosters.away)] {
            let names: Vec<_> = players
                .iter()
                .map(|p| format!("{} ({})", p.name, p.position))
                .collect();
            let _ = writeln!(out, "    {side}: {}", names.join(", "));
        }
    }
}

pub fn server_block(snapshot: &ServerSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}) - {}",
        snapshot.name, snapshot.address, snapshot.status
    );

    if let Some(descriptor) = &snapshot.descriptor {
        let _ = writeln!(
            out,
            "  {} | {} | {}/{} players",
            descriptor.server_name, descriptor.map_name, descriptor.players, descriptor.max_players
        );
    }
    if let Some(info) = &snapshot.match_info {
        match_block(&mut out, info);
    }
    if snapshot.status != ServerStatus::OnlineWithTelemetry {
        if let Some(detail) = &snapshot.detail {
            let _ = writeln!(out, "  {detail}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé\n... (truncated)");
        let long = truncate(&"x".repeat(1600), RCON_OUTPUT_LIMIT);
        assert_eq!(long.lines().next().map(str::len), Some(1500));
    }
}
