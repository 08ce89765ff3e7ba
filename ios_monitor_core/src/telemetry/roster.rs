use std::collections::HashMap;

use super::{
    node::Node,
    snapshot::{RosterEntry, Rosters, Side},
    ParseFailure,
};

/// Lineup slots held by bots or nobody carry one of these ids.
const SENTINEL_IDS: &[&str] = &["", "0", "BOT", "SPECTATOR"];

pub(crate) fn is_real_player(id: &str) -> bool {
    let id = id.trim();
    !SENTINEL_IDS.iter().any(|s| s.eq_ignore_ascii_case(id))
}

/// Reads a flat lineup: `[{steamId, name, position}]`.
pub(crate) fn lineup(list: &Node) -> Result<Vec<RosterEntry>, ParseFailure> {
    let mut entries = Vec::new();
    for slot in list.items()? {
        let slot = slot.object()?;
        let Some(steam_id) = slot.get("steamId").opt_id()? else {
            continue;
        };
        if !is_real_player(&steam_id) {
            continue;
        }
        let Some(name) = slot.get("name").opt_str()?.filter(|n| !n.is_empty()) else {
            continue;
        };

        entries.push(RosterEntry {
            name: name.to_owned(),
            position: slot
                .get("position")
                .opt_str()?
                .unwrap_or("N/A")
                .to_owned(),
            steam_id,
        });
    }
    Ok(entries)
}

/// Reads the nested `players` list. Each player's side and position come from
/// their most recent period entry, so someone who switched teams at half
/// time is listed where they are now. Players without period data, or whose
/// latest entry isn't on a team, are left out of the rosters but still get a
/// name for event lookups.
pub(crate) fn nested_players(
    list: &Node,
) -> Result<(Rosters, HashMap<String, String>), ParseFailure> {
    let mut rosters = Rosters::default();
    let mut names = HashMap::new();
    let mut placed: HashMap<String, (Side, usize)> = HashMap::new();

    for player in list.items()? {
        let info = player.get("info").object()?;
        let Some(steam_id) = info.get("steamId").opt_id()? else {
            continue;
        };
        if !is_real_player(&steam_id) {
            continue;
        }
        let name = info.get("name").opt_str()?.unwrap_or("Unknown").to_owned();
        names.insert(steam_id.clone(), name.clone());

        let Some(latest) = player.get("matchPeriodData").items()?.pop() else {
            continue;
        };
        let latest = latest.get("info");
        let Some(side) = latest.get("team").opt_str()?.and_then(Side::parse) else {
            continue;
        };
        let entry = RosterEntry {
            name,
            position: latest
                .get("position")
                .opt_str()?
                .unwrap_or("N/A")
                .to_owned(),
            steam_id: steam_id.clone(),
        };

        // The same account can appear twice after a reconnect; keep the later one.
        if let Some((old_side, idx)) = placed.remove(&steam_id) {
            rosters.side_mut(old_side).remove(idx);
            for (s, i) in placed.values_mut() {
                if *s == old_side && *i > idx {
                    *i -= 1;
                }
            }
        }
        let slot = rosters.side_mut(side);
        placed.insert(steam_id, (side, slot.len()));
        slot.push(entry);
    }

    Ok((rosters, names))
}

pub(crate) fn name_lookup(rosters: &Rosters) -> HashMap<String, String> {
    rosters
        .home
        .iter()
        .chain(&rosters.away)
        .map(|p| (p.steam_id.clone(), p.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sentinels_are_not_players() {
        assert!(!is_real_player("BOT"));
        assert!(!is_real_player("bot"));
        assert!(!is_real_player("0"));
        assert!(!is_real_player("  "));
        assert!(is_real_player("STEAM_0:1:1234"));
    }

    #[test]
    fn flat_lineup_skips_bots_and_empty_slots() {
        let list = json!([
            {"steamId": "STEAM_0:1:1", "name": "Keeper", "position": "GK"},
            {"steamId": "BOT", "name": "Bot01", "position": "LB"},
            {"steamId": "", "name": "", "position": "RB"},
            {"steamId": 76561198000000000u64, "name": "Striker", "position": "CF"},
        ]);
        let entries = lineup(&Node::root(&list)).expect("valid lineup");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Keeper", "Striker"]);
        assert_eq!(entries[1].steam_id, "76561198000000000");
    }

    #[test]
    fn nested_players_use_latest_period() {
        let list = json!([
            {
                "info": {"steamId": "STEAM_A", "name": "Switcher"},
                "matchPeriodData": [
                    {"info": {"team": "home", "position": "GK"}},
                    {"info": {"team": "away", "position": "CF"}}
                ]
            },
            {
                "info": {"steamId": "STEAM_B", "name": "Loyal"},
                "matchPeriodData": [{"info": {"team": "home", "position": "CM"}}]
            },
            {
                "info": {"steamId": "STEAM_C", "name": "Watcher"},
                "matchPeriodData": [{"info": {"team": "spectator"}}]
            },
            {
                "info": {"steamId": "BOT", "name": "Bot"},
                "matchPeriodData": [{"info": {"team": "home", "position": "LB"}}]
            }
        ]);
        let (rosters, names) = nested_players(&Node::root(&list)).expect("valid players");

        assert_eq!(rosters.home.len(), 1);
        assert_eq!(rosters.home[0].name, "Loyal");
        assert_eq!(rosters.away.len(), 1);
        assert_eq!(rosters.away[0].position, "CF");
        assert_eq!(names.get("STEAM_C").map(String::as_str), Some("Watcher"));
        assert!(!names.contains_key("BOT"));
    }

    #[test]
    fn reconnected_player_is_listed_once() {
        let list = json!([
            {"info": {"steamId": "STEAM_A", "name": "Old"}, "matchPeriodData": [{"info": {"team": "home", "position": "GK"}}]},
            {"info": {"steamId": "STEAM_B", "name": "Other"}, "matchPeriodData": [{"info": {"team": "home", "position": "CB"}}]},
            {"info": {"steamId": "STEAM_A", "name": "New"}, "matchPeriodData": [{"info": {"team": "home", "position": "CF"}}]},
        ]);
        let (rosters, _) = nested_players(&Node::root(&list)).expect("valid players");
        let names: Vec<_> = rosters.home.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Other", "New"]);
    }
}
