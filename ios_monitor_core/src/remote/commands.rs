//! Remote commands the monitor knows how to use.

/// Cheap command used only to prove that authentication worked.
pub const LIVENESS_COMMAND: &str = "echo \"RCON_TEST_OK\"";
pub const LIVENESS_TOKEN: &str = "RCON_TEST_OK";

/// Dumps the current match state as embedded JSON.
pub const MATCH_INFO_COMMAND: &str = "sv_matchinfojson";

pub const KNOWN_COMMANDS: &[&str] = &[
    "status",
    "version",
    LIVENESS_COMMAND,
    MATCH_INFO_COMMAND,
    "ios_match_info",
    "ios_score",
    "ios_time",
    "ios_players",
    "users",
    "listplayers",
    "players",
    "stats",
];

/// Whether the first word of `command` is one of [`KNOWN_COMMANDS`].
#[must_use]
pub fn is_known(command: &str) -> bool {
    let command = command.trim();
    KNOWN_COMMANDS.iter().any(|known| {
        command == *known
            || command
                .split_whitespace()
                .next()
                .is_some_and(|name| name.eq_ignore_ascii_case(known))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    Simple,
    /// Produces a large structured payload and needs longer timeouts.
    Bulk,
}

#[must_use]
pub fn classify(command: &str) -> CommandClass {
    let name = command
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if name.contains("matchinfo") || name.contains("match_info") || name.ends_with("json") {
        CommandClass::Bulk
    } else {
        CommandClass::Simple
    }
}
