//! The shapes different server versions use for the match dump. Each
//! variant is a set of marker fields plus an extractor; [`VARIANTS`] is tried
//! in order and the first variant whose markers are all present wins.

use super::{node::Node, snapshot::MatchSnapshot, ParseFailure};

mod event_log;
mod flat;
mod nested;

pub(crate) struct SchemaVariant {
    pub name: &'static str,
    /// Dotted paths that must all be present.
    pub markers: &'static [&'static str],
    pub extract: fn(&Node) -> Result<MatchSnapshot, ParseFailure>,
}

impl SchemaVariant {
    pub(crate) fn matches(&self, root: &Node) -> bool {
        self.markers.iter().all(|m| root.lookup(m).exists())
    }
}

pub(crate) const VARIANTS: &[SchemaVariant] = &[
    SchemaVariant {
        name: "flat",
        markers: &["matchPeriod", "matchGoalsHome"],
        extract: flat::extract,
    },
    SchemaVariant {
        name: "nested",
        markers: &["matchData.matchInfo", "matchData.teams"],
        extract: nested::extract,
    },
    SchemaVariant {
        name: "event-log",
        markers: &["teamNameHome", "teamNameAway", "matchEvents"],
        extract: event_log::extract,
    },
];

/// Finds the variant `root` is written in.
pub(crate) fn detect(root: &Node) -> Option<&'static SchemaVariant> {
    VARIANTS.iter().find(|v| v.matches(root))
}
