//! Turns the text a server prints for the match dump command into a
//! [`MatchSnapshot`], whichever layout that server version writes.

use serde_json::Value;
use thiserror::Error;

mod events;
mod node;
mod roster;
mod schema;
pub mod snapshot;

pub use snapshot::{format_clock, GoalEvent, MatchSnapshot, RosterEntry, Rosters, Side};

use node::Node;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("No JSON payload found in the response")]
    PayloadNotFound,
    #[error("Payload does not match any known match layout (top-level keys: {keys:?})")]
    SchemaMismatch { keys: Vec<String> },
    #[error("Required field {path} is missing")]
    FieldMissing { path: String },
    #[error("Field {path} is not a valid {expected}")]
    TypeMismatch { path: String, expected: &'static str },
}

/// Finds the JSON object embedded in console output. Servers print banners
/// and log noise around it, so the widest `{...}` span is tried first, then
/// the first line that is a complete object on its own.
///
/// # Errors
/// [`ParseFailure::PayloadNotFound`] if neither strategy decodes.
pub fn locate_payload(raw: &str) -> Result<Value, ParseFailure> {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&raw[start..=end]) {
                return Ok(value);
            }
        }
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .find_map(|line| serde_json::from_str::<Value>(line).ok())
        .ok_or(ParseFailure::PayloadNotFound)
}

/// Parses raw console output into a snapshot.
///
/// # Errors
/// Any [`ParseFailure`]; nothing partial is returned.
pub fn parse(raw: &str) -> Result<MatchSnapshot, ParseFailure> {
    parse_value(&locate_payload(raw)?)
}

/// Parses an already decoded payload.
///
/// # Errors
/// [`ParseFailure::SchemaMismatch`] when no layout matches, or the failure
/// reported by the matching layout.
pub fn parse_value(payload: &Value) -> Result<MatchSnapshot, ParseFailure> {
    let root = Node::root(payload);
    if !payload.is_object() {
        return Err(ParseFailure::SchemaMismatch { keys: Vec::new() });
    }

    let Some(variant) = schema::detect(&root) else {
        return Err(ParseFailure::SchemaMismatch { keys: root.keys() });
    };
    tracing::debug!("Match payload detected as the {} layout", variant.name);
    (variant.extract)(&root)
}
