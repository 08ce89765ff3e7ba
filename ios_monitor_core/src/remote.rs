use std::time::Duration;

use thiserror::Error;

pub mod commands;
pub mod manager;
pub mod retry;
pub mod session;

pub use manager::{CommandOutput, ManagerPolicy, RconConnectionManager, ResolvedPort};
pub use retry::{AttemptLimit, BackoffTier, RetryPolicy};
pub use session::{RconChannel, RconConnector, RconOutcome, RconSession, TcpConnector};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RconError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connected, but the command produced no output")]
    NoResponse,
    #[error("Liveness check returned an unexpected reply: {0}")]
    UnexpectedEcho(String),
    #[error("IO({0})")]
    Io(String),
    #[error("No configured control port accepted authentication (tried {0:?})")]
    NoWorkingPort(Vec<u16>),
}

/// A failure that made it out of a retry loop, with what it cost.
#[derive(Debug, Clone, Error)]
#[error("{error} (after {attempts} attempt(s), {elapsed:.1?})")]
pub struct RconFailure {
    pub error: RconError,
    pub attempts: u32,
    pub elapsed: Duration,
}
