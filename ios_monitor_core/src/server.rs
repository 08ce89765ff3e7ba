//! One acquisition cycle for one server: query probe, RCON telemetry, parse.

use std::{any::Any, fmt::Display, panic::AssertUnwindSafe, time::Duration};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    query::{self, BasicServerDescriptor, QueryError},
    remote::{
        commands::MATCH_INFO_COMMAND, AttemptLimit, CommandOutput, RconConnectionManager,
        RconFailure,
    },
    settings::{ServerConfig, Settings},
    telemetry::{self, MatchSnapshot, ParseFailure},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerStatus {
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "online-no-telemetry")]
    OnlineNoTelemetry,
    #[serde(rename = "online-with-telemetry")]
    OnlineWithTelemetry,
    #[serde(rename = "error")]
    Error,
}

impl ServerStatus {
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::OnlineNoTelemetry | Self::OnlineWithTelemetry)
    }
}

impl Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline => write!(f, "Offline"),
            Self::OnlineNoTelemetry => write!(f, "Online (no match data)"),
            Self::OnlineWithTelemetry => write!(f, "Online"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Result of one acquisition. `descriptor` is present whenever the server
/// answered the query; `match_info` only with [`ServerStatus::OnlineWithTelemetry`].
#[derive(Debug, Clone, Serialize)]
pub struct ServerSnapshot {
    pub name: String,
    pub address: String,
    pub status: ServerStatus,
    pub descriptor: Option<BasicServerDescriptor>,
    pub match_info: Option<MatchSnapshot>,
    pub rcon_port: Option<u16>,
    /// Why telemetry is missing, for display only.
    pub detail: Option<String>,
    pub acquired_at: DateTime<Utc>,
}

impl ServerSnapshot {
    fn new(server: &ServerConfig, status: ServerStatus) -> Self {
        Self {
            name: server.name.clone(),
            address: server.address(),
            status,
            descriptor: None,
            match_info: None,
            rcon_port: None,
            detail: None,
            acquired_at: Utc::now(),
        }
    }

    fn failed(server: &ServerConfig, detail: String) -> Self {
        Self {
            detail: Some(detail),
            ..Self::new(server, ServerStatus::Error)
        }
    }

    /// Current player count, preferring the query reply.
    #[must_use]
    pub fn players(&self) -> Option<u32> {
        self.descriptor
            .as_ref()
            .map(|d| u32::from(d.players))
            .or_else(|| self.match_info.as_ref().map(|m| m.active_players))
    }
}

/// How hard the RCON stage tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Discovery and the telemetry command retry until they succeed. Callers
    /// bound this with a deadline.
    Persistent,
    /// One discovery round and at most `attempts` command attempts.
    Diagnostic { attempts: u32 },
}

impl AcquireMode {
    const fn discovery_rounds(self) -> AttemptLimit {
        match self {
            Self::Persistent => AttemptLimit::Unbounded,
            Self::Diagnostic { .. } => AttemptLimit::Bounded(1),
        }
    }

    const fn command_limit(self) -> Option<AttemptLimit> {
        match self {
            Self::Persistent => None,
            Self::Diagnostic { attempts } => Some(AttemptLimit::Bounded(attempts)),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Rcon(#[from] RconFailure),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

enum TelemetryError {
    Rcon(RconFailure),
    Parse(ParseFailure),
    Budget(Duration),
    Internal(String),
}

impl Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rcon(e) => write!(f, "RCON failed: {e}"),
            Self::Parse(e) => write!(f, "Match data unreadable: {e}"),
            Self::Budget(budget) => write!(f, "RCON did not finish within {budget:?}"),
            Self::Internal(cause) => write!(f, "Internal error: {cause}"),
        }
    }
}

pub struct ServerSnapshotAssembler {
    manager: RconConnectionManager,
    mode: AcquireMode,
    query_timeout: Duration,
    rcon_password: String,
    telemetry_command: String,
}

impl ServerSnapshotAssembler {
    #[must_use]
    pub fn new(
        manager: RconConnectionManager,
        query_timeout: Duration,
        rcon_password: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            mode: AcquireMode::Persistent,
            query_timeout,
            rcon_password: rcon_password.into(),
            telemetry_command: MATCH_INFO_COMMAND.to_owned(),
        }
    }

    #[must_use]
    pub fn from_settings(manager: RconConnectionManager, settings: &Settings) -> Self {
        Self::new(manager, settings.query_timeout(), settings.rcon_password.clone())
            .with_telemetry_command(settings.telemetry_command.clone())
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: AcquireMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_telemetry_command(mut self, command: impl Into<String>) -> Self {
        self.telemetry_command = command.into();
        self
    }

    #[must_use]
    pub const fn mode(&self) -> AcquireMode {
        self.mode
    }

    /// Acquires a snapshot of `server`. Never fails: every problem, including
    /// a panic further down, ends up in the snapshot's status and detail. A
    /// panic after the query answered still keeps the query data.
    ///
    /// In [`AcquireMode::Persistent`] this can wait forever on a server that
    /// answers queries but never accepts RCON; see [`Self::acquire_within`].
    pub async fn acquire(&self, server: &ServerConfig) -> ServerSnapshot {
        self.guarded(server, None).await
    }

    /// [`Self::acquire`] with an overall deadline. Both the probe and the RCON
    /// stage stop at the deadline, so a reachable server still reports its
    /// query data.
    pub async fn acquire_within(
        &self,
        server: &ServerConfig,
        deadline: Duration,
    ) -> ServerSnapshot {
        self.guarded(server, Some(Instant::now() + deadline)).await
    }

    async fn guarded(&self, server: &ServerConfig, until: Option<Instant>) -> ServerSnapshot {
        match AssertUnwindSafe(self.assemble(server, until)).catch_unwind().await {
            Ok(snapshot) => snapshot,
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                tracing::error!("{}: acquisition panicked: {cause}", server.name);
                ServerSnapshot::failed(server, format!("Internal error: {cause}"))
            }
        }
    }

    async fn assemble(&self, server: &ServerConfig, until: Option<Instant>) -> ServerSnapshot {
        let probe = query::probe(&server.host, server.query_port, self.query_timeout);
        let probed = match until {
            Some(until) => tokio::time::timeout_at(until, probe)
                .await
                .unwrap_or(Err(QueryError::Timeout(self.query_timeout))),
            None => probe.await,
        };
        let descriptor = match probed {
            Ok(descriptor) => {
                tracing::info!(
                    "{}: {} on {} ({}/{})",
                    server.name,
                    descriptor.server_name,
                    descriptor.map_name,
                    descriptor.players,
                    descriptor.max_players
                );
                descriptor
            }
            Err(e) => {
                tracing::info!("{}: query failed, treating as offline: {e}", server.name);
                return ServerSnapshot {
                    detail: Some(e.to_string()),
                    ..ServerSnapshot::new(server, ServerStatus::Offline)
                };
            }
        };

        let budget = match (server.connect_budget(), until) {
            (Some(budget), Some(until)) => {
                Some(budget.min(until.saturating_duration_since(Instant::now())))
            }
            (Some(budget), None) => Some(budget),
            (None, Some(until)) => Some(until.saturating_duration_since(Instant::now())),
            (None, None) => None,
        };

        let mut snapshot = ServerSnapshot {
            descriptor: Some(descriptor),
            ..ServerSnapshot::new(server, ServerStatus::OnlineNoTelemetry)
        };

        let stage = AssertUnwindSafe(self.telemetry(server))
            .catch_unwind()
            .map(|outcome| {
                outcome.unwrap_or_else(|panic| {
                    let cause = panic_message(panic.as_ref());
                    Err((TelemetryError::Internal(cause), None))
                })
            });
        let telemetry = match budget {
            Some(budget) => tokio::time::timeout(budget, stage)
                .await
                .unwrap_or(Err((TelemetryError::Budget(budget), None))),
            None => stage.await,
        };

        match telemetry {
            Ok((match_info, port)) => {
                snapshot.status = ServerStatus::OnlineWithTelemetry;
                snapshot.match_info = Some(match_info);
                snapshot.rcon_port = Some(port);
            }
            Err((e @ TelemetryError::Internal(_), _)) => {
                tracing::error!("{}: telemetry stage panicked: {e}", server.name);
                snapshot.status = ServerStatus::Error;
                snapshot.detail = Some(e.to_string());
            }
            Err((e, port)) => {
                tracing::warn!("{}: no match data: {e}", server.name);
                snapshot.rcon_port = port;
                snapshot.detail = Some(e.to_string());
            }
        }
        snapshot
    }

    async fn telemetry(
        &self,
        server: &ServerConfig,
    ) -> Result<(MatchSnapshot, u16), (TelemetryError, Option<u16>)> {
        let output = self
            .telemetry_output(server, self.mode)
            .await
            .map_err(|e| (TelemetryError::Rcon(e), None))?;
        telemetry::parse(&output.response)
            .map(|m| (m, output.port))
            .map_err(|e| (TelemetryError::Parse(e), Some(output.port)))
    }

    async fn telemetry_output(
        &self,
        server: &ServerConfig,
        mode: AcquireMode,
    ) -> Result<CommandOutput, RconFailure> {
        let password = server.credential(&self.rcon_password);
        let port = self
            .manager
            .resolve_port(server, password, mode.discovery_rounds())
            .await?;
        self.manager
            .run_command(
                server,
                &port,
                password,
                &self.telemetry_command,
                mode.command_limit(),
            )
            .await
    }

    /// Fetches the raw match payload, decoded but not interpreted.
    ///
    /// # Errors
    /// The RCON failure, or [`ParseFailure::PayloadNotFound`].
    pub async fn fetch_payload(
        &self,
        server: &ServerConfig,
        attempts: u32,
    ) -> Result<Value, FetchError> {
        let output = self
            .telemetry_output(server, AcquireMode::Diagnostic { attempts })
            .await?;
        Ok(telemetry::locate_payload(&output.response)?)
    }

    /// Runs an arbitrary command after a single discovery round.
    ///
    /// # Errors
    /// The RCON failure once discovery or the command's attempts are spent.
    pub async fn run_diagnostic(
        &self,
        server: &ServerConfig,
        command: &str,
        attempts: u32,
    ) -> Result<CommandOutput, RconFailure> {
        let password = server.credential(&self.rcon_password);
        let port = self
            .manager
            .resolve_port(server, password, AttemptLimit::Bounded(1))
            .await?;
        self.manager
            .run_command(
                server,
                &port,
                password,
                command,
                Some(AttemptLimit::Bounded(attempts)),
            )
            .await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_map_to_limits() {
        assert_eq!(AcquireMode::Persistent.discovery_rounds(), AttemptLimit::Unbounded);
        assert_eq!(AcquireMode::Persistent.command_limit(), None);
        let diagnostic = AcquireMode::Diagnostic { attempts: 3 };
        assert_eq!(diagnostic.discovery_rounds(), AttemptLimit::Bounded(1));
        assert_eq!(diagnostic.command_limit(), Some(AttemptLimit::Bounded(3)));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&ServerStatus::OnlineNoTelemetry).expect("serializable");
        assert_eq!(json, "\"online-no-telemetry\"");
        assert!(ServerStatus::OnlineWithTelemetry.is_online());
        assert!(!ServerStatus::Offline.is_online());
    }
}
