use std::time::Duration;

use tokio::time::Instant;

use super::{
    commands::{self, CommandClass, LIVENESS_COMMAND, LIVENESS_TOKEN},
    AttemptLimit, RconError, RconFailure, RconSession, RetryPolicy,
};
use crate::settings::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerPolicy {
    /// Applied to each candidate port within a discovery round.
    pub discovery: RetryPolicy,
    /// Wait before starting another round after every port failed.
    pub round_delay: Duration,
    pub simple: RetryPolicy,
    pub bulk: RetryPolicy,
}

impl Default for ManagerPolicy {
    fn default() -> Self {
        Self {
            discovery: RetryPolicy::discovery(),
            round_delay: Duration::from_secs(30),
            simple: RetryPolicy::simple(),
            bulk: RetryPolicy::bulk(),
        }
    }
}

impl ManagerPolicy {
    /// Zero-delay policy with a fixed per-attempt timeout.
    #[must_use]
    pub fn immediate(timeout: Duration, attempts: u32) -> Self {
        let policy = RetryPolicy::immediate(timeout, AttemptLimit::Bounded(attempts));
        Self {
            discovery: policy.clone(),
            round_delay: Duration::ZERO,
            simple: policy.clone(),
            bulk: policy,
        }
    }

    fn for_command(&self, command: &str) -> &RetryPolicy {
        match commands::classify(command) {
            CommandClass::Simple => &self.simple,
            CommandClass::Bulk => &self.bulk,
        }
    }
}

/// A control port that accepted authentication. Only
/// [`RconConnectionManager::resolve_port`] hands these out, so a command can
/// never run ahead of port discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPort {
    port: u16,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl ResolvedPort {
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub response: String,
    pub port: u16,
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct RconConnectionManager {
    session: RconSession,
    policy: ManagerPolicy,
}

impl RconConnectionManager {
    #[must_use]
    pub const fn new(session: RconSession, policy: ManagerPolicy) -> Self {
        Self { session, policy }
    }

    /// Finds the first configured control port, in configured order, that
    /// passes the liveness check. Ports outside `server.rcon_ports` are never
    /// touched.
    ///
    /// Each port gets up to the discovery policy's attempts per round. With
    /// `rounds` unbounded this only returns once a port works, so callers
    /// wanting an upper bound must impose their own deadline.
    ///
    /// # Errors
    /// `NoWorkingPort` once the round budget is spent, or immediately if no
    /// ports are configured.
    pub async fn resolve_port(
        &self,
        server: &ServerConfig,
        password: &str,
        rounds: AttemptLimit,
    ) -> Result<ResolvedPort, RconFailure> {
        let start = Instant::now();
        let mut attempts = 0;

        if server.rcon_ports.is_empty() {
            return Err(RconFailure {
                error: RconError::NoWorkingPort(Vec::new()),
                attempts,
                elapsed: start.elapsed(),
            });
        }

        tracing::info!("Looking for a working RCON port for {}", server.name);

        let policy = &self.policy.discovery;
        let mut round = 1;
        loop {
            for &port in &server.rcon_ports {
                let mut attempt = 1;
                loop {
                    let timeout = policy.timeout_for(attempt);
                    tracing::debug!(
                        "{}: trying RCON port {port} (attempt {attempt}, timeout {timeout:?})",
                        server.name
                    );
                    let outcome = self
                        .session
                        .run(&server.host, port, password, LIVENESS_COMMAND, timeout)
                        .await;
                    attempts += outcome.attempts;

                    match outcome.result {
                        Ok(reply) if reply.contains(LIVENESS_TOKEN) => {
                            tracing::info!("{}: RCON port {port} is working", server.name);
                            return Ok(ResolvedPort {
                                port,
                                attempts,
                                elapsed: start.elapsed(),
                            });
                        }
                        Ok(reply) => tracing::warn!(
                            "{}: RCON port {port} gave an unexpected reply: {}",
                            server.name,
                            RconError::UnexpectedEcho(reply)
                        ),
                        Err(e) => tracing::debug!("{}: RCON port {port}: {e}", server.name),
                    }

                    if !policy.has_next(attempt) {
                        break;
                    }
                    tokio::time::sleep(policy.backoff_after(attempt)).await;
                    attempt += 1;
                }
            }

            if !rounds.allows(round + 1) {
                tracing::warn!(
                    "No working RCON port for {} after {round} round(s)",
                    server.name
                );
                return Err(RconFailure {
                    error: RconError::NoWorkingPort(server.rcon_ports.clone()),
                    attempts,
                    elapsed: start.elapsed(),
                });
            }

            tracing::warn!(
                "{}: no RCON port answered in round {round}, retrying in {:?}",
                server.name,
                self.policy.round_delay
            );
            tokio::time::sleep(self.policy.round_delay).await;
            round += 1;
        }
    }

    /// Runs `command` against an already resolved port, retrying with the
    /// timeout ladder for the command's class. `limit` overrides the class
    /// policy's attempt cap.
    ///
    /// # Errors
    /// The last attempt's error once the attempt budget is spent.
    pub async fn run_command(
        &self,
        server: &ServerConfig,
        port: &ResolvedPort,
        password: &str,
        command: &str,
        limit: Option<AttemptLimit>,
    ) -> Result<CommandOutput, RconFailure> {
        let start = Instant::now();
        let policy = self.policy.for_command(command);
        let limit = limit.unwrap_or(policy.limit);

        let mut attempt = 1;
        loop {
            let timeout = policy.timeout_for(attempt);
            tracing::debug!(
                "{}: running `{command}` on port {} (attempt {attempt}, timeout {timeout:?})",
                server.name,
                port.port
            );
            let outcome = self
                .session
                .run(&server.host, port.port, password, command, timeout)
                .await;

            match outcome.result {
                Ok(response) => {
                    tracing::info!(
                        "{}: `{command}` returned {} characters",
                        server.name,
                        response.len()
                    );
                    return Ok(CommandOutput {
                        response,
                        port: port.port,
                        attempts: attempt,
                        elapsed: start.elapsed(),
                    });
                }
                Err(error) if !limit.allows(attempt + 1) => {
                    tracing::warn!("{}: `{command}` failed: {error}", server.name);
                    return Err(RconFailure {
                        error,
                        attempts: attempt,
                        elapsed: start.elapsed(),
                    });
                }
                Err(error) => {
                    tracing::debug!("{}: `{command}` failed, retrying: {error}", server.name);
                }
            }

            tokio::time::sleep(policy.backoff_after(attempt)).await;
            attempt += 1;
        }
    }
}
