use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rcon::Connection;
use tokio::{net::TcpStream, time::Instant};

use super::RconError;

/// An open, authenticated control channel. Dropping it closes the
/// connection.
#[async_trait]
pub trait RconChannel: Send {
    async fn cmd(&mut self, command: &str) -> Result<String, RconError>;
}

/// Opens authenticated control channels.
#[async_trait]
pub trait RconConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        password: &str,
    ) -> Result<Box<dyn RconChannel>, RconError>;
}

/// Source RCON over TCP, provided by the `rcon` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

struct TcpChannel(Connection<TcpStream>);

impl From<rcon::Error> for RconError {
    fn from(value: rcon::Error) -> Self {
        match value {
            rcon::Error::Auth => Self::Auth("Password rejected".into()),
            other => Self::Io(other.to_string()),
        }
    }
}

#[async_trait]
impl RconChannel for TcpChannel {
    async fn cmd(&mut self, command: &str) -> Result<String, RconError> {
        Ok(self.0.cmd(command).await?)
    }
}

#[async_trait]
impl RconConnector for TcpConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        password: &str,
    ) -> Result<Box<dyn RconChannel>, RconError> {
        let connection = Connection::<TcpStream>::builder()
            .connect(format!("{host}:{port}"), password)
            .await?;
        Ok(Box::new(TcpChannel(connection)))
    }
}

/// Result of one control-channel round trip.
#[derive(Debug, Clone)]
pub struct RconOutcome {
    pub result: Result<String, RconError>,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl RconOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    #[must_use]
    pub fn response(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }

    #[must_use]
    pub fn error(&self) -> Option<&RconError> {
        self.result.as_ref().err()
    }
}

/// Connect, authenticate, run one command, disconnect.
#[derive(Clone)]
pub struct RconSession {
    connector: Arc<dyn RconConnector>,
}

impl RconSession {
    #[must_use]
    pub fn new(connector: Arc<dyn RconConnector>) -> Self {
        Self { connector }
    }

    /// Runs `command` on a fresh connection. The connection never outlives
    /// this call, whichever way it ends. An empty reply counts as a failure.
    pub async fn run(
        &self,
        host: &str,
        port: u16,
        password: &str,
        command: &str,
        timeout: Duration,
    ) -> RconOutcome {
        let start = Instant::now();

        let exchange = async {
            let mut channel = self.connector.connect(host, port, password).await?;
            channel.cmd(command).await
        };

        let result = match tokio::time::timeout(timeout, exchange).await {
            Err(_) => Err(RconError::Timeout(timeout)),
            Ok(Err(e)) => Err(e),
            Ok(Ok(response)) => {
                let response = response.trim();
                if response.is_empty() {
                    Err(RconError::NoResponse)
                } else {
                    Ok(response.to_owned())
                }
            }
        };

        match &result {
            Ok(response) => tracing::debug!(
                "RCON {host}:{port} `{command}` returned {} characters",
                response.len()
            ),
            Err(e) => tracing::debug!("RCON {host}:{port} `{command}` failed: {e}"),
        }

        RconOutcome {
            result,
            attempts: 1,
            elapsed: start.elapsed(),
        }
    }
}

impl Default for RconSession {
    fn default() -> Self {
        Self::new(Arc::new(TcpConnector))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Scripted {
        reply: Result<&'static str, RconError>,
        delay: Duration,
        open: Arc<AtomicUsize>,
    }

    struct ScriptedChannel {
        reply: Result<&'static str, RconError>,
        delay: Duration,
        open: Arc<AtomicUsize>,
    }

    impl Drop for ScriptedChannel {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RconChannel for ScriptedChannel {
        async fn cmd(&mut self, _command: &str) -> Result<String, RconError> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map(str::to_owned)
        }
    }

    #[async_trait]
    impl RconConnector for Scripted {
        async fn connect(
            &self,
            _host: &str,
            _port: u16,
            _password: &str,
        ) -> Result<Box<dyn RconChannel>, RconError> {
            self.open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedChannel {
                reply: self.reply.clone(),
                delay: self.delay,
                open: self.open.clone(),
            }))
        }
    }

    fn scripted_session(
        reply: Result<&'static str, RconError>,
        delay: Duration,
    ) -> (RconSession, Arc<AtomicUsize>) {
        let open = Arc::new(AtomicUsize::new(0));
        let connector = Scripted {
            reply,
            delay,
            open: open.clone(),
        };
        (RconSession::new(Arc::new(connector)), open)
    }

    #[tokio::test]
    async fn successful_run_trims_response() {
        let (session, open) = scripted_session(Ok("  hello\n"), Duration::ZERO);
        let outcome = session
            .run("127.0.0.1", 27015, "pw", "status", Duration::from_secs(1))
            .await;
        assert_eq!(outcome.response(), Some("hello"));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_reply_is_a_failure() {
        let (session, open) = scripted_session(Ok(" \n"), Duration::ZERO);
        let outcome = session
            .run("127.0.0.1", 27015, "pw", "status", Duration::from_secs(1))
            .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.error(), Some(&RconError::NoResponse));
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_errors_are_reported_not_raised() {
        let (session, _) = scripted_session(Err(RconError::Auth("bad".into())), Duration::ZERO);
        let outcome = session
            .run("127.0.0.1", 27015, "pw", "status", Duration::from_secs(1))
            .await;
        assert!(matches!(outcome.error(), Some(RconError::Auth(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_the_connection() {
        let (session, open) = scripted_session(Ok("late"), Duration::from_secs(60));
        let outcome = session
            .run("127.0.0.1", 27015, "pw", "status", Duration::from_secs(10))
            .await;
        assert_eq!(
            outcome.error(),
            Some(&RconError::Timeout(Duration::from_secs(10)))
        );
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }
}
