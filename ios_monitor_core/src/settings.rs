use std::{
    collections::HashSet,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use atomic_write_file::AtomicWriteFile;
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::commands::MATCH_INFO_COMMAND;

pub const CONFIG_FILE_NAME: &str = "config.yaml";
const PLACEHOLDER_PASSWORD: &str = "YOUR_RCON_PASSWORD";

#[derive(Debug, Clone, Copy)]
pub struct AppDetails<'a> {
    pub qualifier: &'a str,
    pub organization: &'a str,
    pub application: &'a str,
}

#[derive(Debug, Error)]
pub enum ConfigFilesError {
    #[error("No valid home directory found")]
    NoValidHome,
    #[error("IO({0})")]
    IO(#[from] io::Error),
    #[error("Yaml{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("No config file path is set")]
    NoConfigSet,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Identity and reachability of one monitored server. `rcon_ports` is an
/// allow-list: no other control port is ever tried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    pub query_port: u16,
    #[serde(default)]
    pub rcon_ports: Vec<u16>,
    /// Overrides [`Settings::rcon_password`] for this server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcon_password: Option<String>,
    /// Upper bound on the whole RCON stage of an acquisition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_budget_secs: Option<u64>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, query_port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            query_port,
            rcon_ports: Vec::new(),
            rcon_password: None,
            connect_budget_secs: None,
        }
    }

    #[must_use]
    pub fn connect_budget(&self) -> Option<Duration> {
        self.connect_budget_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.query_port)
    }

    /// This server's own RCON password, or `default` when it has none.
    #[must_use]
    pub fn credential<'a>(&'a self, default: &'a str) -> &'a str {
        self.rcon_password.as_deref().unwrap_or(default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    pub rcon_password: String,
    pub servers: Vec<ServerConfig>,
    pub telemetry_command: String,
    pub query_timeout_secs: u64,
    pub acquire_deadline_secs: Option<u64>,
    pub refresh_interval_secs: u64,
}

impl Settings {
    /// Attempts to locate the default file location for the settings config file
    ///
    /// # Errors
    /// If an appropriate location could not be found
    pub fn default_file_location(app_details: AppDetails) -> Result<PathBuf, ConfigFilesError> {
        Ok(Self::locate_config_directory(app_details)?.join(CONFIG_FILE_NAME))
    }

    /// Attempts to load the [Settings] at the specified location.
    /// If it cannot be found, new [Settings] will be
    /// created at that location.
    ///
    /// # Errors
    /// * `IO` - If the file could not be loaded from some reason
    /// * `Yaml` - If the contents of the file were not valid
    pub fn load_or_create(config_file_path: PathBuf) -> Result<Self, ConfigFilesError> {
        match Self::load_from(config_file_path.clone()) {
            Ok(settings) => Ok(settings),
            Err(ConfigFilesError::IO(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Could not locate {config_file_path:?}, creating new file.");
                Ok(Self {
                    config_path: Some(config_file_path),
                    ..Default::default()
                })
            }
            Err(e) => Err(e),
        }
    }

    /// # Errors
    /// If the file could not be read or isn't valid yaml
    pub fn load_from(config_file_path: PathBuf) -> Result<Self, ConfigFilesError> {
        let contents = std::fs::read_to_string(&config_file_path)?;
        let mut settings = serde_yaml::from_str::<Self>(&contents)?;
        tracing::debug!("Successfully loaded {config_file_path:?}");
        settings.config_path = Some(config_file_path);
        Ok(settings)
    }

    /// Attempt to save the settings back to the loaded configuration file
    ///
    /// # Errors
    /// If the settings could not be serialized or written back to disk
    pub fn save(&self) -> Result<(), ConfigFilesError> {
        let config_path = self
            .config_path
            .as_ref()
            .ok_or(ConfigFilesError::NoConfigSet)?;

        let mut file = AtomicWriteFile::open(config_path)?;
        write!(&mut file, "{}", serde_yaml::to_string(self)?)?;
        file.commit()?;

        Ok(())
    }

    pub fn save_ok(&self) {
        match self.save() {
            Ok(()) => tracing::debug!("Successfully saved settings to {:?}", self.config_path),
            Err(e) => tracing::error!("Failed to save settings to {:?}: {e}", self.config_path),
        }
    }

    /// Attempts to find (and create) a directory to be used for configuration
    /// files
    ///
    /// # Errors
    /// If a valid config file directory could not be found (usually because a
    /// valid home directory was not found)
    pub fn locate_config_directory(app_details: AppDetails) -> Result<PathBuf, ConfigFilesError> {
        let dirs = ProjectDirs::from(
            app_details.qualifier,
            app_details.organization,
            app_details.application,
        )
        .ok_or(ConfigFilesError::NoValidHome)?;
        let dir = dirs.config_dir();
        std::fs::create_dir_all(dir)?;
        Ok(PathBuf::from(dir))
    }

    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The credential to use for `server`.
    #[must_use]
    pub fn credential_for<'a>(&'a self, server: &'a ServerConfig) -> &'a str {
        server.credential(&self.rcon_password)
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    #[must_use]
    pub fn acquire_deadline(&self) -> Option<Duration> {
        self.acquire_deadline_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// # Errors
    /// `Invalid`, naming the first problem found
    pub fn validate(&self) -> Result<(), ConfigFilesError> {
        if self.servers.is_empty() {
            return Err(ConfigFilesError::Invalid("no servers configured".into()));
        }

        let mut names = HashSet::new();
        for server in &self.servers {
            if server.host.trim().is_empty() {
                return Err(ConfigFilesError::Invalid(format!(
                    "server \"{}\" has no host",
                    server.name
                )));
            }
            if !names.insert(server.name.as_str()) {
                return Err(ConfigFilesError::Invalid(format!(
                    "server name \"{}\" is used more than once",
                    server.name
                )));
            }
            let credential = self.credential_for(server);
            if credential.is_empty() || credential == PLACEHOLDER_PASSWORD {
                return Err(ConfigFilesError::Invalid(format!(
                    "no RCON password set for server \"{}\"",
                    server.name
                )));
            }
        }

        Ok(())
    }

    /// A copy that is safe to print, with every credential masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| "*".repeat(s.chars().count());
        let mut copy = self.clone();
        copy.rcon_password = mask(&self.rcon_password);
        for server in &mut copy.servers {
            server.rcon_password = server.rcon_password.as_deref().map(mask);
        }
        copy
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: None,
            rcon_password: PLACEHOLDER_PASSWORD.into(),
            servers: Vec::new(),
            telemetry_command: MATCH_INFO_COMMAND.into(),
            query_timeout_secs: 6,
            acquire_deadline_secs: Some(300),
            refresh_interval_secs: 60,
        }
    }
}
