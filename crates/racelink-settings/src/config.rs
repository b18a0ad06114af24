//! Configuration and settings management for RaceLink
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats stored in platform-specific directories.
//!
//! Configuration is organized into logical sections:
//! - Card reader settings (serial port, baud rate, protocol delays)
//! - Teamwork settings (role, peer address, socket timeouts)
//! - Engine timings for each link (poll interval, queue timeouts)

use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default TCP port for teamwork links
pub const DEFAULT_TEAMWORK_PORT: u16 = 50010;

/// Baud rate of the LZFox master station
pub const DEFAULT_CARD_READER_BAUD: u32 = 38400;

/// Which side of a teamwork link this station plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Connect out to a server station
    #[default]
    Client,
    /// Accept connections from client stations
    Server,
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}

impl FromStr for PeerRole {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            other => Err(SettingsError::InvalidSetting {
                key: "teamwork.role".to_string(),
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// Producer/dispatcher timings for one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Sleep between adapter polls
    pub poll_interval_ms: u64,
    /// Producer wait for queue room before dropping a record
    pub put_timeout_ms: u64,
    /// Dispatcher wait on an empty queue before re-checking for exit
    pub pop_timeout_ms: u64,
    /// Dispatcher delay before it starts draining
    pub startup_delay_ms: u64,
    /// Maximum queued commands
    pub queue_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            put_timeout_ms: 1000,
            pop_timeout_ms: 5000,
            startup_delay_ms: 0,
            queue_capacity: 256,
        }
    }
}

impl EngineSettings {
    /// Card reader defaults: 200 ms polls, 5 s pops, 3 s dispatcher warm-up
    pub fn card_reader() -> Self {
        Self {
            startup_delay_ms: 3000,
            ..Self::default()
        }
    }

    /// Teamwork defaults: tight polling so local sends go out promptly
    pub fn teamwork() -> Self {
        Self {
            poll_interval_ms: 20,
            pop_timeout_ms: 500,
            ..Self::default()
        }
    }

    fn validate(&self, section: &str) -> SettingsResult<()> {
        if self.pop_timeout_ms == 0 {
            return Err(invalid(section, "pop_timeout_ms", "must be > 0"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid(section, "queue_capacity", "must be > 0"));
        }
        Ok(())
    }
}

/// Card reader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardReaderSettings {
    /// Serial port path; `None` scans the platform's candidate ports
    pub port: Option<String>,
    /// Baud rate for the master station
    pub baud_rate: u32,
    /// Serial read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Wait after opening the port while the station resets
    pub settle_delay_ms: u64,
    /// Wait between writing a command and reading its response
    pub command_delay_ms: u64,
    /// Worker timings
    pub engine: EngineSettings,
}

impl Default for CardReaderSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_CARD_READER_BAUD,
            read_timeout_ms: 5000,
            settle_delay_ms: 2000,
            command_delay_ms: 100,
            engine: EngineSettings::card_reader(),
        }
    }
}

/// Teamwork settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamworkSettings {
    /// Host to bind (server) or connect to (client)
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Role of this station
    pub role: PeerRole,
    /// Client connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Socket read timeout per receive in milliseconds
    pub read_timeout_ms: u64,
    /// Worker timings
    pub engine: EngineSettings,
}

impl Default for TeamworkSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_TEAMWORK_PORT,
            role: PeerRole::Client,
            connect_timeout_ms: 5000,
            read_timeout_ms: 100,
            engine: EngineSettings::teamwork(),
        }
    }
}

impl TeamworkSettings {
    /// Host to use when none is configured
    pub fn effective_host(&self) -> &str {
        match (self.host.trim(), self.role) {
            ("", PeerRole::Server) => "0.0.0.0",
            ("", PeerRole::Client) => "127.0.0.1",
            (host, _) => host,
        }
    }
}

/// Complete station configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Card reader link
    pub card_reader: CardReaderSettings,
    /// Teamwork link
    pub teamwork: TeamworkSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config file location, e.g. `~/.config/racelink/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("racelink").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from `path`, or defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
                })?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.card_reader.baud_rate == 0 {
            return Err(invalid("card_reader", "baud_rate", "must be > 0"));
        }
        if self.card_reader.read_timeout_ms == 0 {
            return Err(invalid("card_reader", "read_timeout_ms", "must be > 0"));
        }
        if let Some(port) = &self.card_reader.port {
            if port.trim().is_empty() {
                return Err(invalid("card_reader", "port", "must not be blank"));
            }
        }
        self.card_reader.engine.validate("card_reader.engine")?;

        if self.teamwork.port == 0 {
            return Err(invalid("teamwork", "port", "must be > 0"));
        }
        if self.teamwork.read_timeout_ms == 0 {
            return Err(invalid("teamwork", "read_timeout_ms", "must be > 0"));
        }
        self.teamwork.engine.validate("teamwork.engine")?;

        Ok(())
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidSetting {
        key: format!("{}.{}", section, key),
        reason: reason.to_string(),
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.card_reader.baud_rate, 38400);
        assert_eq!(config.card_reader.engine.startup_delay_ms, 3000);
        assert_eq!(config.teamwork.port, 50010);
        assert_eq!(config.teamwork.role, PeerRole::Client);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Server".parse::<PeerRole>().unwrap(), PeerRole::Server);
        assert_eq!(" client ".parse::<PeerRole>().unwrap(), PeerRole::Client);
        assert!("relay".parse::<PeerRole>().is_err());
    }

    #[test]
    fn test_effective_host() {
        let mut teamwork = TeamworkSettings::default();
        assert_eq!(teamwork.effective_host(), "127.0.0.1");
        teamwork.role = PeerRole::Server;
        assert_eq!(teamwork.effective_host(), "0.0.0.0");
        teamwork.host = "10.0.0.5".to_string();
        assert_eq!(teamwork.effective_host(), "10.0.0.5");
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let config: Config = toml::from_str(
            r#"
            [teamwork]
            role = "server"
            port = 6000
            "#,
        )
        .unwrap();
        assert_eq!(config.teamwork.role, PeerRole::Server);
        assert_eq!(config.teamwork.port, 6000);
        assert_eq!(config.teamwork.engine, EngineSettings::teamwork());
        assert_eq!(config.card_reader, CardReaderSettings::default());
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = Config::default();
        config.teamwork.port = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid setting 'teamwork.port': must be > 0");
    }

    #[test]
    fn test_unknown_role_in_file_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[teamwork]\nrole = \"relay\"\n");
        assert!(result.is_err());
    }
}
