//! Configuration file support for s40link.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (S40LINK_*)
//! 3. Local config file (./s40link.toml)
//! 4. Global config file (~/.config/s40link/config.toml)
//!
//! ```toml
//! [connection]
//! address = "0019B7A1C2D3"
//! channel = 15
//! device = "/dev/rfcomm0"
//! baud = 115200
//!
//! [session]
//! quiet_period_ms = 100
//! response_timeout_ms = 10000
//! ```

use {
    crate::CliError,
    anyhow::Result,
    directories::ProjectDirs,
    log::{debug, info, warn},
    s40link::SessionConfig,
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Name of the local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "s40link.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Bluetooth hardware address of the phone (12 hex digits).
    pub address: Option<String>,
    /// RFCOMM channel of the phone's file service.
    pub channel: Option<i32>,
    /// Serial device bound to the phone (e.g. "/dev/rfcomm0" or "COM5").
    pub device: Option<String>,
    /// Baud rate used to open the device.
    pub baud: Option<u32>,
}

/// Session tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    /// Silence in milliseconds that ends a reply.
    pub quiet_period_ms: Option<u64>,
    /// Milliseconds to wait for the first byte of a reply.
    pub response_timeout_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Session settings.
    #[serde(default)]
    pub session: SessionSection,
}

impl Config {
    /// Load configuration from all available sources.
    ///
    /// Unreadable or malformed files are reported and skipped.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_lenient(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_lenient(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    ///
    /// Unlike [`Config::load`], a missing or malformed file is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = Self::parse(&content).map_err(|e| {
            CliError::Config(format!("invalid config file {}: {e}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse TOML configuration text.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn load_lenient(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: TOML {e}", path.display());
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {e}", path.display());
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "s40link").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; values set in `other` win.
    pub fn merge(&mut self, other: Self) {
        let conn = other.connection;
        if conn.address.is_some() {
            self.connection.address = conn.address;
        }
        if conn.channel.is_some() {
            self.connection.channel = conn.channel;
        }
        if conn.device.is_some() {
            self.connection.device = conn.device;
        }
        if conn.baud.is_some() {
            self.connection.baud = conn.baud;
        }

        let session = other.session;
        if session.quiet_period_ms.is_some() {
            self.session.quiet_period_ms = session.quiet_period_ms;
        }
        if session.response_timeout_ms.is_some() {
            self.session.response_timeout_ms = session.response_timeout_ms;
        }
    }

    /// Session settings with defaults for anything not configured.
    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::default();
        if let Some(ms) = self.session.quiet_period_ms {
            session.quiet_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.session.response_timeout_ms {
            session.response_timeout = Duration::from_millis(ms);
        }
        session
    }

    /// Remember the serial device bound to the phone in the local config file.
    pub fn remember_device(&mut self, device: &str) -> Result<()> {
        let path = Path::new(LOCAL_CONFIG_FILE);
        let mut local = Self::load_lenient(path).unwrap_or_default();
        local.connection.device = Some(device.to_string());
        self.connection.device = Some(device.to_string());

        let content = toml::to_string_pretty(&local)?;
        fs::write(path, content)?;
        info!("Saved device to {}", path.display());
        Ok(())
    }
}
