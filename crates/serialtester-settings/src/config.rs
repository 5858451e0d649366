//! Configuration for Serial Tester
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML files, by default stored in the platform config directory.
//!
//! Configuration is organized into sections:
//! - Connection settings (port, baud rate)
//! - Sender settings (tick interval, payload constants)
//! - Engine settings (read mode, read failure policy)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use serialtester_core::events::DEFAULT_CHANNEL_CAPACITY;
use serialtester_core::payload::{DEFAULT_BRIGHTNESS, DEFAULT_TRAILER};
use serialtester_core::{ReadFailurePolicy, ReadMode};
use std::path::{Path, PathBuf};

/// Port name meaning "first enumerated port"
pub const AUTO_PORT: &str = "Auto";

/// Directory name under the platform config directory
pub const CONFIG_DIR_NAME: &str = "serialtester";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )
            .into()),
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial device name, or `Auto` for the first enumerated port
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: 9600,
        }
    }
}

impl ConnectionSettings {
    /// Check whether the port should be picked from enumeration
    pub fn is_auto_port(&self) -> bool {
        self.port.eq_ignore_ascii_case(AUTO_PORT)
    }
}

/// Payload sender settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderSettings {
    /// Milliseconds between payload pairs
    pub interval_ms: u64,
    /// Number of ticks to send; unlimited when absent
    pub count: Option<u64>,
    /// Brightness field of every payload line
    pub brightness: u8,
    /// Trailing field of every payload line
    pub trailer: u8,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            count: None,
            brightness: DEFAULT_BRIGHTNESS,
            trailer: DEFAULT_TRAILER,
        }
    }
}

/// Engine behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Who re-arms the receive loop
    pub read_mode: ReadMode,
    /// What a failed read does
    pub read_failure: ReadFailurePolicy,
    /// Capacity of the async event channel
    pub channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            read_mode: ReadMode::default(),
            read_failure: ReadFailurePolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Complete tester configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Sender settings
    pub sender: SenderSettings,
    /// Engine settings
    pub engine: EngineSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> SettingsResult<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string())
        })?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path`, or the default file if it exists, or the defaults
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Ok(default) if default.exists() => Self::load_from_file(&default),
            Ok(_) => Ok(Self::default()),
            Err(e) => {
                tracing::debug!("No default config location: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.port.trim().is_empty() {
            return Err(SettingsError::invalid("connection.port", "must not be empty"));
        }

        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }

        if self.sender.interval_ms == 0 {
            return Err(SettingsError::invalid("sender.interval_ms", "must be > 0"));
        }

        if self.engine.channel_capacity == 0 {
            return Err(SettingsError::invalid("engine.channel_capacity", "must be > 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.connection.baud_rate, 9600);
        assert!(config.connection.is_auto_port());
        assert_eq!(config.sender.interval_ms, 1000);
        assert_eq!(config.sender.brightness, 50);
        assert_eq!(config.sender.trailer, 1);
        assert_eq!(config.engine.read_mode, ReadMode::Continuous);
        assert_eq!(config.engine.read_failure, ReadFailurePolicy::Silent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::new();
        config.connection.baud_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { ref key, .. }) if key == "connection.baud_rate"
        ));

        let mut config = Config::new();
        config.connection.port = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.sender.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.engine.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/config.json")).unwrap(),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("config.yaml")),
            Err(SettingsError::Config(ConfigError::UnsupportedFormat(_)))
        ));
        assert!(ConfigFormat::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            port = "COM3"

            [engine]
            read_mode = "manual"
            read_failure = "emit_failed"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.port, "COM3");
        assert_eq!(config.connection.baud_rate, 9600);
        assert_eq!(config.sender, SenderSettings::default());
        assert_eq!(config.engine.read_mode, ReadMode::Manual);
        assert_eq!(config.engine.read_failure, ReadFailurePolicy::EmitFailed);
    }

    #[test]
    fn test_out_of_range_brightness_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[sender]\nbrightness = 256\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_auto_port_case_insensitive() {
        let connection = ConnectionSettings {
            port: "auto".to_string(),
            baud_rate: 9600,
        };
        assert!(connection.is_auto_port());
    }
}
