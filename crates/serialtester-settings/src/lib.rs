//! Serial Tester Settings Crate
//!
//! Handles tester configuration and its persistence.

pub mod config;
pub mod error;

pub use config::{
    Config, ConfigFormat, ConnectionSettings, EngineSettings, SenderSettings, AUTO_PORT,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
