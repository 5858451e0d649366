//! Session state and port configuration

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a communication engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No session; the initial state
    #[default]
    Closed,
    /// Transport open and owned by the engine
    Open,
    /// The last lifecycle operation or write failed
    Failed,
}

impl SessionState {
    /// Check if a transition from this state to `target` is valid.
    ///
    /// Returns `true` for valid transitions:
    /// - Closed → Open, Failed
    /// - Failed → Open, Failed
    /// - Open → Closed, Failed, Open
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Closed | Failed, Open | Failed) | (Open, Closed | Failed | Open)
        )
    }

    /// Check if the engine owns an open transport
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Serial port parameters applied on `open()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Byte rate of the line
    pub baud_rate: u32,
    /// Platform device name (e.g., "COM3", "/dev/ttyUSB0")
    pub device_name: String,
}

impl PortConfig {
    /// Create a validated configuration
    pub fn new(baud_rate: u32, device_name: impl Into<String>) -> Result<Self, EngineError> {
        let config = Self {
            baud_rate,
            device_name: device_name.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.baud_rate == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "baud rate must be > 0".to_string(),
            });
        }

        if self.device_name.trim().is_empty() {
            return Err(EngineError::InvalidConfig {
                reason: "device name must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for PortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} baud", self.device_name, self.baud_rate)
    }
}

/// How the receive loop is re-armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// The engine runs the receive loop itself, starting on `open()`
    #[default]
    Continuous,
    /// The consumer schedules each read with `read_line_async()`
    Manual,
}

/// What a failed read does to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Stop reading without an event; the session stays open
    #[default]
    Silent,
    /// Transition to `Failed` and emit `Failed`, like a write failure
    EmitFailed,
}
