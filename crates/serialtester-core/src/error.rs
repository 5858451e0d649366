//! Error handling for Serial Tester
//!
//! Two layers of errors exist:
//! - Transport errors (anything the underlying device reports)
//! - Engine errors (synchronous precondition failures on the engine API)
//!
//! Transport errors never reach the engine's caller directly: the engine
//! converts them into a `Failed` event. Engine errors are returned from the
//! call that violated a precondition and never produce an event.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport error type
///
/// Any failure from the underlying line transport: open failure,
/// closed-while-in-use, device removed, write failure, read failure.
/// The engine treats every variant the same way; the variants exist
/// for logging only.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No port configuration has been applied
    #[error("Transport not configured")]
    NotConfigured,

    /// The transport has not been opened
    #[error("Transport not open")]
    NotOpen,

    /// The transport was closed while an operation was in progress
    #[error("Transport closed")]
    Closed,

    /// The device could not be opened
    #[error("Failed to open {device}: {reason}")]
    OpenFailed {
        /// The device name that failed to open.
        device: String,
        /// The reason reported by the platform.
        reason: String,
    },

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device sent more than `limit` bytes without a line terminator
    #[error("Line exceeds {limit} bytes without a terminator")]
    LineTooLong {
        /// The buffer limit in bytes.
        limit: usize,
    },

    /// Fault injected by a test transport
    #[error("Injected fault: {0}")]
    Injected(String),
}

impl TransportError {
    /// Create an injected fault
    pub fn injected(msg: impl Into<String>) -> Self {
        TransportError::Injected(msg.into())
    }
}

/// Engine error type
///
/// Returned synchronously from engine calls whose preconditions do not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Port configuration rejected
    #[error("Invalid port configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// Configuration cannot change while a session is open
    #[error("Cannot reconfigure while the port is open")]
    ConfigureWhileOpen,

    /// The engine has no open session
    #[error("Port not open")]
    NotOpen,

    /// Payload contains a line terminator
    #[error("Payload contains a line terminator")]
    EmbeddedTerminator,

    /// A read is already outstanding
    #[error("A read is already in flight")]
    ReadInFlight,

    /// No tokio runtime was available when the engine was created
    #[error("No tokio runtime available")]
    NoRuntime,
}

/// Main error type for Serial Tester
///
/// A unified error type that can represent any error from the library crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is an engine error
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::Engine(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;
