//! # Serial Tester
//!
//! A line-oriented serial port tester. It opens a serial device, streams
//! synthetic lighting-controller payload lines to it on a timer, and logs
//! every line the device sends back.
//!
//! ## Architecture
//!
//! Serial Tester is organized as a workspace with multiple crates:
//!
//! 1. **serialtester-core** - Errors, session state, events, payload generator
//! 2. **serialtester-communication** - Line transports and the communication engine
//! 3. **serialtester-settings** - Persistent tester configuration
//! 4. **serialtester** - Payload sender and the command-line binary

pub mod runner;

pub use serialtester_communication::{
    list_ports, CommunicationEngine, EngineOptions, FaultPlan, LineTransport, LoopbackTransport,
    SerialLineTransport, SerialPortInfo,
};

pub use serialtester_core::{
    EngineError, EngineEvent, EngineListener, Error, EventFilter, PayloadGenerator, PayloadLine,
    PortConfig, ReadFailurePolicy, ReadMode, Result, SessionState, TransportError,
};

pub use serialtester_settings::{Config, SettingsError};

pub use runner::{run_sender, RunOptions, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output
/// - RUST_LOG environment variable support
/// - `verbosity` raising the default level (0 = info, 1 = debug, 2+ = trace)
pub fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(verbosity > 0)
        .with_level(true)
        .with_thread_ids(verbosity > 1)
        .with_line_number(verbosity > 1);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
