//! Line transport interface
//!
//! A line transport is the blocking device layer under the engine. Every
//! method may block and may fail with a [`TransportError`].
//!
//! Implementations must allow one `read_line` to run concurrently with one
//! `write_line`, and must serialise concurrent calls of the same kind.

use serialtester_core::{PortConfig, TransportResult};

/// Terminator appended to every written line
pub const LINE_TERMINATOR: &str = "\n";

/// Blocking, line-oriented device handle
pub trait LineTransport: Send + Sync {
    /// Open the device with the given parameters
    fn open(&self, config: &PortConfig) -> TransportResult<()>;

    /// Close the device
    ///
    /// Must wake any `read_line` blocked on this transport and leave the
    /// device closed even when an error is reported.
    fn close(&self) -> TransportResult<()>;

    /// Block until a complete line arrives; the terminator is stripped
    ///
    /// Returns promptly with an error once the transport is closed.
    fn read_line(&self) -> TransportResult<String>;

    /// Write `line` followed by [`LINE_TERMINATOR`]
    fn write_line(&self, line: &str) -> TransportResult<()>;

    /// Human readable name, for logs
    fn name(&self) -> String;
}

/// Strip a trailing `"\n"` or `"\r\n"`
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
