//! Engine listener interface
//!
//! Defines the listener trait for engine events

/// Listener trait for engine events
///
/// Implement this trait to receive notifications from a communication
/// engine. Callbacks may run on any worker thread; a listener that needs a
/// specific thread must marshal the call itself.
pub trait EngineListener: Send + Sync {
    /// Called when the port has been opened
    fn on_opened(&self) {}

    /// Called when the port has been closed
    fn on_closed(&self) {}

    /// Called when an open, close or write failed
    fn on_failed(&self) {}

    /// Called for every complete line received
    fn on_line_received(&self, _line: &str) {}
}
