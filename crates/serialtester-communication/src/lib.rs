//! # Serial Tester Communication
//!
//! Line transports and the asynchronous communication engine.
//! Supports platform serial ports and an in-memory loopback.

pub mod engine;
pub mod loopback;
pub mod serial;
pub mod transport;

pub use engine::{CommunicationEngine, EngineOptions};
pub use loopback::{FaultPlan, LoopbackTransport};
pub use serial::{list_ports, SerialLineTransport, SerialPortInfo};
pub use transport::{strip_terminator, LineTransport, LINE_TERMINATOR};
