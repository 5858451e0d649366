//! # Events
//!
//! Event types emitted by a communication engine and the registry that
//! delivers them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use serialtester_core::events::{EngineEvent, EventFilter, EventListeners};
//!
//! let listeners = EventListeners::new();
//! let id = listeners.subscribe(EventFilter::All, |event| {
//!     if let EngineEvent::LineReceived(line) = event {
//!         println!("<< {}", line);
//!     }
//! });
//!
//! listeners.unsubscribe(id);
//! ```

mod event;
mod listener;
mod registry;

pub use event::*;
pub use listener::*;
pub use registry::*;
