//! # Serial Tester Core
//!
//! Core types shared by the Serial Tester crates: the error taxonomy,
//! session state and port configuration, engine events with their listener
//! registry, and the synthetic payload generator.

pub mod error;
pub mod events;
pub mod payload;
pub mod session;

pub use error::{EngineError, Error, Result, TransportError, TransportResult};

pub use events::{
    EngineEvent, EngineListener, EventFilter, EventKind, EventListeners, SubscriptionId,
};

pub use payload::{EffectCode, ParsePayloadError, PayloadGenerator, PayloadLine, Rgb};

pub use session::{PortConfig, ReadFailurePolicy, ReadMode, SessionState};
