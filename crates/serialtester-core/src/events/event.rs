//! Event types emitted by the communication engine.

use serde::{Deserialize, Serialize};

/// Event emitted by an engine to its sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The transport was opened
    Opened,
    /// The transport was closed on request
    Closed,
    /// A lifecycle operation or write failed
    Failed,
    /// A complete line arrived, terminator stripped
    LineReceived(String),
}

impl EngineEvent {
    /// Get the kind of this event for filtering
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Opened => EventKind::Opened,
            EngineEvent::Closed => EventKind::Closed,
            EngineEvent::Failed => EventKind::Failed,
            EngineEvent::LineReceived(_) => EventKind::LineReceived,
        }
    }

    /// Check if this is a lifecycle event (anything but received data)
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, EngineEvent::LineReceived(_))
    }
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::Opened => write!(f, "Opened"),
            EngineEvent::Closed => write!(f, "Closed"),
            EngineEvent::Failed => write!(f, "Failed"),
            EngineEvent::LineReceived(line) => write!(f, "Line received: {}", line),
        }
    }
}

/// Event kind for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Port opened.
    Opened,
    /// Port closed.
    Closed,
    /// Port failed.
    Failed,
    /// Line received.
    LineReceived,
}

/// Filter to receive only specific event kinds
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive events matching any of these kinds.
    Kinds(Vec<EventKind>),
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &EngineEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kinds(kinds) => kinds.contains(&event.kind()),
        }
    }
}
