//! Asynchronous communication engine
//!
//! [`CommunicationEngine`] owns a [`LineTransport`], tracks the session
//! state (`Closed` / `Open` / `Failed`) and turns every transport outcome
//! into an [`EngineEvent`] for whatever sinks are subscribed.
//!
//! Lifecycle calls (`configure`, `open`, `close`) run on the caller's
//! thread. Reads and writes run as blocking units on the tokio runtime the
//! engine was created on, so events may arrive on any worker thread.
//!
//! Each successful `open()` starts a new session. `close()` and failures end
//! it, and any read or write still running for an ended session is stale:
//! its outcome is logged and otherwise ignored.

use crate::transport::LineTransport;
use parking_lot::{Mutex, RwLock};
use serialtester_core::{
    EngineError, EngineEvent, EngineListener, EventFilter, EventListeners, PortConfig,
    ReadFailurePolicy, ReadMode, SessionState, SubscriptionId, TransportError, TransportResult,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;

/// No read outstanding
const NO_READER: u64 = 0;

/// No session open
const NO_SESSION: u64 = 0;

/// Engine behaviour switches
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Who re-arms the receive loop
    pub read_mode: ReadMode,
    /// What a failed read does
    pub read_failure: ReadFailurePolicy,
    /// Capacity of the async event channel
    pub channel_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            read_mode: ReadMode::Continuous,
            read_failure: ReadFailurePolicy::Silent,
            channel_capacity: serialtester_core::events::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: SessionState,
    /// Id of the current session; bumped whenever a session starts or ends
    session: u64,
}

struct EngineInner {
    transport: Arc<dyn LineTransport>,
    lifecycle: Mutex<Lifecycle>,
    config: RwLock<Option<PortConfig>>,
    options: EngineOptions,
    listeners: EventListeners,
    /// Id of the open session, or `NO_SESSION`; mirrors `lifecycle`
    live: AtomicU64,
    /// Session id of the outstanding read, or `NO_READER`
    reader_session: AtomicU64,
    /// Held across every `read_line` on the transport
    read_gate: Mutex<()>,
    runtime: Handle,
}

/// Line-oriented serial communication engine
pub struct CommunicationEngine {
    inner: Arc<EngineInner>,
}

impl CommunicationEngine {
    /// Create an engine with default options on the current tokio runtime
    pub fn new(transport: Arc<dyn LineTransport>) -> Result<Self, EngineError> {
        Self::with_options(transport, EngineOptions::default())
    }

    /// Create an engine on the current tokio runtime
    pub fn with_options(
        transport: Arc<dyn LineTransport>,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self::with_runtime(transport, options, runtime))
    }

    /// Create an engine that schedules its I/O on `runtime`
    pub fn with_runtime(
        transport: Arc<dyn LineTransport>,
        options: EngineOptions,
        runtime: Handle,
    ) -> Self {
        let listeners = EventListeners::with_capacity(options.channel_capacity);
        Self {
            inner: Arc::new(EngineInner {
                transport,
                lifecycle: Mutex::new(Lifecycle {
                    state: SessionState::Closed,
                    session: 0,
                }),
                config: RwLock::new(None),
                options,
                listeners,
                live: AtomicU64::new(NO_SESSION),
                reader_session: AtomicU64::new(NO_READER),
                read_gate: Mutex::new(()),
                runtime,
            }),
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.lock().state
    }

    /// Check whether a session is open
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Last applied configuration
    pub fn config(&self) -> Option<PortConfig> {
        self.inner.config.read().clone()
    }

    /// Engine options
    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Name of the underlying transport
    pub fn transport_name(&self) -> String {
        self.inner.transport.name()
    }

    /// The listener registry of this engine
    pub fn listeners(&self) -> &EventListeners {
        &self.inner.listeners
    }

    /// Subscribe a handler closure
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(filter, handler)
    }

    /// Subscribe an [`EngineListener`]
    pub fn add_listener(&self, listener: Arc<dyn EngineListener>) -> SubscriptionId {
        self.inner.listeners.add_listener(listener)
    }

    /// Remove a subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Apply port parameters for the next `open()`
    ///
    /// No state change and no event. Refused while a session is open.
    pub fn configure(
        &self,
        baud_rate: u32,
        device_name: impl Into<String>,
    ) -> Result<(), EngineError> {
        let config = PortConfig::new(baud_rate, device_name)?;

        let lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state.is_open() {
            return Err(EngineError::ConfigureWhileOpen);
        }

        tracing::debug!("Port configured: {}", config);
        *self.inner.config.write() = Some(config);
        Ok(())
    }

    /// Open the transport with the last applied configuration
    ///
    /// Emits `Opened` or `Failed`. In [`ReadMode::Continuous`] the receive
    /// loop starts right after `Opened` has been delivered. Calling this
    /// while already open does nothing.
    pub fn open(&self) -> SessionState {
        let (event, session) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state.is_open() {
                tracing::debug!("open() ignored: port already open");
                return SessionState::Open;
            }

            let config = self.inner.config.read().clone();
            let result = match &config {
                Some(config) => {
                    // a read left from the previous session finishes on the
                    // closed transport before it reopens
                    let _gate = self.inner.read_gate.lock();
                    self.inner.transport.open(config)
                }
                None => Err(TransportError::NotConfigured),
            };

            lifecycle.session += 1;
            match result {
                Ok(()) => {
                    lifecycle.state = SessionState::Open;
                    self.inner.live.store(lifecycle.session, Ordering::SeqCst);
                    tracing::info!(
                        "Port opened on {} ({})",
                        self.inner.transport.name(),
                        config.map(|c| c.to_string()).unwrap_or_default()
                    );
                    (EngineEvent::Opened, Some(lifecycle.session))
                }
                Err(e) => {
                    lifecycle.state = SessionState::Failed;
                    tracing::warn!("Failed to open port: {}", e);
                    (EngineEvent::Failed, None)
                }
            }
        };

        self.inner.listeners.emit(event);

        if let Some(session) = session {
            if self.inner.options.read_mode == ReadMode::Continuous {
                self.inner.spawn_read_loop(session);
            }
        }

        self.state()
    }

    /// Close the transport
    ///
    /// Emits `Closed` on success or `Failed` if the transport refuses.
    /// Calling this while `Closed` or `Failed` does nothing.
    pub fn close(&self) -> SessionState {
        let event = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if !lifecycle.state.is_open() {
                tracing::debug!("close() ignored: port is {}", lifecycle.state);
                return lifecycle.state;
            }

            lifecycle.session += 1;
            self.inner.live.store(NO_SESSION, Ordering::SeqCst);
            match self.inner.transport.close() {
                Ok(()) => {
                    lifecycle.state = SessionState::Closed;
                    tracing::info!("Port closed");
                    EngineEvent::Closed
                }
                Err(e) => {
                    lifecycle.state = SessionState::Failed;
                    tracing::warn!("Failed to close port: {}", e);
                    EngineEvent::Failed
                }
            }
        };

        self.inner.listeners.emit(event);
        self.state()
    }

    /// Schedule a write of `payload` and return immediately
    ///
    /// A failed write ends the session with `Failed`; a successful one emits
    /// nothing. Writes are independent and may complete in any order.
    pub fn send_line_async(&self, payload: impl Into<String>) -> Result<(), EngineError> {
        let payload = payload.into();
        if payload.contains(|c| c == '\n' || c == '\r') {
            return Err(EngineError::EmbeddedTerminator);
        }

        let session = self.inner.live_session().ok_or(EngineError::NotOpen)?;

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn_blocking(move || {
            match inner.transport.write_line(&payload) {
                Ok(()) => tracing::trace!(">> {}", payload),
                Err(e) => inner.fail_session(session, "write", e),
            }
        });
        Ok(())
    }

    /// Schedule a single read (manual re-arm)
    ///
    /// Meant for [`ReadMode::Manual`], typically from the `Opened` and
    /// `LineReceived` handlers. Refused while another read of the same
    /// session is outstanding.
    pub fn read_line_async(&self) -> Result<(), EngineError> {
        let session = self.inner.live_session().ok_or(EngineError::NotOpen)?;
        self.inner.claim_reader(session)?;

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn_blocking(move || {
            let result = inner.gated_read(session);
            inner.release_reader(session);
            if let Some(result) = result {
                inner.dispatch_read(session, result);
            }
        });
        Ok(())
    }
}

impl Drop for CommunicationEngine {
    fn drop(&mut self) {
        if self.is_open() {
            self.close();
        }
    }
}

impl std::fmt::Debug for CommunicationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunicationEngine")
            .field("transport", &self.inner.transport.name())
            .field("state", &self.state())
            .field("config", &self.config())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl EngineInner {
    /// Id of the open session, if any
    fn live_session(&self) -> Option<u64> {
        let lifecycle = self.lifecycle.lock();
        lifecycle.state.is_open().then_some(lifecycle.session)
    }

    fn is_live(&self, session: u64) -> bool {
        self.live.load(Ordering::SeqCst) == session
    }

    /// Read one line for `session` under the read gate
    ///
    /// Returns `None` without touching the transport once the session has
    /// ended, so at most one read is ever outstanding across sessions.
    fn gated_read(&self, session: u64) -> Option<TransportResult<String>> {
        let _gate = self.read_gate.lock();
        if !self.is_live(session) {
            return None;
        }
        Some(self.transport.read_line())
    }

    /// Mark `session` as having the outstanding read
    fn claim_reader(&self, session: u64) -> Result<(), EngineError> {
        loop {
            let current = self.reader_session.load(Ordering::SeqCst);
            if current == session {
                return Err(EngineError::ReadInFlight);
            }
            // a reader left over from an ended session does not block
            if self
                .reader_session
                .compare_exchange(current, session, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn release_reader(&self, session: u64) {
        let _ = self.reader_session.compare_exchange(
            session,
            NO_READER,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Run the receive loop for `session` on a blocking worker
    fn spawn_read_loop(self: &Arc<Self>, session: u64) {
        if self.claim_reader(session).is_err() {
            tracing::debug!("Receive loop already running for session {}", session);
            return;
        }

        let inner = Arc::clone(self);
        self.runtime.spawn_blocking(move || {
            tracing::debug!("Receive loop started for session {}", session);
            while let Some(result) = inner.gated_read(session) {
                if !inner.dispatch_read(session, result) {
                    break;
                }
            }
            inner.release_reader(session);
            tracing::debug!("Receive loop ended for session {}", session);
        });
    }

    /// Deliver a read outcome; returns true if a line was delivered
    fn dispatch_read(&self, session: u64, result: TransportResult<String>) -> bool {
        if !self.is_live(session) {
            match result {
                Ok(line) => tracing::debug!("Dropped line from ended session: {}", line),
                Err(e) => tracing::debug!("Read ended with session: {}", e),
            }
            return false;
        }

        match result {
            Ok(line) => {
                tracing::debug!("<< {}", line);
                self.listeners.emit(EngineEvent::LineReceived(line));
                true
            }
            Err(e) => {
                match self.options.read_failure {
                    ReadFailurePolicy::Silent => {
                        tracing::warn!("Read failed, receive loop halted: {}", e);
                    }
                    ReadFailurePolicy::EmitFailed => self.fail_session(session, "read", e),
                }
                false
            }
        }
    }

    /// Move a live session to `Failed` and release the transport
    fn fail_session(&self, session: u64, operation: &str, error: TransportError) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if !(lifecycle.state.is_open() && lifecycle.session == session) {
                tracing::debug!("Ignoring {} failure from ended session: {}", operation, error);
                return;
            }

            lifecycle.state = SessionState::Failed;
            lifecycle.session += 1;
            self.live.store(NO_SESSION, Ordering::SeqCst);
            tracing::warn!("Port failed during {}: {}", operation, error);

            // leave nothing blocked on a failed port
            if let Err(e) = self.transport.close() {
                tracing::debug!("Releasing failed transport: {}", e);
            }
        }

        self.listeners.emit(EngineEvent::Failed);
    }
}
