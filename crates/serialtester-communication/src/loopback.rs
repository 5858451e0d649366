//! In-memory loopback transport
//!
//! Every line written becomes readable again, as if the device echoed it.
//! [`LoopbackTransport`] also carries fault injection and read/write
//! counters so that engine behaviour can be exercised without hardware.
//!
//! # Example
//!
//! ```
//! use serialtester_communication::{LineTransport, LoopbackTransport};
//! use serialtester_core::PortConfig;
//!
//! let loopback = LoopbackTransport::new();
//! loopback.open(&PortConfig::new(9600, "loop").unwrap()).unwrap();
//! loopback.write_line("hello").unwrap();
//! assert_eq!(loopback.read_line().unwrap(), "hello");
//! ```

use crate::transport::LineTransport;
use parking_lot::{Condvar, Mutex};
use serialtester_core::{PortConfig, TransportError, TransportResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Faults to inject into a [`LoopbackTransport`]
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// `open()` fails
    pub fail_open: bool,
    /// `close()` fails (the loopback still ends up closed)
    pub fail_close: bool,
    /// every `write_line()` fails
    pub fail_writes: bool,
    /// every `read_line()` fails, including reads already waiting
    pub fail_reads: bool,
    /// every `write_line()` sleeps this long first
    pub write_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct LoopbackState {
    open: bool,
    config: Option<PortConfig>,
    inbound: VecDeque<String>,
    written: Vec<String>,
}

/// Loopback [`LineTransport`]
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    ready: Condvar,
    faults: Mutex<FaultPlan>,
    fail_reads: AtomicBool,
    reads_started: AtomicUsize,
    reads_in_flight: AtomicUsize,
    max_reads_in_flight: AtomicUsize,
    writes_started: AtomicUsize,
    open_count: AtomicUsize,
}

/// Decrements the in-flight counter however the read returns
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LoopbackTransport {
    /// Create a closed loopback with no faults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a closed loopback with the given faults
    pub fn with_faults(faults: FaultPlan) -> Self {
        let transport = Self::new();
        transport.set_faults(faults);
        transport
    }

    /// Replace the fault plan; waiting readers observe `fail_reads` at once
    pub fn set_faults(&self, faults: FaultPlan) {
        self.fail_reads.store(faults.fail_reads, Ordering::SeqCst);
        *self.faults.lock() = faults;
        let _state = self.state.lock();
        self.ready.notify_all();
    }

    /// Current fault plan
    pub fn faults(&self) -> FaultPlan {
        self.faults.lock().clone()
    }

    /// Queue a line as if the device had sent it unprompted
    pub fn inject_line(&self, line: impl Into<String>) {
        let mut state = self.state.lock();
        state.inbound.push_back(line.into());
        self.ready.notify_all();
    }

    /// Lines written so far, in completion order
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// Configuration applied by the last successful `open()`
    pub fn config(&self) -> Option<PortConfig> {
        self.state.lock().config.clone()
    }

    /// Check whether the loopback is open
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Number of `read_line()` calls made
    pub fn reads_started(&self) -> usize {
        self.reads_started.load(Ordering::SeqCst)
    }

    /// Number of `read_line()` calls currently blocked or running
    pub fn reads_in_flight(&self) -> usize {
        self.reads_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `read_line()` calls observed
    pub fn max_reads_in_flight(&self) -> usize {
        self.max_reads_in_flight.load(Ordering::SeqCst)
    }

    /// Number of `write_line()` calls made
    pub fn writes_started(&self) -> usize {
        self.writes_started.load(Ordering::SeqCst)
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

impl LineTransport for LoopbackTransport {
    fn open(&self, config: &PortConfig) -> TransportResult<()> {
        if self.faults.lock().fail_open {
            return Err(TransportError::OpenFailed {
                device: config.device_name.clone(),
                reason: "injected open failure".to_string(),
            });
        }

        let mut state = self.state.lock();
        state.open = true;
        state.config = Some(config.clone());
        state.inbound.clear();
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> TransportResult<()> {
        let fail = self.faults.lock().fail_close;

        let mut state = self.state.lock();
        let was_open = std::mem::replace(&mut state.open, false);
        self.ready.notify_all();
        drop(state);

        if fail {
            return Err(TransportError::injected("close failure"));
        }
        if !was_open {
            return Err(TransportError::NotOpen);
        }
        Ok(())
    }

    fn read_line(&self) -> TransportResult<String> {
        self.reads_started.fetch_add(1, Ordering::SeqCst);
        let now = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reads_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.reads_in_flight);

        let mut state = self.state.lock();
        loop {
            if !state.open {
                return Err(TransportError::Closed);
            }
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(TransportError::injected("read failure"));
            }
            if let Some(line) = state.inbound.pop_front() {
                return Ok(line);
            }
            self.ready.wait(&mut state);
        }
    }

    fn write_line(&self, line: &str) -> TransportResult<()> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        let faults = self.faults();

        if let Some(delay) = faults.write_delay {
            std::thread::sleep(delay);
        }
        if faults.fail_writes {
            return Err(TransportError::injected("write failure"));
        }

        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::Closed);
        }
        state.written.push(line.to_string());
        state.inbound.push_back(line.to_string());
        self.ready.notify_all();
        Ok(())
    }

    fn name(&self) -> String {
        "loopback".to_string()
    }
}
