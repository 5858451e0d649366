//! Payload sender
//!
//! Drives a [`CommunicationEngine`] from a tick timer: every tick sends one
//! payload pair (effect 1, then effect 2) and every received line is logged.
//! A `Failed` event stops the sender.

use serialtester_communication::{CommunicationEngine, EngineOptions};
use serialtester_core::{
    EngineEvent, EventFilter, PayloadGenerator, ReadMode, Result, SessionState,
};
use serialtester_settings::{Config, EngineSettings};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

/// Parameters of one sender run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Serial device name
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Time between payload pairs
    pub interval: Duration,
    /// Ticks to send before stopping; unlimited when `None`
    pub count: Option<u64>,
    /// How long to keep receiving after the last tick
    pub linger: Duration,
    /// Brightness field of every payload line
    pub brightness: u8,
    /// Trailing field of every payload line
    pub trailer: u8,
    /// Engine behaviour
    pub engine: EngineOptions,
}

impl RunOptions {
    /// Build run options from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let interval = Duration::from_millis(config.sender.interval_ms);
        Self {
            port: config.connection.port.clone(),
            baud_rate: config.connection.baud_rate,
            interval,
            count: config.sender.count,
            linger: interval,
            brightness: config.sender.brightness,
            trailer: config.sender.trailer,
            engine: engine_options(&config.engine),
        }
    }

    /// Payload generator seeded from entropy with these constants
    pub fn generator(&self) -> PayloadGenerator {
        PayloadGenerator::new()
            .brightness(self.brightness)
            .trailer(self.trailer)
    }
}

/// Engine options from the engine settings section
pub fn engine_options(settings: &EngineSettings) -> EngineOptions {
    EngineOptions {
        read_mode: settings.read_mode,
        read_failure: settings.read_failure,
        channel_capacity: settings.channel_capacity,
    }
}

/// Outcome of a sender run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks completed
    pub ticks: u64,
    /// Lines handed to the engine
    pub lines_sent: u64,
    /// Lines received from the device
    pub lines_received: u64,
    /// Whether the session ended in `Failed`
    pub failed: bool,
}

/// Shared between the event handler and the sender loop
#[derive(Default)]
struct RunMonitor {
    received: AtomicU64,
    failed: AtomicBool,
    failure: Notify,
}

impl RunMonitor {
    fn on_event(&self, event: &EngineEvent, rearm: Option<&Weak<CommunicationEngine>>) {
        match event {
            EngineEvent::Opened => {
                tracing::info!("PASS: port open");
                rearm_read(rearm);
            }
            EngineEvent::LineReceived(line) => {
                self.received.fetch_add(1, Ordering::SeqCst);
                tracing::info!("<< {}", line);
                rearm_read(rearm);
            }
            EngineEvent::Failed => {
                tracing::error!("FAIL: port failed, sender stopped");
                self.failed.store(true, Ordering::SeqCst);
                self.failure.notify_one();
            }
            EngineEvent::Closed => tracing::info!("Port closed"),
        }
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

fn rearm_read(engine: Option<&Weak<CommunicationEngine>>) {
    if let Some(engine) = engine.and_then(Weak::upgrade) {
        if let Err(e) = engine.read_line_async() {
            tracing::debug!("Read not re-armed: {}", e);
        }
    }
}

/// Configure and open `engine`, send payload pairs until done, then close
///
/// Stops after `options.count` ticks, when `shutdown` resolves, or when the
/// engine reports `Failed`. Configuration errors are returned; transport
/// failures show up as `RunSummary::failed`.
pub async fn run_sender<F>(
    engine: Arc<CommunicationEngine>,
    options: &RunOptions,
    mut generator: PayloadGenerator,
    shutdown: F,
) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    engine.configure(options.baud_rate, options.port.clone())?;

    let monitor = Arc::new(RunMonitor::default());
    let rearm = (options.engine.read_mode == ReadMode::Manual).then(|| Arc::downgrade(&engine));
    let subscription = {
        let monitor = Arc::clone(&monitor);
        engine.subscribe(EventFilter::All, move |event| {
            monitor.on_event(event, rearm.as_ref())
        })
    };

    tracing::info!(
        "Opening {} @ {} baud on {}",
        options.port,
        options.baud_rate,
        engine.transport_name()
    );
    engine.open();

    let mut summary = RunSummary::default();
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);
    let mut interrupted = false;

    'sender: while !monitor.has_failed() {
        if options.count.is_some_and(|count| summary.ticks >= count) {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                interrupted = true;
                break;
            }
            _ = monitor.failure.notified() => break,
            _ = ticker.tick() => {}
        }

        for line in generator.next_pair() {
            match engine.send_line_async(line.clone()) {
                Ok(()) => {
                    summary.lines_sent += 1;
                    tracing::debug!(">> {}", line);
                }
                Err(e) => {
                    tracing::warn!("Send refused: {}", e);
                    break 'sender;
                }
            }
        }
        summary.ticks += 1;
    }

    if !interrupted && !monitor.has_failed() && !options.linger.is_zero() {
        tokio::select! {
            _ = &mut shutdown => {}
            _ = monitor.failure.notified() => {}
            _ = tokio::time::sleep(options.linger) => {}
        }
    }

    engine.close();
    engine.unsubscribe(subscription);

    summary.lines_received = monitor.received.load(Ordering::SeqCst);
    summary.failed = monitor.has_failed() || engine.state() == SessionState::Failed;
    tracing::info!(
        "Sent {} lines in {} ticks, received {}",
        summary.lines_sent,
        summary.ticks,
        summary.lines_received
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialtester_core::ReadFailurePolicy;

    #[test]
    fn test_options_from_config() {
        let mut config = Config::new();
        config.connection.port = "COM3".to_string();
        config.sender.interval_ms = 250;
        config.sender.count = Some(4);
        config.engine.read_mode = ReadMode::Manual;
        config.engine.read_failure = ReadFailurePolicy::EmitFailed;

        let options = RunOptions::from_config(&config);
        assert_eq!(options.port, "COM3");
        assert_eq!(options.baud_rate, 9600);
        assert_eq!(options.interval, Duration::from_millis(250));
        assert_eq!(options.linger, options.interval);
        assert_eq!(options.count, Some(4));
        assert_eq!(options.engine.read_mode, ReadMode::Manual);
        assert_eq!(options.engine.read_failure, ReadFailurePolicy::EmitFailed);
    }
}
