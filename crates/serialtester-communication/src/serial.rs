//! Serial port transport
//!
//! Provides the hardware [`LineTransport`] on top of the `serialport` crate,
//! plus port enumeration.
//!
//! The port is opened once and cloned into a read half and a write half,
//! each behind its own lock, so a read and a write can be in progress at the
//! same time. Reads poll with a short timeout so that `close()` (or a new
//! `open()`) interrupts a read that is waiting for data.

use crate::transport::{strip_terminator, LineTransport, LINE_TERMINATOR};
use parking_lot::Mutex;
use serialtester_core::{Error, PortConfig, Result, TransportError, TransportResult};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Poll interval used for blocking reads
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Longest line accepted from the device, terminator included
pub const MAX_LINE_LENGTH: usize = 4096;

/// An enumerated serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Device name to pass to `configure` (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Human readable kind of port
    pub description: String,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB serial number
    pub serial_number: Option<String>,
    /// USB vendor id
    pub vid: Option<u16>,
    /// USB product id
    pub pid: Option<u16>,
}

impl From<&serialport::SerialPortInfo> for SerialPortInfo {
    fn from(port: &serialport::SerialPortInfo) -> Self {
        match &port.port_type {
            serialport::SerialPortType::UsbPort(usb) => Self {
                port_name: port.port_name.clone(),
                description: format!(
                    "USB {}",
                    usb.product.as_deref().unwrap_or("serial adapter")
                ),
                manufacturer: usb.manufacturer.clone(),
                serial_number: usb.serial_number.clone(),
                vid: Some(usb.vid),
                pid: Some(usb.pid),
            },
            other => Self {
                port_name: port.port_name.clone(),
                description: match other {
                    serialport::SerialPortType::BluetoothPort => "Bluetooth",
                    serialport::SerialPortType::PciPort => "PCI",
                    _ => "Serial",
                }
                .to_string(),
                manufacturer: None,
                serial_number: None,
                vid: None,
                pid: None,
            },
        }
    }
}

/// Enumerate the host's serial ports, unfiltered
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::warn!("Port enumeration failed: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;
    Ok(ports.iter().map(SerialPortInfo::from).collect())
}

/// Read half of an open port with its partial-line buffer
struct LineReader<R = Box<dyn serialport::SerialPort>> {
    port: R,
    pending: Vec<u8>,
    /// Generation of the `open()` that installed this reader
    generation: u64,
}

impl<R: Read> LineReader<R> {
    fn new(port: R, generation: u64) -> Self {
        Self {
            port,
            pending: Vec::with_capacity(128),
            generation,
        }
    }

    /// Pop one complete line out of the pending buffer
    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw);
        Some(strip_terminator(&text).to_string())
    }

    /// Read whatever the port has into the pending buffer
    ///
    /// A poll timeout is not an error. Fails once the buffer holds more
    /// than [`MAX_LINE_LENGTH`] bytes with no terminator; the buffer is
    /// discarded in that case.
    fn fill(&mut self) -> TransportResult<()> {
        let mut buf = [0u8; 256];
        match self.port.read(&mut buf) {
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                if self.pending.len() > MAX_LINE_LENGTH && !self.pending.contains(&b'\n') {
                    self.pending.clear();
                    return Err(TransportError::LineTooLong {
                        limit: MAX_LINE_LENGTH,
                    });
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// Drop the reader in `slot` only if it belongs to `generation`
fn retire_reader<R>(slot: &mut Option<LineReader<R>>, generation: u64) {
    if slot.as_ref().is_some_and(|r| r.generation == generation) {
        slot.take();
    }
}

/// [`LineTransport`] backed by a platform serial port
pub struct SerialLineTransport {
    writer: Mutex<Option<Box<dyn serialport::SerialPort>>>,
    reader: Mutex<Option<LineReader>>,
    open: AtomicBool,
    /// Bumped on every open and close so stale reads bail out
    generation: AtomicU64,
    device: Mutex<String>,
    poll_timeout: Duration,
}

impl SerialLineTransport {
    /// Create a closed transport
    pub fn new() -> Self {
        Self::with_poll_timeout(DEFAULT_POLL_TIMEOUT)
    }

    /// Create a closed transport with a custom read poll interval
    pub fn with_poll_timeout(poll_timeout: Duration) -> Self {
        Self {
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            open: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            device: Mutex::new(String::new()),
            poll_timeout,
        }
    }

    /// Check whether the port is currently open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Default for SerialLineTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LineTransport for SerialLineTransport {
    fn open(&self, config: &PortConfig) -> TransportResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.open.store(false, Ordering::SeqCst);

        let port = serialport::new(&config.device_name, config.baud_rate)
            .timeout(self.poll_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", config.device_name, e);
                TransportError::OpenFailed {
                    device: config.device_name.clone(),
                    reason: e.to_string(),
                }
            })?;

        let read_half = port.try_clone().map_err(|e| TransportError::OpenFailed {
            device: config.device_name.clone(),
            reason: format!("cannot clone port handle: {}", e),
        })?;

        *self.reader.lock() = Some(LineReader::new(read_half, generation));
        *self.writer.lock() = Some(port);
        *self.device.lock() = config.device_name.clone();
        self.open.store(true, Ordering::SeqCst);

        tracing::debug!("Serial port {} opened", config);
        Ok(())
    }

    fn close(&self) -> TransportResult<()> {
        let was_open = self.open.swap(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);

        let writer = self.writer.lock().take();
        // a blocked reader holds the lock and retires its half itself
        if let Some(mut reader) = self.reader.try_lock() {
            reader.take();
        }

        if !was_open {
            return Err(TransportError::NotOpen);
        }

        if let Some(mut port) = writer {
            port.flush()?;
        }

        tracing::debug!("Serial port {} closed", self.device.lock());
        Ok(())
    }

    fn read_line(&self) -> TransportResult<String> {
        let generation = self.generation.load(Ordering::SeqCst);
        let mut guard = self.reader.lock();

        loop {
            if !self.open.load(Ordering::SeqCst)
                || self.generation.load(Ordering::SeqCst) != generation
            {
                // never touch a reader installed by a later open()
                retire_reader(&mut *guard, generation);
                return Err(TransportError::Closed);
            }

            let reader = guard.as_mut().ok_or(TransportError::NotOpen)?;
            if reader.generation != generation {
                return Err(TransportError::Closed);
            }
            if let Some(line) = reader.take_line() {
                return Ok(line);
            }
            reader.fill()?;
        }
    }

    fn write_line(&self, line: &str) -> TransportResult<()> {
        let mut guard = self.writer.lock();
        let port = guard.as_mut().ok_or(TransportError::NotOpen)?;

        let mut data = String::with_capacity(line.len() + LINE_TERMINATOR.len());
        data.push_str(line);
        data.push_str(LINE_TERMINATOR);

        port.write_all(data.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn name(&self) -> String {
        let device = self.device.lock();
        if device.is_empty() {
            "serial".to_string()
        } else {
            format!("serial:{}", device)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_closed_transport_rejects_io() {
        let transport = SerialLineTransport::new();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write_line("x"),
            Err(TransportError::NotOpen)
        ));
        assert!(matches!(transport.close(), Err(TransportError::NotOpen)));
        assert_eq!(transport.name(), "serial");
    }

    #[test]
    fn test_open_missing_device_fails() {
        let transport = SerialLineTransport::new();
        let config = PortConfig::new(9600, "/dev/serialtester-does-not-exist").unwrap();
        assert!(matches!(
            transport.open(&config),
            Err(TransportError::OpenFailed { .. })
        ));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_port_info_describes_port_type() {
        let port = serialport::SerialPortInfo {
            port_name: "/dev/rfcomm0".to_string(),
            port_type: serialport::SerialPortType::BluetoothPort,
        };
        let info = SerialPortInfo::from(&port);
        assert_eq!(info.port_name, "/dev/rfcomm0");
        assert_eq!(info.description, "Bluetooth");
        assert_eq!(info.vid, None);

        let port = serialport::SerialPortInfo {
            port_name: "COM1".to_string(),
            port_type: serialport::SerialPortType::Unknown,
        };
        assert_eq!(SerialPortInfo::from(&port).description, "Serial");
    }

    #[test]
    fn test_reader_splits_lines() {
        let mut reader = LineReader::new(Cursor::new(b"001-a\r\n002-b\npartial".to_vec()), 1);
        reader.fill().unwrap();

        assert_eq!(reader.take_line().as_deref(), Some("001-a"));
        assert_eq!(reader.take_line().as_deref(), Some("002-b"));
        assert_eq!(reader.take_line(), None);
        assert_eq!(reader.pending, b"partial");
    }

    #[test]
    fn test_reader_rejects_unterminated_flood() {
        let mut reader = LineReader::new(Cursor::new(vec![b'7'; MAX_LINE_LENGTH * 2]), 1);

        let mut result = Ok(());
        for _ in 0..64 {
            result = reader.fill();
            if result.is_err() {
                break;
            }
        }

        assert!(matches!(
            result,
            Err(TransportError::LineTooLong { limit: MAX_LINE_LENGTH })
        ));
        assert!(reader.pending.is_empty());
    }

    #[test]
    fn test_long_line_with_terminator_is_accepted() {
        let mut data = vec![b'x'; MAX_LINE_LENGTH - 1];
        data.push(b'\n');
        let mut reader = LineReader::new(Cursor::new(data), 1);

        let line = loop {
            reader.fill().unwrap();
            if let Some(line) = reader.take_line() {
                break line;
            }
        };
        assert_eq!(line.len(), MAX_LINE_LENGTH - 1);
    }

    #[test]
    fn test_stale_read_keeps_newer_reader() {
        let mut slot = Some(LineReader::new(Cursor::new(Vec::new()), 3));

        // a read that started under generation 1 must leave generation 3 alone
        retire_reader(&mut slot, 1);
        assert!(slot.is_some());

        retire_reader(&mut slot, 3);
        assert!(slot.is_none());
    }
}
