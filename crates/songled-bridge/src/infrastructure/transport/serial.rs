//! USB-serial transport built on the `serialport` crate.
//!
//! [`SerialStream`] maps the crate's blocking read-with-timeout onto the
//! `ByteStream` contract: a timed-out read is `Ok(0)`, not an error, so the
//! session loop can check its running flag between reads.
//!
//! [`SerialLinkProvider`] decides which port to open on every (re)connect:
//!
//! 1. an explicitly configured port name, used as-is;
//! 2. otherwise the first enumerated port matching the configured USB
//!    VID/PID, if a filter is set;
//! 3. otherwise the [`TransportLocator`] picks among all enumerated ports.
//!
//! After opening, it waits out the settle delay (opening the port toggles
//! DTR, which resets most ESP32 boards) and discards the boot chatter.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPortType};
use tracing::{debug, info};

use crate::application::link::{ByteStream, TransportError};
use crate::application::supervisor::{ConnectError, LinkProvider};

use super::locator::{filter_by_usb_ids, LocatorConfig, TransportLocator};
use super::{PortCandidate, PortOpener, UsbIds};

/// Returns `true` for I/O errors that only mean "no data yet".
fn is_timeout_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

// ── SerialStream ──────────────────────────────────────────────────────────────

/// An open serial port.
pub struct SerialStream {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl ByteStream for SerialStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_timeout_error(&e) => Ok(0),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Io(e.into()))
    }

    /// A vanished USB device makes the driver reject status queries.
    fn is_connected(&self) -> bool {
        self.port.bytes_to_read().is_ok()
    }
}

/// Opens serial ports with a fixed baud rate and read timeout.
#[derive(Debug, Clone, Copy)]
pub struct SerialPortOpener {
    pub baud: u32,
    pub read_timeout: Duration,
}

impl Default for SerialPortOpener {
    fn default() -> Self {
        Self {
            baud: 115_200,
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl PortOpener for SerialPortOpener {
    fn open(&self, port: &str) -> Result<Box<dyn ByteStream>, TransportError> {
        let inner = serialport::new(port, self.baud)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| TransportError::OpenFailed {
                port: port.to_string(),
                source: e.into(),
            })?;
        debug!("opened {port} at {} baud", self.baud);
        Ok(Box::new(SerialStream {
            name: port.to_string(),
            port: inner,
        }))
    }
}

/// Enumerates the serial ports the OS knows about.
///
/// # Errors
///
/// Returns [`TransportError::Io`] if the OS enumeration fails.
pub fn list_ports() -> Result<Vec<PortCandidate>, TransportError> {
    let ports = serialport::available_ports().map_err(|e| TransportError::Io(e.into()))?;
    Ok(ports
        .into_iter()
        .map(|info| {
            let candidate = PortCandidate::new(info.port_name);
            match info.port_type {
                SerialPortType::UsbPort(usb) => {
                    let description = usb
                        .product
                        .or(usb.manufacturer)
                        .unwrap_or_else(|| "USB serial".to_string());
                    PortCandidate {
                        description,
                        usb: Some(UsbIds {
                            vid: usb.vid,
                            pid: usb.pid,
                        }),
                        ..candidate
                    }
                }
                SerialPortType::BluetoothPort => candidate.with_description("Bluetooth"),
                SerialPortType::PciPort => candidate.with_description("PCI"),
                SerialPortType::Unknown => candidate,
            }
        })
        .collect())
}

// ── SerialLinkProvider ────────────────────────────────────────────────────────

/// Which port to use and how to open it.
#[derive(Debug, Clone, Default)]
pub struct SerialSettings {
    /// Explicit port name; skips enumeration and probing.
    pub port: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    /// Pause after opening before the first byte is sent.
    pub settle_delay: Duration,
    pub locator: LocatorConfig,
}

type Enumerator = Box<dyn FnMut() -> Result<Vec<PortCandidate>, TransportError> + Send>;

/// [`LinkProvider`] that resolves and opens a serial port per connect.
pub struct SerialLinkProvider<O = SerialPortOpener> {
    settings: SerialSettings,
    opener: O,
    enumerate: Enumerator,
}

impl SerialLinkProvider<SerialPortOpener> {
    /// Provider over the real serial ports of this machine.
    pub fn system(settings: SerialSettings, opener: SerialPortOpener) -> Self {
        Self::new(settings, opener, list_ports)
    }
}

impl<O: PortOpener> SerialLinkProvider<O> {
    pub fn new<E>(settings: SerialSettings, opener: O, enumerate: E) -> Self
    where
        E: FnMut() -> Result<Vec<PortCandidate>, TransportError> + Send + 'static,
    {
        Self {
            settings,
            opener,
            enumerate: Box::new(enumerate),
        }
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Picks the port name for this connect attempt.
    ///
    /// A VID/PID filter that matches nothing falls through to the handshake
    /// probe.
    ///
    /// # Errors
    ///
    /// [`ConnectError::Unavailable`] when there are no ports at all, and
    /// [`ConnectError::Ambiguous`] when the locator cannot decide.
    pub fn resolve_port(&mut self) -> Result<String, ConnectError> {
        if let Some(port) = &self.settings.port {
            return Ok(port.clone());
        }

        let candidates = (self.enumerate)()?;
        let (vid, pid) = (self.settings.vid, self.settings.pid);

        if vid.is_some() || pid.is_some() {
            if let Some(port) = filter_by_usb_ids(&candidates, vid, pid).into_iter().next() {
                return Ok(port.name);
            }
            info!(
                "no port with USB id {}:{}, probing {} candidate(s)",
                vid.map_or("*".to_string(), |v| format!("{v:04X}")),
                pid.map_or("*".to_string(), |p| format!("{p:04X}")),
                candidates.len()
            );
        }

        let locator = TransportLocator::new(&self.opener, self.settings.locator);
        let chosen = locator.locate(&candidates)?;
        Ok(chosen.name.clone())
    }
}

impl<O: PortOpener> LinkProvider for SerialLinkProvider<O> {
    fn open_link(&mut self) -> Result<Box<dyn ByteStream>, ConnectError> {
        let port = self.resolve_port()?;
        let mut stream = self.opener.open(&port)?;
        info!("connected to {port}");

        if !self.settings.settle_delay.is_zero() {
            thread::sleep(self.settings.settle_delay);
            stream.clear_input()?;
        }
        Ok(stream)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kinds_are_not_errors() {
        assert!(is_timeout_error(&io::ErrorKind::TimedOut.into()));
        assert!(is_timeout_error(&io::ErrorKind::WouldBlock.into()));
        assert!(!is_timeout_error(&io::ErrorKind::BrokenPipe.into()));
    }

    #[test]
    fn test_default_opener_matches_firmware_baud() {
        let opener = SerialPortOpener::default();
        assert_eq!(opener.baud, 115_200);
        assert_eq!(opener.read_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_opening_a_missing_port_reports_its_name() {
        let opener = SerialPortOpener::default();
        match opener.open("/dev/songled-does-not-exist") {
            Err(TransportError::OpenFailed { port, .. }) => {
                assert_eq!(port, "/dev/songled-does-not-exist")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("a nonexistent port must not open"),
        }
    }
}
