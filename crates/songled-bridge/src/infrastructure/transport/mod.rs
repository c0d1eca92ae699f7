//! Transport adapters implementing [`ByteStream`](crate::application::link::ByteStream).
//!
//! - `serial` – USB-serial ports through the `serialport` crate.
//! - `locator` – picks one port out of many by probing with `HELLO`.
//! - `mock` – scripted in-memory streams for tests.

pub mod locator;
pub mod mock;
pub mod serial;

use std::fmt;

use crate::application::link::{ByteStream, TransportError};

/// USB vendor and product id of a port's bridge chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbIds {
    pub vid: u16,
    pub pid: u16,
}

/// One enumerated transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    /// OS name used to open the port (`COM6`, `/dev/ttyACM0`).
    pub name: String,
    /// Human-readable description, possibly empty.
    pub description: String,
    /// USB ids when the port sits behind a USB bridge.
    pub usb: Option<UsbIds>,
}

impl PortCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            usb: None,
        }
    }

    pub fn with_usb(mut self, vid: u16, pid: u16) -> Self {
        self.usb = Some(UsbIds { vid, pid });
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether this port matches the given filter.  A `None` half of the
    /// filter matches anything; a port without USB ids matches only the
    /// empty filter.
    pub fn matches_usb(&self, vid: Option<u16>, pid: Option<u16>) -> bool {
        match (self.usb, vid, pid) {
            (_, None, None) => true,
            (None, _, _) => false,
            (Some(ids), vid, pid) => {
                vid.map_or(true, |v| v == ids.vid) && pid.map_or(true, |p| p == ids.pid)
            }
        }
    }
}

impl fmt::Display for PortCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.description.is_empty() {
            write!(f, " - {}", self.description)?;
        }
        if let Some(ids) = self.usb {
            write!(f, " [{:04X}:{:04X}]", ids.vid, ids.pid)?;
        }
        Ok(())
    }
}

/// Opens a named port.  Implemented by the serial opener and the mock.
pub trait PortOpener {
    /// # Errors
    ///
    /// Returns [`TransportError::OpenFailed`] when the port cannot be opened.
    fn open(&self, port: &str) -> Result<Box<dyn ByteStream>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(PortCandidate::new("COM1").matches_usb(None, None));
        assert!(PortCandidate::new("COM2")
            .with_usb(0x303A, 0x1001)
            .matches_usb(None, None));
    }

    #[test]
    fn test_vid_only_filter() {
        let esp = PortCandidate::new("COM6").with_usb(0x303A, 0x1001);
        assert!(esp.matches_usb(Some(0x303A), None));
        assert!(!esp.matches_usb(Some(0x10C4), None));
    }

    #[test]
    fn test_filter_rejects_ports_without_usb_ids() {
        assert!(!PortCandidate::new("COM1").matches_usb(Some(0x303A), Some(0x1001)));
    }

    #[test]
    fn test_display_includes_description_and_ids() {
        let port = PortCandidate::new("COM6")
            .with_description("USB JTAG/serial debug unit")
            .with_usb(0x303A, 0x1001);
        assert_eq!(
            port.to_string(),
            "COM6 - USB JTAG/serial debug unit [303A:1001]"
        );
    }
}
