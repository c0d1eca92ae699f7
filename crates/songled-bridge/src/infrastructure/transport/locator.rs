//! TransportLocator: choose which serial port the device is on.
//!
//! # Probing
//!
//! With one candidate there is nothing to decide: it is returned without
//! being opened.  With several, each is probed in enumeration order:
//!
//! 1. open the port (skip it if that fails);
//! 2. discard stale input;
//! 3. write `HELLO\n`;
//! 4. read lines until one starts with `HELLO` or the probe window closes;
//! 5. close the port.
//!
//! The first port that answers wins and later ports are never opened.  If
//! none answers the result is [`LocateError::AmbiguousTransport`], because
//! guessing could hand the volume knob to an unrelated device.

use std::thread;
use std::time::{Duration, Instant};

use songled_core::protocol::{encode_frame, is_hello_line, Command, LineFramer};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::link::{ByteStream, TransportError};
use crate::application::supervisor::ConnectError;

use super::{PortCandidate, PortOpener};

/// Error type for port location.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no serial ports found")]
    NoCandidates,
    #[error(
        "{} ports found and none answered HELLO; choose one with --port: {}",
        .candidates.len(),
        list_names(.candidates)
    )]
    AmbiguousTransport { candidates: Vec<PortCandidate> },
}

fn list_names(candidates: &[PortCandidate]) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<LocateError> for ConnectError {
    fn from(e: LocateError) -> Self {
        match e {
            LocateError::NoCandidates => ConnectError::Unavailable(e.to_string()),
            LocateError::AmbiguousTransport { .. } => ConnectError::Ambiguous(e.to_string()),
        }
    }
}

/// Timing for the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    /// How long to wait for a `HELLO…` answer on each port.
    pub probe_window: Duration,
    /// Pause between empty reads while probing.
    pub poll_interval: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            probe_window: Duration::from_millis(1200),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Picks the device's port from a candidate list.
pub struct TransportLocator<'a, O: ?Sized> {
    opener: &'a O,
    config: LocatorConfig,
}

impl<'a, O: PortOpener + ?Sized> TransportLocator<'a, O> {
    pub fn new(opener: &'a O, config: LocatorConfig) -> Self {
        Self { opener, config }
    }

    /// Returns the candidate the device is on.
    ///
    /// # Errors
    ///
    /// - [`LocateError::NoCandidates`] for an empty list.
    /// - [`LocateError::AmbiguousTransport`] when several candidates exist
    ///   and none answers the probe.
    pub fn locate<'c>(
        &self,
        candidates: &'c [PortCandidate],
    ) -> Result<&'c PortCandidate, LocateError> {
        match candidates {
            [] => Err(LocateError::NoCandidates),
            [only] => {
                debug!("single candidate {only}, not probing");
                Ok(only)
            }
            _ => {
                for candidate in candidates {
                    if self.probe(&candidate.name) {
                        info!("device answered on {candidate}");
                        return Ok(candidate);
                    }
                }
                Err(LocateError::AmbiguousTransport {
                    candidates: candidates.to_vec(),
                })
            }
        }
    }

    /// Opens `port`, sends `HELLO`, and reports whether a `HELLO…` line came
    /// back within the probe window.  The port is closed before returning.
    pub fn probe(&self, port: &str) -> bool {
        let mut stream = match self.opener.open(port) {
            Ok(stream) => stream,
            Err(e) => {
                debug!("probe skipped {port}: {e}");
                return false;
            }
        };

        match self.exchange(&mut *stream) {
            Ok(answered) => answered,
            Err(e) => {
                warn!("probe on {port} failed: {e}");
                false
            }
        }
    }

    fn exchange(
        &self,
        stream: &mut dyn ByteStream,
    ) -> Result<bool, TransportError> {
        stream.clear_input()?;
        stream.write_all(&encode_frame(&Command::Hello))?;

        let deadline = Instant::now() + self.config.probe_window;
        let mut framer = LineFramer::new();
        let mut buf = [0u8; 256];

        while Instant::now() < deadline {
            let n = stream.read(&mut buf)?;
            if n == 0 {
                thread::sleep(self.config.poll_interval);
                continue;
            }
            // An overflow here only means the port is chatty, not that it is ours.
            if framer.push(&buf[..n]).is_err() {
                continue;
            }
            while let Some(line) = framer.next_line() {
                if is_hello_line(&line) {
                    debug!("probe on {} got {line:?}", stream.name());
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Keeps the candidates whose USB ids match; an empty filter keeps all.
pub fn filter_by_usb_ids(
    candidates: &[PortCandidate],
    vid: Option<u16>,
    pid: Option<u16>,
) -> Vec<PortCandidate> {
    candidates
        .iter()
        .filter(|c| c.matches_usb(vid, pid))
        .cloned()
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
