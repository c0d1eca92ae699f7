//! Scripted in-memory transport for tests.
//!
//! [`MockStream`] implements `ByteStream` over a shared buffer.  The paired
//! [`MockStreamHandle`] stays with the test and lets it:
//!
//! - queue inbound chunks exactly as a fragmented serial read would deliver
//!   them;
//! - register automatic replies (`reply_to("HELLO", "HELLO OK")`), which is
//!   how a device that answers the probe is simulated;
//! - inspect every byte written;
//! - inject read/write failures or flip the link to disconnected.
//!
//! [`MockPortOpener`] hands out such streams by port name so the locator can
//! be exercised without hardware.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::application::link::{ByteStream, TransportError};

use super::PortOpener;

/// How long an empty read blocks, standing in for a serial read timeout.
const EMPTY_READ_DELAY: Duration = Duration::from_millis(1);

#[derive(Default)]
struct MockLine {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    /// Unterminated tail of `written`, for reply matching.
    write_tail: Vec<u8>,
    replies: Vec<(String, String)>,
    disconnected: bool,
    fail_reads: bool,
    fail_writes: bool,
    clears: u32,
    dropped: bool,
}

fn lock(shared: &Mutex<MockLine>) -> MutexGuard<'_, MockLine> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scripted `ByteStream`.  Create with [`MockStream::new`].
pub struct MockStream {
    name: String,
    shared: Arc<Mutex<MockLine>>,
}

/// Test-side handle onto a [`MockStream`].
#[derive(Clone)]
pub struct MockStreamHandle {
    shared: Arc<Mutex<MockLine>>,
}

impl MockStream {
    /// Creates a connected stream and its handle.
    pub fn new(name: impl Into<String>) -> (Self, MockStreamHandle) {
        let shared = Arc::new(Mutex::new(MockLine::default()));
        let stream = Self {
            name: name.into(),
            shared: Arc::clone(&shared),
        };
        (stream, MockStreamHandle { shared })
    }
}

impl MockStreamHandle {
    /// Queues one inbound chunk; a single `read` returns at most one chunk.
    pub fn push_inbound(&self, bytes: &[u8]) {
        lock(&self.shared).inbound.push_back(bytes.to_vec());
    }

    /// Queues `line` followed by `\n` as one chunk.
    pub fn push_line(&self, line: &str) {
        self.push_inbound(format!("{line}\n").as_bytes());
    }

    /// Whenever the stream is sent exactly `trigger`, it answers with `reply`.
    pub fn reply_to(&self, trigger: &str, reply: &str) {
        lock(&self.shared)
            .replies
            .push((trigger.to_string(), reply.to_string()));
    }

    /// Everything written so far.
    pub fn written_bytes(&self) -> Vec<u8> {
        lock(&self.shared).written.clone()
    }

    /// Everything written so far, split into lines.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written_bytes())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Forgets what was written so far.
    pub fn take_written_lines(&self) -> Vec<String> {
        let lines = self.written_lines();
        lock(&self.shared).written.clear();
        lines
    }

    pub fn set_disconnected(&self) {
        lock(&self.shared).disconnected = true;
    }

    pub fn fail_reads(&self) {
        lock(&self.shared).fail_reads = true;
    }

    pub fn fail_writes(&self) {
        lock(&self.shared).fail_writes = true;
    }

    /// How many times `clear_input` was called.
    pub fn clear_count(&self) -> u32 {
        lock(&self.shared).clears
    }

    /// Whether the stream has been dropped (closed).
    pub fn is_closed(&self) -> bool {
        lock(&self.shared).dropped
    }
}

impl ByteStream for MockStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let chunk = {
            let mut line = lock(&self.shared);
            if line.fail_reads {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock read failure").into());
            }
            line.inbound.pop_front()
        };
        let Some(mut chunk) = chunk else {
            thread::sleep(EMPTY_READ_DELAY);
            return Ok(0);
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            let rest = chunk.split_off(n);
            lock(&self.shared).inbound.push_front(rest);
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut line = lock(&self.shared);
        if line.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure").into());
        }
        line.written.extend_from_slice(bytes);
        line.write_tail.extend_from_slice(bytes);

        while let Some(pos) = line.write_tail.iter().position(|&b| b == b'\n') {
            let sent: Vec<u8> = line.write_tail.drain(..=pos).collect();
            let sent = String::from_utf8_lossy(&sent).trim().to_string();
            let replies: Vec<String> = line
                .replies
                .iter()
                .filter(|(trigger, _)| *trigger == sent)
                .map(|(_, reply)| format!("{reply}\n"))
                .collect();
            for reply in replies {
                line.inbound.push_back(reply.into_bytes());
            }
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        let mut line = lock(&self.shared);
        line.inbound.clear();
        line.clears += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !lock(&self.shared).disconnected
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        lock(&self.shared).dropped = true;
    }
}

// ── MockPortOpener ────────────────────────────────────────────────────────────

/// How a mock port behaves when opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockPort {
    /// Opens, and answers `HELLO` with this line.
    Answers(String),
    /// Opens but never says anything.
    Silent,
    /// Fails to open.
    Unavailable,
}

/// [`PortOpener`] over a fixed table of [`MockPort`] behaviours.
#[derive(Default)]
pub struct MockPortOpener {
    ports: HashMap<String, MockPort>,
    opened: Mutex<Vec<String>>,
    handles: Mutex<HashMap<String, Vec<MockStreamHandle>>>,
}

impl MockPortOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, name: &str, behaviour: MockPort) -> Self {
        self.ports.insert(name.to_string(), behaviour);
        self
    }

    /// Port names in the order `open` was called.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Handles for every stream opened on `name`, oldest first.
    pub fn handles(&self, name: &str) -> Vec<MockStreamHandle> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl PortOpener for MockPortOpener {
    fn open(&self, port: &str) -> Result<Box<dyn ByteStream>, TransportError> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(port.to_string());

        let behaviour = self.ports.get(port).cloned().unwrap_or(MockPort::Unavailable);
        if behaviour == MockPort::Unavailable {
            return Err(TransportError::OpenFailed {
                port: port.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such mock port"),
            });
        }

        let (stream, handle) = MockStream::new(port);
        if let MockPort::Answers(reply) = &behaviour {
            handle.reply_to("HELLO", reply);
        }
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(port.to_string())
            .or_default()
            .push(handle);
        Ok(Box::new(stream))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
