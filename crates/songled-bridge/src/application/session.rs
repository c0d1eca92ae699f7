//! BridgeSession: one connected conversation with the device.
//!
//! # Lifecycle
//!
//! ```text
//!  Disconnected ──connect()──▶ Connecting ──greeting sent──▶ Ready
//!        ▲                          │                          │
//!        └──────────── any transport error, overflow, ─────────┘
//!                      timeout, or disconnect()
//! ```
//!
//! A session is built around an already-open [`ByteStream`].  `connect()`
//! sends the greeting, optionally waits for the device to answer, and pushes
//! the current audio state.  From then on [`BridgeSession::poll`] is called in
//! a loop: each call performs one bounded read, dispatches every completed
//! line, and sends a keepalive when one is due.
//!
//! Once the session drops back to `Disconnected` it is finished; the stream
//! is closed and the [`Supervisor`](super::supervisor::Supervisor) builds a
//! new session for the next link.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use songled_core::domain::EndpointSnapshot;
use songled_core::protocol::{
    decode_line, encode_command, encode_frame, is_hello_line, Command, FramerError, LineFramer,
    Origin, DEFAULT_MAX_UNTERMINATED,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::audio_control::{AudioBackend, AudioEndpointController};
use super::dispatch::{DispatchError, Dispatcher};
use super::link::{ByteStream, TransportError};

/// Size of the scratch buffer for a single transport read.
const READ_CHUNK: usize = 512;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Behavioural knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Line sent as soon as the link opens.
    pub greeting: Command,
    /// How often `HELLO OK` is sent while the link is up.
    pub keepalive_interval: Duration,
    /// Wait for the device to answer the greeting before becoming Ready.
    pub await_greeting: bool,
    /// How long to wait for that answer.
    pub handshake_timeout: Duration,
    /// Push speakers, volume and mute right after becoming Ready.
    pub sync_on_connect: bool,
    /// Push the same state after answering every device `HELLO`.
    pub sync_on_hello: bool,
    /// Close the link if nothing at all is received for this long.
    pub idle_timeout: Option<Duration>,
    /// Cap on buffered bytes without a newline.
    pub max_line_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: Command::Hello,
            keepalive_interval: Duration::from_secs(5),
            await_greeting: false,
            handshake_timeout: Duration::from_secs(2),
            sync_on_connect: true,
            sync_on_hello: false,
            idle_timeout: None,
            max_line_bytes: DEFAULT_MAX_UNTERMINATED,
        }
    }
}

// ── States and errors ─────────────────────────────────────────────────────────

/// Link state as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Ready,
}

/// Why a session left the Ready state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    FrameOverflow(#[from] FramerError),
    #[error("device did not answer the greeting within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("nothing received from the device for {0:?}")]
    IdleTimeout(Duration),
    #[error("session is {0:?}, expected it to be ready")]
    NotReady(LinkState),
}

/// How [`BridgeSession::run`] finished.
#[derive(Debug)]
pub enum SessionEnd {
    /// The running flag was cleared; the link was closed cleanly.
    Cancelled,
    /// The link failed and was closed.
    LinkLost(SessionError),
}

// ── BridgeSession ─────────────────────────────────────────────────────────────

/// One device conversation over one open [`ByteStream`].
pub struct BridgeSession<B> {
    id: Uuid,
    stream: Option<Box<dyn ByteStream>>,
    dispatcher: Dispatcher<B>,
    framer: LineFramer,
    config: SessionConfig,
    state: LinkState,
    last_keepalive_sent: Option<Instant>,
    last_rx: Instant,
    /// Lines that arrived while waiting for the greeting answer.
    pending: VecDeque<String>,
    read_buf: Vec<u8>,
}

impl<B: AudioBackend> BridgeSession<B> {
    /// Wraps an open stream.  Nothing is sent until [`connect`](Self::connect).
    pub fn new(
        stream: Box<dyn ByteStream>,
        audio: AudioEndpointController<B>,
        config: SessionConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(audio).with_sync_on_hello(config.sync_on_hello);
        Self {
            id: Uuid::new_v4(),
            stream: Some(stream),
            dispatcher,
            framer: LineFramer::with_limit(config.max_line_bytes),
            config,
            state: LinkState::Disconnected,
            last_keepalive_sent: None,
            last_rx: Instant::now(),
            pending: VecDeque::new(),
            read_buf: vec![0u8; READ_CHUNK],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// When the last keepalive (or the greeting) was written.
    pub fn last_keepalive_sent(&self) -> Option<Instant> {
        self.last_keepalive_sent
    }

    /// The speaker list most recently sent to the device.
    pub fn snapshot(&self) -> Option<&EndpointSnapshot> {
        self.dispatcher.snapshot()
    }

    /// Hands the audio controller back so the next session can reuse it.
    pub fn into_controller(self) -> AudioEndpointController<B> {
        self.dispatcher.into_audio()
    }

    /// Sends the greeting and brings the link to Ready.
    ///
    /// On failure the stream is closed and the session is Disconnected.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotReady`] if the session was already used.
    /// - [`SessionError::HandshakeTimeout`] if the device did not answer in
    ///   time (only with `await_greeting`).
    /// - [`SessionError::Transport`] on I/O failure.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        if self.state != LinkState::Disconnected || self.stream.is_none() {
            return Err(SessionError::NotReady(self.state));
        }
        self.state = LinkState::Connecting;
        info!(session = %self.id, link = %self.link_name(), "connecting");

        if let Err(e) = self.open_link() {
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// One iteration of the Ready loop: a single bounded read, dispatch of
    /// every completed line, then the idle and keepalive checks.
    ///
    /// Any error closes the link.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotReady`] when called outside Ready.
    /// - [`SessionError::Transport`] on I/O failure or disconnect.
    /// - [`SessionError::FrameOverflow`] when the device floods without
    ///   newlines.
    /// - [`SessionError::IdleTimeout`] when the idle limit is exceeded.
    pub fn poll(&mut self) -> Result<(), SessionError> {
        if self.state != LinkState::Ready {
            return Err(SessionError::NotReady(self.state));
        }
        let result = self.poll_once();
        if result.is_err() {
            self.close();
        }
        result
    }

    /// Connects if needed, then polls until `running` is cleared or the link
    /// fails.  Cancellation is noticed within one read timeout.
    pub fn run(&mut self, running: &AtomicBool) -> SessionEnd {
        if self.state == LinkState::Disconnected {
            if let Err(e) = self.connect() {
                warn!(session = %self.id, "connect failed: {e}");
                return SessionEnd::LinkLost(e);
            }
        }

        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.poll() {
                warn!(session = %self.id, "link lost: {e}");
                return SessionEnd::LinkLost(e);
            }
        }

        self.disconnect();
        SessionEnd::Cancelled
    }

    /// Closes the link.  Safe to call in any state.
    pub fn disconnect(&mut self) {
        if self.stream.is_some() {
            info!(session = %self.id, "disconnecting");
        }
        self.close();
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn open_link(&mut self) -> Result<(), SessionError> {
        let greeting = self.config.greeting.clone();
        self.send(&greeting)?;
        let now = Instant::now();
        self.last_keepalive_sent = Some(now);
        self.last_rx = now;

        if self.config.await_greeting {
            self.await_greeting()?;
        }

        self.state = LinkState::Ready;
        info!(session = %self.id, link = %self.link_name(), "link ready");

        if self.config.sync_on_connect {
            match self.dispatcher.state_report() {
                Ok(replies) => self.send_all(&replies)?,
                Err(e) => warn!(session = %self.id, "initial state push failed: {e}"),
            }
        }

        while let Some(line) = self.pending.pop_front() {
            self.handle_line(&line)?;
        }
        Ok(())
    }

    /// Reads until a `HELLO…` line arrives.  Other lines are queued for
    /// dispatch once Ready; a device `HELLO` is queued too so it still gets
    /// its `HELLO OK`.
    fn await_greeting(&mut self) -> Result<(), SessionError> {
        let timeout = self.config.handshake_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            if Instant::now() >= deadline {
                return Err(SessionError::HandshakeTimeout(timeout));
            }
            let (n, connected) = self.read_chunk()?;
            if n == 0 {
                if !connected {
                    return Err(TransportError::NotConnected.into());
                }
                continue;
            }
            self.last_rx = Instant::now();
            self.framer.push(&self.read_buf[..n])?;

            let mut answered = false;
            while let Some(line) = self.framer.next_line() {
                if line.is_empty() {
                    continue;
                }
                if !answered && is_hello_line(&line) {
                    debug!(session = %self.id, "<< {line}");
                    answered = true;
                    if decode_line(&line, Origin::Device) == Command::Hello {
                        self.pending.push_back(line);
                    }
                } else {
                    self.pending.push_back(line);
                }
            }
            if answered {
                return Ok(());
            }
        }
    }

    fn poll_once(&mut self) -> Result<(), SessionError> {
        let (n, connected) = self.read_chunk()?;
        let now = Instant::now();

        if n > 0 {
            self.last_rx = now;
            self.framer.push(&self.read_buf[..n])?;
            while let Some(line) = self.framer.next_line() {
                self.handle_line(&line)?;
            }
        } else if !connected {
            return Err(TransportError::NotConnected.into());
        }

        if let Some(idle) = self.config.idle_timeout {
            if now.duration_since(self.last_rx) >= idle {
                return Err(SessionError::IdleTimeout(idle));
            }
        }

        self.keepalive_if_due(now)
    }

    fn read_chunk(&mut self) -> Result<(usize, bool), SessionError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(SessionError::NotReady(self.state))?;
        let n = stream.read(&mut self.read_buf)?;
        Ok((n, n > 0 || stream.is_connected()))
    }

    fn handle_line(&mut self, line: &str) -> Result<(), SessionError> {
        if line.is_empty() {
            return Ok(());
        }
        debug!(session = %self.id, "<< {line}");

        let cmd = decode_line(line, Origin::Device);
        match self.dispatcher.dispatch(&cmd) {
            Ok(replies) => self.send_all(&replies),
            Err(DispatchError::InvalidSpeakerIndex(e)) => {
                debug!(session = %self.id, "ignoring {line:?}: {e}");
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, "could not serve {line:?}: {e}");
                Ok(())
            }
        }
    }

    fn keepalive_if_due(&mut self, now: Instant) -> Result<(), SessionError> {
        let due = self
            .last_keepalive_sent
            .map_or(true, |sent| now.duration_since(sent) >= self.config.keepalive_interval);
        if due {
            self.send(&Command::HelloOk)?;
            self.last_keepalive_sent = Some(now);
        }
        Ok(())
    }

    fn send_all(&mut self, cmds: &[Command]) -> Result<(), SessionError> {
        for cmd in cmds {
            self.send(cmd)?;
        }
        Ok(())
    }

    fn send(&mut self, cmd: &Command) -> Result<(), SessionError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(SessionError::NotReady(self.state))?;
        stream.write_all(&encode_frame(cmd))?;
        debug!(session = %self.id, ">> {}", encode_command(cmd));
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
        self.state = LinkState::Disconnected;
        self.framer.clear();
        self.pending.clear();
        self.last_keepalive_sent = None;
    }

    fn link_name(&self) -> &str {
        self.stream.as_ref().map_or("<closed>", |s| s.name())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
