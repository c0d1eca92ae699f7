//! Supervisor: owns the connect / serve / reconnect loop.
//!
//! Each pass asks a [`LinkProvider`] for a fresh stream, runs a
//! [`BridgeSession`] on it until it ends, and then decides whether to try
//! again.  The audio controller survives across sessions; the session,
//! framer and snapshot do not.
//!
//! Retry policy:
//!
//! - an ambiguous transport is always fatal (another pass would pick the same
//!   wrong port, so an operator has to name one);
//! - any other connect or link failure is retried after
//!   [`ReconnectPolicy::interval`] when reconnecting is enabled, and returned
//!   otherwise;
//! - clearing the running flag ends the loop within one read timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::audio_control::{AudioBackend, AudioEndpointController};
use super::link::{ByteStream, TransportError};
use super::session::{BridgeSession, SessionConfig, SessionEnd, SessionError};

/// Granularity of the cancellable back-off sleep.
const WAIT_STEP: Duration = Duration::from_millis(50);

/// Why the provider could not hand out a stream.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The endpoint was found but could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// No endpoint is available right now.
    #[error("no device available: {0}")]
    Unavailable(String),
    /// More than one candidate and none identified itself.
    #[error("cannot pick a device automatically: {0}")]
    Ambiguous(String),
}

impl ConnectError {
    /// Whether another attempt could succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConnectError::Ambiguous(_))
    }
}

/// Source of open links, one per session.
pub trait LinkProvider {
    /// Resolves and opens the transport endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when no usable endpoint can be opened.
    fn open_link(&mut self) -> Result<Box<dyn ByteStream>, ConnectError>;
}

/// Error type for [`Supervisor::run`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("could not connect: {0}")]
    Connect(#[from] ConnectError),
    #[error("session ended: {0}")]
    Session(#[from] SessionError),
}

/// Whether and how often to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5),
        }
    }
}

/// Runs sessions back to back according to a [`ReconnectPolicy`].
pub struct Supervisor<P, B> {
    provider: P,
    audio: AudioEndpointController<B>,
    session_config: SessionConfig,
    policy: ReconnectPolicy,
}

impl<P: LinkProvider, B: AudioBackend> Supervisor<P, B> {
    pub fn new(
        provider: P,
        audio: AudioEndpointController<B>,
        session_config: SessionConfig,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            provider,
            audio,
            session_config,
            policy,
        }
    }

    /// Serves the device until `running` is cleared or a failure is fatal.
    ///
    /// Returns the audio controller on a clean stop.
    ///
    /// # Errors
    ///
    /// - [`SupervisorError::Connect`] for an ambiguous transport, or for any
    ///   connect failure when reconnecting is disabled.
    /// - [`SupervisorError::Session`] when a session fails and reconnecting
    ///   is disabled.
    pub fn run(self, running: &AtomicBool) -> Result<AudioEndpointController<B>, SupervisorError> {
        let Supervisor {
            mut provider,
            mut audio,
            session_config,
            policy,
        } = self;
        let mut sessions = 0u32;

        while running.load(Ordering::SeqCst) {
            let stream = match provider.open_link() {
                Ok(stream) => stream,
                Err(e) if !e.is_retryable() || !policy.enabled => {
                    error!("{e}");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!("{e}; retrying in {:?}", policy.interval);
                    wait(running, policy.interval);
                    continue;
                }
            };

            sessions += 1;
            let mut session = BridgeSession::new(stream, audio, session_config.clone());
            info!(session = %session.id(), "session #{sessions} started");
            let end = session.run(running);
            audio = session.into_controller();

            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::LinkLost(e) if !policy.enabled => return Err(e.into()),
                SessionEnd::LinkLost(e) => {
                    warn!("{e}; reconnecting in {:?}", policy.interval);
                    wait(running, policy.interval);
                }
            }
        }

        info!("supervisor stopped after {sessions} session(s)");
        Ok(audio)
    }
}

/// Sleeps for `total`, waking early once `running` is cleared.
fn wait(running: &AtomicBool, total: Duration) {
    let mut left = total;
    while !left.is_zero() && running.load(Ordering::SeqCst) {
        let step = left.min(WAIT_STEP);
        thread::sleep(step);
        left = left.saturating_sub(step);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
