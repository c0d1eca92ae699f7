//! CommandDispatcher: maps decoded device requests onto audio operations.
//!
//! The dispatcher is deliberately synchronous and I/O-free apart from the
//! audio backend: it takes one [`Command`] and returns the commands the
//! session should send back, in order.  Writing them to the wire is the
//! session's job.
//!
//! It also owns the last [`EndpointSnapshot`] sent to the device, because
//! `SPK SET <idx>` indices refer to that list and nothing else.

use songled_core::domain::{EndpointSnapshot, InvalidSpeakerIndex};
use songled_core::protocol::Command;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::audio_control::{AudioBackend, AudioEndpointController, AudioError};

/// Error type for dispatching one command.
///
/// Neither variant produces a reply; the session logs it and keeps going.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `SPK SET` named an index outside the last snapshot (or no snapshot
    /// has been taken yet).
    #[error(transparent)]
    InvalidSpeakerIndex(#[from] InvalidSpeakerIndex),
    /// The audio backend failed while serving the request.
    #[error("audio backend failed: {0}")]
    Audio(#[from] AudioError),
}

/// Maps device requests to controller replies.
pub struct Dispatcher<B> {
    audio: AudioEndpointController<B>,
    snapshot: Option<EndpointSnapshot>,
    sync_on_hello: bool,
}

impl<B: AudioBackend> Dispatcher<B> {
    pub fn new(audio: AudioEndpointController<B>) -> Self {
        Self {
            audio,
            snapshot: None,
            sync_on_hello: false,
        }
    }

    /// Also push the full state (speakers, volume, mute) after answering a
    /// device `HELLO`.
    pub fn with_sync_on_hello(mut self, enabled: bool) -> Self {
        self.sync_on_hello = enabled;
        self
    }

    /// Handles one decoded command and returns the replies to send.
    ///
    /// | Request         | Replies                                       |
    /// |-----------------|-----------------------------------------------|
    /// | `HELLO`         | `HELLO OK` (plus state if sync-on-hello)      |
    /// | `VOL GET/SET/±` | `VOL <n>`                                     |
    /// | `MUTE`          | `MUTE <0\|1>`                                 |
    /// | `SPK LIST`      | `SPK BEGIN`, `SPK ITEM`…, `SPK END`, `SPK CUR`|
    /// | `SPK SET <i>`   | the refreshed speaker list                    |
    /// | anything else   | nothing                                       |
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the speaker index is not in the last
    /// snapshot or the backend fails.  No reply is due in either case.
    pub fn dispatch(&mut self, cmd: &Command) -> Result<Vec<Command>, DispatchError> {
        match cmd {
            Command::Hello => {
                let mut replies = vec![Command::HelloOk];
                if self.sync_on_hello {
                    match self.state_report() {
                        Ok(state) => replies.extend(state),
                        Err(e) => warn!("state push after HELLO failed: {e}"),
                    }
                }
                Ok(replies)
            }
            Command::VolumeGet => Ok(vec![Command::Volume(self.audio.volume()?)]),
            Command::VolumeSet(value) => Ok(vec![Command::Volume(self.audio.set_volume(*value)?)]),
            Command::VolumeAdjust(delta) => {
                Ok(vec![Command::Volume(self.audio.adjust_volume(*delta)?)])
            }
            Command::MuteToggle => Ok(vec![Command::Mute(self.audio.toggle_mute()?)]),
            Command::SpeakerList => self.speaker_list(),
            Command::SpeakerSet(index) => self.switch_speaker(*index),
            Command::HelloOk => Ok(Vec::new()),
            Command::Volume(_)
            | Command::Mute(_)
            | Command::SpeakerBegin
            | Command::SpeakerItem { .. }
            | Command::SpeakerEnd
            | Command::SpeakerCurrent(_) => {
                trace!("ignoring report sent by the device: {cmd:?}");
                Ok(Vec::new())
            }
            Command::Unknown(raw) => {
                debug!("ignoring unrecognised line {raw:?}");
                Ok(Vec::new())
            }
        }
    }

    /// Takes a fresh snapshot, remembers it, and returns the list commands.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Audio`] if enumeration fails; the previous
    /// snapshot is kept in that case.
    pub fn speaker_list(&mut self) -> Result<Vec<Command>, DispatchError> {
        let snapshot = self.audio.snapshot()?;
        let replies = snapshot.to_commands();
        self.remember(snapshot);
        Ok(replies)
    }

    /// Full state push: the speaker list, then `VOL <n>`, then `MUTE <0|1>`.
    ///
    /// The new snapshot is only remembered once every line is assembled, so
    /// a failed push leaves `SPK SET` resolving against the list the device
    /// actually has.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Audio`] on any backend failure.
    pub fn state_report(&mut self) -> Result<Vec<Command>, DispatchError> {
        let snapshot = self.audio.snapshot()?;
        let mut replies = snapshot.to_commands();
        replies.push(Command::Volume(self.audio.volume()?));
        replies.push(Command::Mute(self.audio.is_muted()?));
        self.remember(snapshot);
        Ok(replies)
    }

    /// Snapshot most recently sent to the device, if any.
    pub fn snapshot(&self) -> Option<&EndpointSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn audio(&self) -> &AudioEndpointController<B> {
        &self.audio
    }

    pub fn into_audio(self) -> AudioEndpointController<B> {
        self.audio
    }

    fn remember(&mut self, snapshot: EndpointSnapshot) {
        debug!("speaker snapshot taken: {} endpoint(s)", snapshot.len());
        self.snapshot = Some(snapshot);
    }

    fn switch_speaker(&mut self, index: usize) -> Result<Vec<Command>, DispatchError> {
        let endpoint = match &self.snapshot {
            Some(snapshot) => snapshot.resolve(index)?.clone(),
            None => {
                return Err(InvalidSpeakerIndex {
                    index,
                    available: 0,
                }
                .into())
            }
        };
        info!("device selected speaker {index} ({})", endpoint.name);
        self.audio.switch_default(&endpoint)?;
        self.speaker_list()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
