//! The SongLed line-protocol vocabulary.
//!
//! Every message is a single line of space-separated ASCII tokens.  The
//! controller side (the PC bridge) answers requests from the device side (the
//! ESP32 knob/display) and reports state back to it:
//!
//! | Line                    | Sender     | Variant                       |
//! |-------------------------|------------|-------------------------------|
//! | `HELLO`                 | either     | [`Command::Hello`]            |
//! | `HELLO OK`              | either     | [`Command::HelloOk`]          |
//! | `VOL GET`               | device     | [`Command::VolumeGet`]        |
//! | `VOL SET <n>`           | device     | [`Command::VolumeSet`]        |
//! | `VOL <±n>`              | device     | [`Command::VolumeAdjust`]     |
//! | `VOL <n>`               | controller | [`Command::Volume`]           |
//! | `MUTE`                  | device     | [`Command::MuteToggle`]       |
//! | `MUTE <0\|1>`           | controller | [`Command::Mute`]             |
//! | `SPK LIST` (or `GET`)   | device     | [`Command::SpeakerList`]      |
//! | `SPK SET <idx>`         | device     | [`Command::SpeakerSet`]       |
//! | `SPK BEGIN`             | controller | [`Command::SpeakerBegin`]     |
//! | `SPK ITEM <idx> <name>` | controller | [`Command::SpeakerItem`]      |
//! | `SPK END`               | controller | [`Command::SpeakerEnd`]       |
//! | `SPK CUR <idx>`         | controller | [`Command::SpeakerCurrent`]   |
//!
//! Anything else is carried verbatim in [`Command::Unknown`] and ignored by
//! the receiver, so either side can add messages without breaking the other.

/// Maximum volume percentage on the wire.
pub const VOLUME_MAX: u8 = 100;

/// Which end of the link produced a line.
///
/// Only needed to disambiguate `VOL <n>`: from the device it is a relative
/// adjustment, from the controller it is a report of the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The microcontroller-attached device (knob, display).
    Device,
    /// The host-side bridge that owns the audio endpoint.
    Controller,
}

/// One decoded protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELLO` – handshake probe / liveness ping.
    Hello,
    /// `HELLO OK` – handshake and keepalive acknowledgment.
    HelloOk,
    /// `VOL GET` – request the current master volume.
    VolumeGet,
    /// `VOL SET <n>` – set the master volume; out-of-range values are clamped
    /// by the receiver.
    VolumeSet(i32),
    /// `VOL <±n>` – adjust the master volume by a signed delta.
    VolumeAdjust(i32),
    /// `VOL <n>` – current master volume, 0..=100.
    Volume(u8),
    /// `MUTE` – toggle mute.
    MuteToggle,
    /// `MUTE <0|1>` – current mute state.
    Mute(bool),
    /// `SPK LIST` – request the speaker enumeration.
    SpeakerList,
    /// `SPK SET <idx>` – make entry `idx` of the last list the default speaker.
    SpeakerSet(usize),
    /// `SPK BEGIN` – start of a speaker list.
    SpeakerBegin,
    /// `SPK ITEM <idx> <name>` – one speaker entry.
    SpeakerItem { index: usize, name: String },
    /// `SPK END` – end of a speaker list.
    SpeakerEnd,
    /// `SPK CUR <idx>` – index of the default speaker in the list just sent.
    SpeakerCurrent(usize),
    /// Any line that is not part of the vocabulary, kept verbatim.
    Unknown(String),
}

impl Command {
    /// Builds a [`Command::SpeakerItem`] with its display name made safe for
    /// the wire (see [`sanitize_name`]).
    pub fn speaker_item(index: usize, name: &str) -> Self {
        Command::SpeakerItem {
            index,
            name: sanitize_name(name),
        }
    }

    /// The side of the link that sends this command, or `None` for messages
    /// either side may send.
    pub fn origin(&self) -> Option<Origin> {
        match self {
            Command::Hello | Command::HelloOk | Command::Unknown(_) => None,
            Command::VolumeGet
            | Command::VolumeSet(_)
            | Command::VolumeAdjust(_)
            | Command::MuteToggle
            | Command::SpeakerList
            | Command::SpeakerSet(_) => Some(Origin::Device),
            Command::Volume(_)
            | Command::Mute(_)
            | Command::SpeakerBegin
            | Command::SpeakerItem { .. }
            | Command::SpeakerEnd
            | Command::SpeakerCurrent(_) => Some(Origin::Controller),
        }
    }

    /// `true` for the handshake / keepalive family.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Command::Hello | Command::HelloOk)
    }
}

/// Reduces a display name to printable ASCII.
///
/// Every character outside `' '..='~'` becomes `?`, and surrounding
/// whitespace is trimmed so the name survives line framing unchanged.
///
/// ```rust
/// use songled_core::protocol::sanitize_name;
///
/// assert_eq!(sanitize_name("Lautsprecher (Realtek® Audio)"), "Lautsprecher (Realtek? Audio)");
/// ```
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect::<String>()
        .trim()
        .to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
