//! # songled-core
//!
//! Shared library for the SongLed bridge containing the line protocol
//! (framing and command codec) and the audio endpoint model.
//!
//! It has zero dependencies on OS APIs, serial ports, or audio subsystems,
//! so everything in here can be tested on any machine.
//!
//! # Architecture overview
//!
//! A SongLed device (an ESP32 with a knob and a small display) talks to the
//! PC over a byte stream (USB serial or BLE).  It asks the PC for the master
//! volume, changes it, toggles mute, and picks the default speaker.  The
//! conversation is plain text, one command per line:
//!
//! ```text
//! device → PC   VOL GET
//! PC → device   VOL 35
//! device → PC   VOL +5
//! PC → device   VOL 40
//! device → PC   SPK LIST
//! PC → device   SPK BEGIN
//! PC → device   SPK ITEM 0 Speakers
//! PC → device   SPK ITEM 1 Headphones
//! PC → device   SPK END
//! PC → device   SPK CUR 0
//! ```
//!
//! - **`protocol`** – [`LineFramer`] turns the raw byte stream into lines;
//!   the codec turns lines into typed [`Command`]s and back.
//! - **`domain`** – [`EndpointSnapshot`] (one speaker enumeration pass) and
//!   the volume clamping rules.

pub mod domain;
pub mod protocol;

pub use domain::{AudioEndpoint, EndpointSnapshot, InvalidSpeakerIndex};
pub use protocol::codec::{decode_line, encode_command, encode_frame};
pub use protocol::commands::{Command, Origin};
pub use protocol::framer::{FramerError, LineFramer};
