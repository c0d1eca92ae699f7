//! Application layer: use cases for the bridge.
//!
//! Nothing in this module touches a serial port or an OS audio API directly.
//! Transports arrive as [`link::ByteStream`] trait objects and the host audio
//! system as an [`audio_control::AudioBackend`]; both are implemented in the
//! infrastructure layer and injected by `main`.

/// Byte-stream port and transport errors.
pub mod link;

/// Volume, mute and default-speaker use case.
pub mod audio_control;

/// Maps decoded requests to replies.
pub mod dispatch;

/// One connected device conversation.
pub mod session;

/// Connect / serve / reconnect loop.
pub mod supervisor;
