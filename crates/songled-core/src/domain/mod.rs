//! Domain types for the bridge: render endpoints and volume arithmetic.
//!
//! Like the `protocol` module, nothing in here touches the OS.  The host
//! audio system is reached through the bridge crate's `AudioBackend` trait;
//! these types are what that trait returns and what the dispatcher reasons
//! about.

/// Render endpoints and enumeration snapshots.
pub mod endpoint;

/// Clamping rules for master volume.
pub mod volume;

pub use endpoint::{AudioEndpoint, EndpointSnapshot, InvalidSpeakerIndex};
pub use volume::{adjust_volume, clamp_volume, percent_to_scalar, scalar_to_percent};
