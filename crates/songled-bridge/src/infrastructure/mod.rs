//! Infrastructure layer for the bridge.
//!
//! Contains OS-facing adapters: serial transports and port discovery, the
//! host audio backends, and configuration-file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `songled_core`, but MUST NOT be imported by the `application` layer.

pub mod audio;
pub mod storage;
pub mod transport;
