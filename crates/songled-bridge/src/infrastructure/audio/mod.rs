//! Audio backend implementations.
//!
//! | Backend               | Platform | Notes                                 |
//! |-----------------------|----------|---------------------------------------|
//! | `WasapiAudioBackend`  | Windows  | Core Audio + `IPolicyConfig`          |
//! | `MemoryAudioBackend`  | all      | In-process mixer; tests and dry runs  |
//!
//! [`open_backend`] picks one from the configured [`BackendKind`].

pub mod memory;

#[cfg(target_os = "windows")]
pub mod windows;

use serde::{Deserialize, Serialize};

use crate::application::audio_control::{AudioBackend, AudioError};

pub use memory::MemoryAudioBackend;

/// Which audio backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The host's real audio system.
    #[default]
    System,
    /// A simulated mixer with a few fake speakers.
    Memory,
}

/// Creates the backend for `kind`.
///
/// Must be called on the thread that will use the backend: on Windows the
/// COM objects it holds are bound to the apartment that created them.
///
/// # Errors
///
/// Returns [`AudioError::Unavailable`] when this platform has no system
/// backend, or [`AudioError::Platform`] if initialisation fails.
pub fn open_backend(kind: BackendKind) -> Result<Box<dyn AudioBackend>, AudioError> {
    match kind {
        BackendKind::Memory => Ok(Box::new(MemoryAudioBackend::demo())),
        BackendKind::System => open_system_backend(),
    }
}

#[cfg(target_os = "windows")]
fn open_system_backend() -> Result<Box<dyn AudioBackend>, AudioError> {
    Ok(Box::new(windows::WasapiAudioBackend::new()?))
}

#[cfg(not(target_os = "windows"))]
fn open_system_backend() -> Result<Box<dyn AudioBackend>, AudioError> {
    Err(AudioError::Unavailable(
        "no system audio backend on this platform; use --backend memory".to_string(),
    ))
}
