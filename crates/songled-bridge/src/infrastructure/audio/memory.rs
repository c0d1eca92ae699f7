//! In-memory audio backend.
//!
//! `MemoryAudioBackend` keeps a volume, a mute flag and a list of fake render
//! endpoints behind an `Arc<Mutex<_>>`.  Clones share the same mixer, so a
//! test can hand one clone to the session and inspect the other.
//!
//! Set [`MixerState::fail`] to make every call return
//! [`AudioError::Platform`], which exercises the session's error paths.

use std::sync::{Arc, Mutex, MutexGuard};

use songled_core::domain::{clamp_volume, AudioEndpoint};

use crate::application::audio_control::{AudioBackend, AudioError};

/// Observable mixer state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MixerState {
    pub volume: u8,
    pub muted: bool,
    /// `(id, name)` in enumeration order.
    pub endpoints: Vec<(String, String)>,
    pub default_id: Option<String>,
    /// Number of `refresh` calls.
    pub refreshes: u32,
    /// Every id passed to `set_default_endpoint`, in order.
    pub default_changes: Vec<String>,
    pub fail: bool,
}

/// Shared-state mixer implementing [`AudioBackend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryAudioBackend {
    state: Arc<Mutex<MixerState>>,
}

impl MemoryAudioBackend {
    pub fn new(state: MixerState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Three speakers, the first one default, volume 50.
    pub fn demo() -> Self {
        Self::with_endpoints(&["Speakers", "Headphones", "HDMI Monitor"], Some(0), 50)
    }

    /// Endpoints named `names` with ids `ep-0`, `ep-1`, …
    pub fn with_endpoints(names: &[&str], default: Option<usize>, volume: u8) -> Self {
        let endpoints: Vec<(String, String)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (format!("ep-{i}"), name.to_string()))
            .collect();
        let default_id = default.and_then(|i| endpoints.get(i)).map(|(id, _)| id.clone());
        Self::new(MixerState {
            volume: clamp_volume(i64::from(volume)),
            endpoints,
            default_id,
            ..MixerState::default()
        })
    }

    /// A copy of the current state.
    pub fn state(&self) -> MixerState {
        self.guard().clone()
    }

    /// Mutates the state in place.
    pub fn update(&self, f: impl FnOnce(&mut MixerState)) {
        f(&mut self.guard());
    }

    fn guard(&self) -> MutexGuard<'_, MixerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn checked(&self) -> Result<MutexGuard<'_, MixerState>, AudioError> {
        let state = self.guard();
        if state.fail {
            return Err(AudioError::Platform("simulated mixer failure".to_string()));
        }
        Ok(state)
    }
}

impl AudioBackend for MemoryAudioBackend {
    fn master_volume(&self) -> Result<u8, AudioError> {
        Ok(self.checked()?.volume)
    }

    fn set_master_volume(&mut self, percent: u8) -> Result<(), AudioError> {
        self.checked()?.volume = clamp_volume(i64::from(percent));
        Ok(())
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        Ok(self.checked()?.muted)
    }

    fn toggle_mute(&mut self) -> Result<bool, AudioError> {
        let mut state = self.checked()?;
        state.muted = !state.muted;
        Ok(state.muted)
    }

    fn enumerate_render_endpoints(&self) -> Result<Vec<AudioEndpoint>, AudioError> {
        let state = self.checked()?;
        Ok(state
            .endpoints
            .iter()
            .enumerate()
            .map(|(index, (id, name))| AudioEndpoint {
                index,
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    fn default_endpoint_id(&self) -> Result<Option<String>, AudioError> {
        Ok(self.checked()?.default_id.clone())
    }

    fn set_default_endpoint(&mut self, id: &str) -> Result<(), AudioError> {
        let mut state = self.checked()?;
        if !state.endpoints.iter().any(|(ep, _)| ep == id) {
            return Err(AudioError::EndpointNotFound(id.to_string()));
        }
        state.default_id = Some(id.to_string());
        state.default_changes.push(id.to_string());
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), AudioError> {
        self.checked()?.refreshes += 1;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
