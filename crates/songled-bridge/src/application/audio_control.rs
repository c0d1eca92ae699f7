//! AudioEndpointController: volume, mute and default-speaker control.
//!
//! This use case sits at the application layer and delegates to an
//! [`AudioBackend`] for the actual OS calls.  Platform implementations
//! (WASAPI on Windows, the in-memory mixer everywhere) live in the
//! infrastructure layer.
//!
//! The controller owns the policy the backend must not care about:
//!
//! - volume requests are clamped to 0..=100, never rejected;
//! - a relative request is `current + delta`, clamped;
//! - after switching the default endpoint the backend is refreshed before
//!   volume or mute are read again, because the volume handle belongs to the
//!   old endpoint.

use songled_core::domain::{adjust_volume, clamp_volume, AudioEndpoint, EndpointSnapshot};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for audio backend operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The platform audio API returned an error.
    #[error("audio platform error: {0}")]
    Platform(String),
    /// No endpoint with this id exists any more.
    #[error("audio endpoint not found: {0}")]
    EndpointNotFound(String),
    /// This build has no backend of the requested kind.
    #[error("audio backend unavailable: {0}")]
    Unavailable(String),
}

/// Host audio capability consumed by the controller.
///
/// Volumes are percentages in 0..=100.
#[cfg_attr(test, mockall::automock)]
pub trait AudioBackend {
    /// Current master volume of the default render endpoint.
    fn master_volume(&self) -> Result<u8, AudioError>;

    /// Sets the master volume of the default render endpoint.
    fn set_master_volume(&mut self, percent: u8) -> Result<(), AudioError>;

    /// Current mute state of the default render endpoint.
    fn is_muted(&self) -> Result<bool, AudioError>;

    /// Flips the mute state and returns the new state.
    fn toggle_mute(&mut self) -> Result<bool, AudioError>;

    /// Active render endpoints in platform enumeration order.
    fn enumerate_render_endpoints(&self) -> Result<Vec<AudioEndpoint>, AudioError>;

    /// Id of the current default render endpoint, if there is one.
    fn default_endpoint_id(&self) -> Result<Option<String>, AudioError>;

    /// Makes `id` the default render endpoint.
    fn set_default_endpoint(&mut self, id: &str) -> Result<(), AudioError>;

    /// Re-acquires the endpoint-specific volume handle.
    fn refresh(&mut self) -> Result<(), AudioError>;
}

impl<T: AudioBackend + ?Sized> AudioBackend for Box<T> {
    fn master_volume(&self) -> Result<u8, AudioError> {
        (**self).master_volume()
    }
    fn set_master_volume(&mut self, percent: u8) -> Result<(), AudioError> {
        (**self).set_master_volume(percent)
    }
    fn is_muted(&self) -> Result<bool, AudioError> {
        (**self).is_muted()
    }
    fn toggle_mute(&mut self) -> Result<bool, AudioError> {
        (**self).toggle_mute()
    }
    fn enumerate_render_endpoints(&self) -> Result<Vec<AudioEndpoint>, AudioError> {
        (**self).enumerate_render_endpoints()
    }
    fn default_endpoint_id(&self) -> Result<Option<String>, AudioError> {
        (**self).default_endpoint_id()
    }
    fn set_default_endpoint(&mut self, id: &str) -> Result<(), AudioError> {
        (**self).set_default_endpoint(id)
    }
    fn refresh(&mut self) -> Result<(), AudioError> {
        (**self).refresh()
    }
}

/// Volume, mute and endpoint operations with the clamping and refresh rules
/// applied.
pub struct AudioEndpointController<B> {
    backend: B,
}

impl<B: AudioBackend> AudioEndpointController<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Current master volume.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the backend.
    pub fn volume(&self) -> Result<u8, AudioError> {
        self.backend.master_volume()
    }

    /// Sets an absolute volume, clamped to 0..=100, and returns the level the
    /// backend reports afterwards.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the backend.
    pub fn set_volume(&mut self, requested: i32) -> Result<u8, AudioError> {
        let target = clamp_volume(i64::from(requested));
        if i64::from(target) != i64::from(requested) {
            debug!("volume {requested} clamped to {target}");
        }
        self.backend.set_master_volume(target)?;
        self.backend.master_volume()
    }

    /// Adjusts the volume by `delta`, clamped to 0..=100, and returns the new
    /// level.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the backend.
    pub fn adjust_volume(&mut self, delta: i32) -> Result<u8, AudioError> {
        let current = self.backend.master_volume()?;
        self.backend.set_master_volume(adjust_volume(current, delta))?;
        self.backend.master_volume()
    }

    /// Current mute state.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the backend.
    pub fn is_muted(&self) -> Result<bool, AudioError> {
        self.backend.is_muted()
    }

    /// Toggles mute and returns the new state.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the backend.
    pub fn toggle_mute(&mut self) -> Result<bool, AudioError> {
        self.backend.toggle_mute()
    }

    /// Takes a fresh enumeration snapshot.  Indices are reassigned 0..N-1 in
    /// the order the backend returned the endpoints.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the backend.
    pub fn snapshot(&self) -> Result<EndpointSnapshot, AudioError> {
        let endpoints = self.backend.enumerate_render_endpoints()?;
        let default_id = self.backend.default_endpoint_id()?;
        Ok(EndpointSnapshot::new(
            endpoints.into_iter().map(|ep| (ep.id, ep.name)),
            default_id,
        ))
    }

    /// Makes `endpoint` the default render endpoint and refreshes the backend.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the backend.
    pub fn switch_default(&mut self, endpoint: &AudioEndpoint) -> Result<(), AudioError> {
        self.backend.set_default_endpoint(&endpoint.id)?;
        self.backend.refresh()?;
        info!("default speaker switched to \"{}\"", endpoint.name);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn endpoint(index: usize, id: &str, name: &str) -> AudioEndpoint {
        AudioEndpoint {
            index,
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_set_volume_clamps_high_values() {
        // Arrange
        let mut backend = MockAudioBackend::new();
        backend
            .expect_set_master_volume()
            .with(eq(100))
            .times(1)
            .returning(|_| Ok(()));
        backend.expect_master_volume().returning(|| Ok(100));
        let mut ctl = AudioEndpointController::new(backend);

        // Act / Assert
        assert_eq!(ctl.set_volume(150).unwrap(), 100);
    }

    #[test]
    fn test_set_volume_clamps_negative_values() {
        let mut backend = MockAudioBackend::new();
        backend
            .expect_set_master_volume()
            .with(eq(0))
            .times(1)
            .returning(|_| Ok(()));
        backend.expect_master_volume().returning(|| Ok(0));
        let mut ctl = AudioEndpointController::new(backend);

        assert_eq!(ctl.set_volume(i32::MIN).unwrap(), 0);
    }

    #[test]
    fn test_adjust_volume_reads_current_then_clamps() {
        // Arrange: current volume 5, delta -10 must land on 0.
        let mut seq = Sequence::new();
        let mut backend = MockAudioBackend::new();
        backend
            .expect_master_volume()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(5));
        backend
            .expect_set_master_volume()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        backend
            .expect_master_volume()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(0));
        let mut ctl = AudioEndpointController::new(backend);

        // Act / Assert
        assert_eq!(ctl.adjust_volume(-10).unwrap(), 0);
    }

    #[test]
    fn test_set_volume_propagates_backend_failure() {
        let mut backend = MockAudioBackend::new();
        backend
            .expect_set_master_volume()
            .returning(|_| Err(AudioError::Platform("device unplugged".into())));
        let mut ctl = AudioEndpointController::new(backend);

        assert!(matches!(ctl.set_volume(10), Err(AudioError::Platform(_))));
    }

    #[test]
    fn test_snapshot_reindexes_in_enumeration_order() {
        // Arrange: the backend reports sparse indices; the snapshot renumbers.
        let mut backend = MockAudioBackend::new();
        backend.expect_enumerate_render_endpoints().returning(|| {
            Ok(vec![
                endpoint(4, "id-a", "Speakers"),
                endpoint(9, "id-b", "Headphones"),
            ])
        });
        backend
            .expect_default_endpoint_id()
            .returning(|| Ok(Some("id-b".to_string())));
        let ctl = AudioEndpointController::new(backend);

        // Act
        let snap = ctl.snapshot().unwrap();

        // Assert
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.endpoints()[1].index, 1);
        assert_eq!(snap.current_index(), Some(1));
    }

    #[test]
    fn test_switch_default_refreshes_after_setting() {
        let mut seq = Sequence::new();
        let mut backend = MockAudioBackend::new();
        backend
            .expect_set_default_endpoint()
            .withf(|id| id == "id-b")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        backend
            .expect_refresh()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        let mut ctl = AudioEndpointController::new(backend);

        ctl.switch_default(&endpoint(1, "id-b", "Headphones")).unwrap();
    }

    #[test]
    fn test_switch_default_skips_refresh_when_set_fails() {
        let mut backend = MockAudioBackend::new();
        backend
            .expect_set_default_endpoint()
            .returning(|id| Err(AudioError::EndpointNotFound(id.to_string())));
        backend.expect_refresh().never();
        let mut ctl = AudioEndpointController::new(backend);

        let result = ctl.switch_default(&endpoint(0, "gone", "Old"));
        assert!(matches!(result, Err(AudioError::EndpointNotFound(id)) if id == "gone"));
    }
}
