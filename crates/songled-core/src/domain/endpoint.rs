//! Audio render endpoints and enumeration snapshots.
//!
//! An [`AudioEndpoint`] index is only meaningful inside the
//! [`EndpointSnapshot`] that produced it.  The device sees those indices in
//! `SPK ITEM` lines and echoes one back in `SPK SET`; the bridge resolves it
//! against the snapshot it last sent, never against a fresh enumeration,
//! because the platform may reorder devices between passes.

use thiserror::Error;

use crate::protocol::commands::Command;

/// An index that does not exist in the snapshot it was resolved against.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("speaker index {index} is outside the last list ({available} entries)")]
pub struct InvalidSpeakerIndex {
    pub index: usize,
    pub available: usize,
}

/// One render endpoint as reported by the host audio system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioEndpoint {
    /// Position in the enumeration pass that produced this descriptor.
    pub index: usize,
    /// Opaque platform device identifier.
    pub id: String,
    /// Human-readable name (not sanitized).
    pub name: String,
}

/// The result of one enumeration pass plus the default endpoint at that time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSnapshot {
    endpoints: Vec<AudioEndpoint>,
    default_id: Option<String>,
}

impl EndpointSnapshot {
    /// Builds a snapshot from `(id, name)` pairs in enumeration order.
    ///
    /// Indices are assigned 0..N-1 in that order.
    pub fn new<I>(devices: I, default_id: Option<String>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let endpoints = devices
            .into_iter()
            .enumerate()
            .map(|(index, (id, name))| AudioEndpoint { index, id, name })
            .collect();
        Self {
            endpoints,
            default_id,
        }
    }

    pub fn endpoints(&self) -> &[AudioEndpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn default_id(&self) -> Option<&str> {
        self.default_id.as_deref()
    }

    /// Index of the default endpoint, if it is part of this snapshot.
    pub fn current_index(&self) -> Option<usize> {
        let default_id = self.default_id.as_deref()?;
        self.endpoints
            .iter()
            .find(|ep| ep.id == default_id)
            .map(|ep| ep.index)
    }

    /// Resolves a device-supplied index.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSpeakerIndex`] when `index` is not in this snapshot.
    pub fn resolve(&self, index: usize) -> Result<&AudioEndpoint, InvalidSpeakerIndex> {
        self.endpoints.get(index).ok_or(InvalidSpeakerIndex {
            index,
            available: self.endpoints.len(),
        })
    }

    /// Renders the snapshot as the mandatory reply sequence:
    /// `SPK BEGIN`, one `SPK ITEM` per endpoint, `SPK END`, then `SPK CUR`
    /// only if the default endpoint is in the list.
    pub fn to_commands(&self) -> Vec<Command> {
        let mut out = Vec::with_capacity(self.endpoints.len() + 3);
        out.push(Command::SpeakerBegin);
        out.extend(
            self.endpoints
                .iter()
                .map(|ep| Command::speaker_item(ep.index, &ep.name)),
        );
        out.push(Command::SpeakerEnd);
        if let Some(current) = self.current_index() {
            out.push(Command::SpeakerCurrent(current));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_speakers(default_id: Option<&str>) -> EndpointSnapshot {
        EndpointSnapshot::new(
            [
                ("{0.0.0}.{aaa}".to_string(), "Speakers".to_string()),
                ("{0.0.0}.{bbb}".to_string(), "Kopfhörer".to_string()),
                ("{0.0.0}.{ccc}".to_string(), "HDMI".to_string()),
            ],
            default_id.map(str::to_string),
        )
    }

    #[test]
    fn test_indices_follow_enumeration_order() {
        let snap = three_speakers(None);
        let indices: Vec<usize> = snap.endpoints().iter().map(|ep| ep.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_current_index_matches_default_id() {
        let snap = three_speakers(Some("{0.0.0}.{ccc}"));
        assert_eq!(snap.current_index(), Some(2));
    }

    #[test]
    fn test_current_index_none_when_default_not_listed() {
        let snap = three_speakers(Some("{0.0.0}.{zzz}"));
        assert_eq!(snap.current_index(), None);
    }

    #[test]
    fn test_resolve_rejects_out_of_range_index() {
        let snap = three_speakers(None);
        assert_eq!(
            snap.resolve(7).err(),
            Some(InvalidSpeakerIndex {
                index: 7,
                available: 3
            })
        );
        assert_eq!(snap.resolve(1).map(|ep| ep.name.as_str()), Ok("Kopfhörer"));
    }

    #[test]
    fn test_to_commands_orders_begin_items_end_cur() {
        // Arrange
        let snap = three_speakers(Some("{0.0.0}.{bbb}"));

        // Act
        let cmds = snap.to_commands();

        // Assert
        assert_eq!(
            cmds,
            vec![
                Command::SpeakerBegin,
                Command::speaker_item(0, "Speakers"),
                Command::speaker_item(1, "Kopfh?rer"),
                Command::speaker_item(2, "HDMI"),
                Command::SpeakerEnd,
                Command::SpeakerCurrent(1),
            ]
        );
    }

    #[test]
    fn test_to_commands_for_empty_snapshot_omits_cur() {
        let snap = EndpointSnapshot::new(Vec::<(String, String)>::new(), Some("{x}".to_string()));
        assert_eq!(snap.to_commands(), vec![Command::SpeakerBegin, Command::SpeakerEnd]);
    }
}
