//! Binary wire format for presence batches.
//!
//! The transport is not part of this crate; it only has to carry the bytes
//! produced here to every other replica and feed them back through
//! [`Awareness::apply_update`].
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌────────────┬──────────────────────────────────────────────┐
//! │ len        │ entries                                      │
//! │ varint     │ client_id (varint) │ clock (varint) │ state? │
//! └────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! `state` is `None` for a client that went offline.

use serde::{Deserialize, Serialize};

use crate::awareness::{Awareness, AwarenessChange, AwarenessEntry, ClientId, Origin};
use crate::error::{CollabError, Result};

/// A batch of presence entries as exchanged between replicas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwarenessUpdate {
    pub entries: Vec<AwarenessEntry>,
}

impl AwarenessUpdate {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CollabError::Encode(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (update, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CollabError::Decode(e.to_string()))?;
        Ok(update)
    }
}

impl Awareness {
    /// Snapshot the given clients' records and clocks into a batch.
    ///
    /// Offline clients that still have clock metadata are encoded with a
    /// `None` state; clients never seen are skipped.
    pub fn update_for(&self, clients: &[ClientId]) -> AwarenessUpdate {
        let entries = clients
            .iter()
            .filter_map(|&client_id| {
                self.meta(client_id).map(|meta| AwarenessEntry {
                    client_id,
                    clock: meta.clock,
                    state: self.state(client_id).cloned(),
                })
            })
            .collect();
        AwarenessUpdate { entries }
    }

    /// Encode the given clients' presence for broadcast.
    pub fn encode_update(&self, clients: &[ClientId]) -> Result<Vec<u8>> {
        self.update_for(clients).encode()
    }

    /// Decode a remote batch and apply it.
    pub fn apply_update(&mut self, bytes: &[u8], origin: Origin) -> Result<AwarenessChange> {
        let update = AwarenessUpdate::decode(bytes)?;
        Ok(self.apply_remote_states(update.entries, origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awareness::{CursorState, PresenceState, StateField, UserInfo};

    #[test]
    fn test_update_roundtrip_between_replicas() {
        let mut alice = Awareness::new(1);
        let user = UserInfo::new("Alice", "#f44336");
        alice.set_local_state_field(StateField::User(Some(user.clone())));
        alice.set_local_state_field(StateField::Cursor(Some(CursorState::from_offsets(1, &user, 3, 0))));

        let mut bob = Awareness::new(2);
        let bytes = alice.encode_update(&[1]).unwrap();
        let change = bob.apply_update(&bytes, Origin::Remote).unwrap();

        assert_eq!(change.added, vec![1]);
        assert_eq!(bob.state(1), alice.local_state());
        assert_eq!(bob.meta(1).unwrap().clock, alice.meta(1).unwrap().clock);
    }

    #[test]
    fn test_offline_client_encoded_as_none() {
        let mut alice = Awareness::new(1);
        let mut bob = Awareness::new(2);
        bob.apply_update(&alice.encode_update(&[1]).unwrap(), Origin::Remote).unwrap();

        alice.set_local_state(None);
        let update = alice.update_for(&[1]);
        assert_eq!(update.entries[0].state, None);

        let change = bob.apply_update(&update.encode().unwrap(), Origin::Remote).unwrap();
        assert_eq!(change.removed, vec![1]);
        assert!(bob.state(1).is_none());
    }

    #[test]
    fn test_unknown_clients_skipped() {
        let alice = Awareness::new(1);
        let update = alice.update_for(&[1, 42]);
        assert_eq!(update.entries.len(), 1);
        assert_eq!(update.entries[0].client_id, 1);
    }

    #[test]
    fn test_duplicate_bytes_are_idempotent() {
        let mut alice = Awareness::new(1);
        alice.set_local_state(Some(PresenceState {
            user: Some(UserInfo::new("Alice", "#f44336")),
            cursor: None,
        }));
        let bytes = alice.encode_update(&[1]).unwrap();

        let mut bob = Awareness::new(2);
        bob.apply_update(&bytes, Origin::Remote).unwrap();
        let after_first = bob.states().clone();
        let change = bob.apply_update(&bytes, Origin::Remote).unwrap();

        assert!(change.is_empty());
        assert_eq!(bob.states(), &after_first);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        assert!(matches!(AwarenessUpdate::decode(&garbage), Err(CollabError::Decode(_))));
    }
}
