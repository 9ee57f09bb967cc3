// Copyright (C) The Ifrit Authors.
// This file is part of the ifrit library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ifrit_identity::{Certificate, PeerId};
use ifrit_node_messages::{Accusation, Note};

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A record for a known peer: its immutable identity plus the mutable cells
/// holding its latest accepted note and the accusations standing against it.
///
/// The record is cheaply cloneable; the cells sit behind a per-peer lock so
/// concurrent merges targeting different peers do not serialize on the view.
#[derive(Clone)]
pub struct Peer(Arc<InnerPeer>);

pub struct InnerPeer {
    /// The peer's identifier, equal to the certificate's subject key id.
    id: PeerId,
    /// The peer's validated certificate.
    certificate: Certificate,
    /// The latest accepted note, if any.
    note: RwLock<Option<Note>>,
    /// The standing accusations, at most one per ring.
    accusations: RwLock<IndexMap<u32, Accusation>>,
}

impl Peer {
    /// Initializes a record from a validated certificate: a new identity with
    /// no note and no accusations.
    pub fn new(certificate: Certificate) -> Self {
        Self(Arc::new(InnerPeer {
            id: certificate.id(),
            certificate,
            note: Default::default(),
            accusations: Default::default(),
        }))
    }

    /// Returns the peer's identifier.
    pub fn id(&self) -> PeerId {
        self.0.id
    }

    /// Returns the peer's certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.0.certificate
    }

    /// Returns a copy of the peer's current note, if any.
    pub fn note(&self) -> Option<Note> {
        self.0.note.read().clone()
    }

    /// Returns the epoch of the current note, or 0 if the peer is noteless.
    pub fn note_epoch(&self) -> u64 {
        self.0.note.read().as_ref().map_or(0, Note::epoch)
    }

    /// Replaces the peer's current note.
    pub fn set_note(&self, note: Note) {
        *self.0.note.write() = Some(note);
    }

    /// Marks the peer as noteless.
    pub fn clear_note(&self) {
        *self.0.note.write() = None;
    }

    /// Returns `true` if the peer participates on the given ring. A noteless
    /// peer has not deactivated anything yet and counts as participating.
    pub fn participates_on(&self, ring: u32) -> bool {
        self.0.note.read().as_ref().map_or(true, |note| note.participates_on(ring))
    }

    /// Returns the standing accusations against the peer.
    pub fn accusations(&self) -> Vec<Accusation> {
        self.0.accusations.read().values().cloned().collect()
    }

    /// Returns the standing accusation for the given ring, if any.
    pub fn accusation_on(&self, ring: u32) -> Option<Accusation> {
        self.0.accusations.read().get(&ring).cloned()
    }

    /// Records an accusation against the peer, keyed by ring.
    pub fn add_accusation(&self, accusation: Accusation) {
        self.0.accusations.write().insert(accusation.ring_num(), accusation);
    }

    /// Clears all standing accusations, e.g. after a rebuttal.
    pub fn clear_accusations(&self) {
        self.0.accusations.write().clear();
    }

    /// Returns `true` if at least one accusation stands against the peer.
    pub fn is_accused(&self) -> bool {
        !self.0.accusations.read().is_empty()
    }

    /// Returns `true` if the peer has a note and no standing accusations.
    pub fn is_alive(&self) -> bool {
        self.0.note.read().is_some() && self.0.accusations.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifrit_identity::Identity;
    use ifrit_node_messages::full_mask;

    use proptest::collection::vec;
    use proptest::prelude::*;

    fn sample_peer(identity: &Identity) -> Peer {
        Peer::new(identity.certificate().clone())
    }

    #[test]
    fn fresh_peer_has_no_state() {
        let identity = Identity::generate(4, "a", "b", "c").unwrap();
        let peer = sample_peer(&identity);

        assert!(peer.note().is_none());
        assert_eq!(peer.note_epoch(), 0);
        assert!(!peer.is_accused());
        assert!(!peer.is_alive());
        // Without a note, every ring counts as active.
        assert!(peer.participates_on(1));
    }

    #[test]
    fn note_and_accusations_drive_liveness() {
        let identity = Identity::generate(4, "a", "b", "c").unwrap();
        let accuser = Identity::generate(4, "a", "b", "c").unwrap();
        let peer = sample_peer(&identity);

        peer.set_note(Note::new(identity.id(), 1, full_mask(4), identity.keypair()));
        assert!(peer.is_alive());

        peer.add_accusation(Accusation::new(2, identity.id(), accuser.id(), 1, accuser.keypair()));
        assert!(peer.is_accused());
        assert!(!peer.is_alive());
        assert!(peer.accusation_on(2).is_some());
        assert!(peer.accusation_on(1).is_none());

        peer.clear_accusations();
        assert!(peer.is_alive());

        peer.clear_note();
        assert!(!peer.is_alive());
        assert_eq!(peer.note_epoch(), 0);
    }

    proptest! {
        #[test]
        fn accepted_note_epochs_are_strictly_increasing(epochs in vec(1u64..1000, 1..40)) {
            let identity = Identity::generate(4, "a", "b", "c").unwrap();
            let peer = sample_peer(&identity);

            let mut accepted = Vec::new();
            for epoch in epochs {
                // A note is only ever installed when it is newer than the
                // one currently held.
                if epoch > peer.note_epoch() {
                    peer.set_note(Note::new(identity.id(), epoch, full_mask(4), identity.keypair()));
                    accepted.push(epoch);
                }
            }

            prop_assert!(accepted.windows(2).all(|pair| pair[0] < pair[1]));
            if let Some(last) = accepted.last() {
                prop_assert_eq!(peer.note_epoch(), *last);
            }
        }
    }
}
