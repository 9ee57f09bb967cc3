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

use crate::{Accusation, Note};
use ifrit_identity::PeerId;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A compact digest of the sender's view, sent with every Spread exchange.
///
/// `existing` maps every identifier the sender knows to the note epoch it
/// holds for it, with 0 standing in for a noteless peer. The receiver replies
/// with whatever the digest shows the sender is missing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// The sender's own current note.
    pub own_note: Note,
    /// The sender's digest: peer identifier to held note epoch (0 = noteless).
    pub existing: IndexMap<PeerId, u64>,
    /// An opaque application payload attached to the exchange.
    pub content: Option<Vec<u8>>,
}

/// The receiver's reply to a Spread: the certificates, notes, and accusations
/// the sender's digest showed it was missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResponse {
    /// Certificates in DER encoding, content-addressed by their subject key id.
    pub certificates: Vec<Vec<u8>>,
    /// Notes newer than what the sender holds.
    pub notes: Vec<Note>,
    /// Accusations the sender has not yet seen.
    pub accusations: Vec<Accusation>,
}

impl StateResponse {
    /// Returns `true` if the response carries nothing.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty() && self.notes.is_empty() && self.accusations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::full_mask;
    use ifrit_identity::Identity;

    #[test]
    fn state_serialization() {
        let identity = Identity::generate(4, "a", "b", "c").unwrap();
        let other = Identity::generate(4, "a", "b", "c").unwrap();

        let mut existing = IndexMap::new();
        existing.insert(identity.id(), 2u64);
        existing.insert(other.id(), 0u64);

        let state = State {
            own_note: Note::new(identity.id(), 2, full_mask(4), identity.keypair()),
            existing,
            content: Some(b"payload".to_vec()),
        };

        let bytes = bincode::serialize(&state).unwrap();
        let deserialized: State = bincode::deserialize(&bytes).unwrap();
        assert_eq!(state, deserialized);
    }

    #[test]
    fn empty_response_is_empty() {
        assert!(StateResponse::default().is_empty());
    }
}
