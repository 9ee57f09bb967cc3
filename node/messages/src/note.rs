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

use ed25519_dalek::{Keypair, Signer};
use serde::{Deserialize, Serialize};

/// A peer's signed self-declaration of its current epoch and ring mask.
///
/// Notes are monotonic per peer: a note whose epoch is not strictly greater
/// than the currently-accepted one is stale. Bit `i` (1-indexed) of the mask
/// declares participation on ring `i`; a cleared bit deactivates the peer on
/// that ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: PeerId,
    epoch: u64,
    mask: u32,
    signature: Vec<u8>,
}

impl Note {
    /// Constructs and signs a new note.
    pub fn new(id: PeerId, epoch: u64, mask: u32, keypair: &Keypair) -> Self {
        let signature = keypair.sign(&Self::signable(&id, epoch, mask)).to_bytes().to_vec();
        Self { id, epoch, mask, signature }
    }

    /// Returns the identifier of the peer the note describes.
    pub const fn id(&self) -> PeerId {
        self.id
    }

    /// Returns the epoch the note declares.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the ring mask the note declares.
    pub const fn mask(&self) -> u32 {
        self.mask
    }

    /// Returns `true` if the mask activates the given 1-indexed ring.
    pub fn participates_on(&self, ring: u32) -> bool {
        ring >= 1 && ring <= 32 && self.mask & (1 << (ring - 1)) != 0
    }

    /// Verifies the note's signature against its owner's certificate.
    pub fn verify(&self, certificate: &Certificate) -> bool {
        certificate.verify_bytes(&Self::signable(&self.id, self.epoch, self.mask), &self.signature)
    }

    /// The bytes covered by the signature: `id || epoch_le || mask_le`.
    fn signable(id: &PeerId, epoch: u64, mask: u32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PeerId::LENGTH + 12);
        bytes.extend_from_slice(id.as_bytes());
        bytes.extend_from_slice(&epoch.to_le_bytes());
        bytes.extend_from_slice(&mask.to_le_bytes());
        bytes
    }
}

/// Returns a mask activating the first `num_rings` rings.
pub fn full_mask(num_rings: u32) -> u32 {
    match num_rings {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => (1u32 << n) - 1,
    }
}
