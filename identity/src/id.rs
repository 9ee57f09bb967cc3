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

use crate::IdentityError;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A peer identifier, equal to the `SubjectKeyId` extension of the peer's
/// self-signed certificate. Identifiers are compared byte-wise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId([u8; PeerId::LENGTH]);

impl PeerId {
    /// The number of bytes in a peer identifier.
    pub const LENGTH: usize = 32;

    /// Initializes a new `PeerId` from the given bytes.
    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Initializes a new `PeerId` from a byte slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let bytes: [u8; Self::LENGTH] = bytes.try_into().map_err(|_| IdentityError::InvalidId)?;
        Ok(Self(bytes))
    }

    /// Returns the raw identifier bytes.
    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    /// Returns the placement key of this identifier on the given ring,
    /// computed as `SHA-256(ring_le || id)`. Every peer derives the same key
    /// for the same `(ring, id)` pair, which keeps ring placements consistent
    /// across the network.
    pub fn ring_hash(&self, ring: u32) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(ring.to_le_bytes());
        hasher.update(self.0);
        hasher.finalize().into()
    }
}

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; PeerId::LENGTH]> for PeerId {
    fn from(bytes: [u8; PeerId::LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}
