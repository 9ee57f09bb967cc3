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

/// A signed claim by one peer that another has failed on a given ring.
///
/// The accusation is anchored to the accused's current note epoch; once the
/// accused publishes a newer note the accusation is void. The accuser signs
/// the claim, so a lying accuser can be held accountable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accusation {
    accused: PeerId,
    accuser: PeerId,
    epoch: u64,
    ring_num: u32,
    signature: Vec<u8>,
}

impl Accusation {
    /// Constructs and signs a new accusation for the given ring.
    pub fn new(ring_num: u32, accused: PeerId, accuser: PeerId, epoch: u64, keypair: &Keypair) -> Self {
        let signature = keypair.sign(&Self::signable(&accused, &accuser, epoch, ring_num)).to_bytes().to_vec();
        Self { accused, accuser, epoch, ring_num, signature }
    }

    /// Returns the identifier of the accused peer.
    pub const fn accused(&self) -> PeerId {
        self.accused
    }

    /// Returns the identifier of the accusing peer.
    pub const fn accuser(&self) -> PeerId {
        self.accuser
    }

    /// Returns the note epoch the accusation is anchored to.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the ring the accusation concerns.
    pub const fn ring_num(&self) -> u32 {
        self.ring_num
    }

    /// Verifies the accusation's signature against the accuser's certificate.
    pub fn verify(&self, accuser_certificate: &Certificate) -> bool {
        accuser_certificate.verify_bytes(
            &Self::signable(&self.accused, &self.accuser, self.epoch, self.ring_num),
            &self.signature,
        )
    }

    /// The bytes covered by the signature:
    /// `accused || accuser || epoch_le || ring_num_le`.
    fn signable(accused: &PeerId, accuser: &PeerId, epoch: u64, ring_num: u32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 * PeerId::LENGTH + 12);
        bytes.extend_from_slice(accused.as_bytes());
        bytes.extend_from_slice(accuser.as_bytes());
        bytes.extend_from_slice(&epoch.to_le_bytes());
        bytes.extend_from_slice(&ring_num.to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifrit_identity::Identity;

    #[test]
    fn accusation_serialization() {
        let accuser = Identity::generate(4, "a", "b", "c").unwrap();
        let accused = Identity::generate(4, "a", "b", "c").unwrap();
        let accusation = Accusation::new(2, accused.id(), accuser.id(), 7, accuser.keypair());

        let bytes = bincode::serialize(&accusation).unwrap();
        let deserialized: Accusation = bincode::deserialize(&bytes).unwrap();
        assert_eq!(accusation, deserialized);
        assert_eq!(bytes, bincode::serialize(&deserialized).unwrap());
    }

    #[test]
    fn accusation_signature_binds_the_accuser() {
        let accuser = Identity::generate(4, "a", "b", "c").unwrap();
        let accused = Identity::generate(4, "a", "b", "c").unwrap();
        let accusation = Accusation::new(1, accused.id(), accuser.id(), 3, accuser.keypair());

        assert!(accusation.verify(accuser.certificate()));
        // The accused's certificate cannot vouch for the accuser's claim.
        assert!(!accusation.verify(accused.certificate()));
    }
}
