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

use crate::Node;

use ifrit_identity::{Certificate, IdentityError};
use ifrit_node_messages::{Accusation, Note, ProtocolError};
use ifrit_node_view::Peer;

impl Node {
    /// Accepts a validated certificate into the view. A certificate for an
    /// already-known peer is ignored; a certificate naming the local node is
    /// rejected. A newly admitted peer starts noteless and unaccused.
    pub fn eval_certificate(&self, certificate: &Certificate) -> Result<(), ProtocolError> {
        if certificate.id() == self.id() {
            return Err(ProtocolError::SelfCertificate);
        }
        if self.view().contains(&certificate.id()) {
            return Ok(());
        }
        self.view().add_full(Peer::new(certificate.clone()));
        debug!("Admitted the peer '{}'", certificate.id());
        Ok(())
    }

    /// Parses, validates, and accepts a certificate from its DER encoding.
    pub fn eval_certificate_der(&self, der: &[u8]) -> Result<(), ProtocolError> {
        if der.is_empty() {
            return Err(ProtocolError::NilCertificate);
        }
        let certificate = Certificate::from_der(der).map_err(|error| match error {
            IdentityError::InvalidSignature => ProtocolError::InvalidSignature,
            IdentityError::InvalidId => ProtocolError::InvalidId,
            _ => ProtocolError::InvalidCertificate,
        })?;
        self.eval_certificate(&certificate)
    }

    /// Accepts a note if it is strictly newer than the one held for its peer
    /// and carries a valid signature and a non-empty mask. Accepting a note
    /// voids every standing accusation against the peer, cancels its
    /// rebuttal deadline, and marks it alive.
    pub fn eval_note(&self, note: &Note) -> Result<(), ProtocolError> {
        let peer = self.view().peer(&note.id()).ok_or(ProtocolError::NoPeer)?;
        if note.epoch() <= peer.note_epoch() {
            return Err(ProtocolError::OldNote);
        }
        if note.mask() == 0 {
            return Err(ProtocolError::InvalidMask);
        }
        if !note.verify(peer.certificate()) {
            return Err(ProtocolError::InvalidSignature);
        }

        peer.set_note(note.clone());
        if peer.is_accused() {
            // The newer note rebuts whatever stood against the peer.
            peer.clear_accusations();
            self.view().timers().cancel(&peer.id());
        }
        self.view().add_live(peer.id());
        Ok(())
    }

    /// Accepts an accusation if the accuser is the monitoring predecessor of
    /// the accused on the named ring, the epoch anchors to the accused's
    /// current note, and the signature verifies.
    ///
    /// An accusation naming the local node takes the rebuttal path instead:
    /// the local note is republished at the next epoch and nothing is stored.
    /// An accusation claiming a local epoch we have not declared is dropped.
    pub fn eval_accusation(&self, accusation: &Accusation) -> Result<(), ProtocolError> {
        let accused = accusation.accused();
        let accuser = accusation.accuser();
        if accuser == accused {
            return Err(ProtocolError::InvalidAccuser);
        }
        let accuser_peer = self.view().peer(&accuser).ok_or(ProtocolError::NoPeer)?;
        if !self.view().is_ring_predecessor(&accuser, &accused, accusation.ring_num()) {
            return Err(ProtocolError::InvalidAccuser);
        }

        if accused == self.id() {
            let own_epoch = self.view().self_peer().note_epoch();
            if accusation.epoch() > own_epoch {
                return Err(ProtocolError::InvalidSelfAccusation);
            }
            self.publish_note(own_epoch + 1);
            debug!("Rebutted an accusation by '{accuser}' (now at epoch {})", own_epoch + 1);
            return Ok(());
        }

        let accused_peer = self.view().peer(&accused).ok_or(ProtocolError::NoPeer)?;
        if accused_peer.note_epoch() == 0 || accusation.epoch() != accused_peer.note_epoch() {
            return Err(ProtocolError::InvalidEpoch);
        }
        if !accusation.verify(accuser_peer.certificate()) {
            return Err(ProtocolError::InvalidSignature);
        }
        if accused_peer.accusation_on(accusation.ring_num()).is_some() {
            // The rebuttal deadline keeps counting from the first accusation.
            return Err(ProtocolError::AccAlreadyExists);
        }

        accused_peer.add_accusation(accusation.clone());
        self.view().remove_live(&accused);
        self.view().timers().start(accused, accusation.epoch(), accuser);
        info!("Recorded an accusation against '{accused}' by '{accuser}' on ring {}", accusation.ring_num());
        Ok(())
    }
}
