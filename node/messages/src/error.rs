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

use thiserror::Error;

/// The reasons an incoming artifact or exchange is rejected.
///
/// All of these are terminal for the operation that produced them but
/// recoverable at the protocol level; none propagate as fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The caller context carried no authenticated peer.
    #[error("no peer in the caller context")]
    NoPeerContext,
    /// The caller context carried no certificate.
    #[error("caller supplied no certificate")]
    NoCertificate,
    /// An artifact's signature failed verification.
    #[error("invalid artifact signature")]
    InvalidSignature,
    /// A certificate's subject key id does not have the expected length.
    #[error("certificate id has an invalid length")]
    InvalidId,
    /// An empty certificate was presented.
    #[error("empty certificate")]
    NilCertificate,
    /// A certificate names the local node.
    #[error("certificate names the local node")]
    SelfCertificate,
    /// A certificate failed structural validation.
    #[error("malformed certificate")]
    InvalidCertificate,
    /// A note arrived for a peer with no accepted certificate.
    #[error("note for an unknown peer")]
    NoPeer,
    /// A note's epoch is not newer than the one already held.
    #[error("stale note epoch")]
    OldNote,
    /// A note's mask activates no rings.
    #[error("note mask activates no rings")]
    InvalidMask,
    /// The accuser is not the ring predecessor of the accused.
    #[error("accuser is not the ring predecessor of the accused")]
    InvalidAccuser,
    /// An accusation's epoch does not match the accused's current note.
    #[error("accusation epoch does not match the accused's note")]
    InvalidEpoch,
    /// An accusation names the local node at an epoch it has not declared.
    #[error("accusation claims an undeclared local epoch")]
    InvalidSelfAccusation,
    /// An accusation for this peer and ring is already recorded.
    #[error("accusation already recorded for this ring")]
    AccAlreadyExists,
    /// The caller is not adjacent to the local node on any ring.
    #[error("caller is not one of our ring neighbours")]
    NotMyNeighbour,
}
