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

use serde::{Deserialize, Serialize};

/// The opening message of the connection handshake. Each side presents its
/// certificate and a fresh nonce for the counterparty to sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// The sender's protocol version.
    pub version: u32,
    /// The port the sender's listener is bound to.
    pub listener_port: u16,
    /// The sender's certificate in DER encoding.
    pub certificate: Vec<u8>,
    /// A nonce the counterparty must sign to prove key possession.
    pub nonce: u64,
}

/// The closing message of the connection handshake: a signature over the
/// counterparty's nonce, verifiable against the certificate presented in the
/// matching [`ChallengeRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// The signature over the counterparty's nonce, little-endian encoded.
    pub signature: Vec<u8>,
}
