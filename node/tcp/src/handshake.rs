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

use ifrit_identity::{Certificate, Identity};
use ifrit_node_messages::{ChallengeRequest, ChallengeResponse, Message, MessageCodec, ProtocolError};

use anyhow::{anyhow, bail, Result};
use futures::SinkExt;
use rand::{rngs::OsRng, Rng};
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;

/// Performs the mutual challenge handshake on a fresh connection and returns
/// the counterparty's validated certificate.
///
/// Both sides run the same sequence: present a certificate and a fresh nonce,
/// then return a signature over the counterparty's nonce. A connection is
/// authenticated once the signature verifies against the presented
/// certificate's public key.
pub(crate) async fn execute(
    framed: &mut Framed<TcpStream, MessageCodec>,
    identity: &Identity,
    listener_port: u16,
) -> Result<Certificate> {
    /* Step 1: Send the challenge request. */

    // Sample a random nonce.
    let nonce_a: u64 = OsRng.gen();

    let message_a = Message::ChallengeRequest(ChallengeRequest {
        version: Message::VERSION,
        listener_port,
        certificate: identity.certificate().der().to_vec(),
        nonce: nonce_a,
    });
    framed.send(message_a).await?;

    /* Step 2: Receive the challenge request. */

    let request_b = match framed.try_next().await? {
        Some(Message::ChallengeRequest(request)) => request,
        // The counterparty never authenticated itself.
        Some(_) | None => return Err(ProtocolError::NoPeerContext.into()),
    };

    // Ensure the message protocol version is not outdated.
    if request_b.version < Message::VERSION {
        bail!("the peer runs an outdated protocol version ({})", request_b.version);
    }
    if request_b.certificate.is_empty() {
        return Err(ProtocolError::NoCertificate.into());
    }
    let certificate = Certificate::from_der(&request_b.certificate)
        .map_err(|error| anyhow!("the peer presented an invalid certificate - {error}"))?;
    if certificate.id() == identity.id() {
        bail!("the peer presented our own certificate (attempted self-connect)");
    }

    /* Step 3: Send the challenge response. */

    // Sign the counterparty nonce.
    let signature = identity.sign_bytes(&request_b.nonce.to_le_bytes());
    framed.send(Message::ChallengeResponse(ChallengeResponse { signature })).await?;

    /* Step 4: Receive the challenge response. */

    let response_a = match framed.try_next().await? {
        Some(Message::ChallengeResponse(response)) => response,
        Some(message) => bail!("the peer sent '{}' instead of a challenge response", message.name()),
        None => bail!("the peer closed the connection mid-handshake"),
    };

    // Verify the signature over our nonce.
    if !certificate.verify_bytes(&nonce_a.to_le_bytes(), &response_a.signature) {
        bail!("the peer failed to prove possession of its certificate key");
    }

    Ok(certificate)
}
