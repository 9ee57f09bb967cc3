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

#![forbid(unsafe_code)]

mod certificate;
pub use certificate::*;

mod id;
pub use id::*;

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Errors produced while generating or validating identity material.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("malformed certificate encoding")]
    InvalidEncoding,
    #[error("certificate carries an unsupported public key")]
    UnsupportedKey,
    #[error("invalid certificate signature")]
    InvalidSignature,
    #[error("subject key id has an invalid length")]
    InvalidId,
    #[error("missing or malformed ring-count extension")]
    InvalidRingExtension,
    #[error("certificate is missing locality entries")]
    MissingLocality,
    #[error("certificate generation failed: {0}")]
    Generation(String),
    #[error("certificate public key does not match the signing key")]
    KeyMismatch,
}

/// The signing identity of the local node: an Ed25519 keypair together with
/// the certificate that binds it to a [`PeerId`] and a set of addresses.
pub struct Identity {
    keypair: Keypair,
    certificate: Certificate,
}

impl Identity {
    /// Generates a fresh keypair and a matching self-signed certificate.
    pub fn generate(
        num_rings: u32,
        service_addr: &str,
        ping_addr: &str,
        http_addr: &str,
    ) -> Result<Self, IdentityError> {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let secret = SecretKey::from_bytes(&seed).map_err(|error| IdentityError::Generation(error.to_string()))?;
        let public = PublicKey::from(&secret);
        let keypair = Keypair { secret, public };

        let certificate = Certificate::generate(&keypair, num_rings, service_addr, ping_addr, http_addr)?;
        Ok(Self { keypair, certificate })
    }

    /// Replaces the certificate, e.g. with one issued by an external
    /// certificate authority. The new certificate must bind the same key.
    pub fn with_certificate(self, certificate: Certificate) -> Result<Self, IdentityError> {
        if certificate.public_key() != &self.keypair.public {
            return Err(IdentityError::KeyMismatch);
        }
        Ok(Self { keypair: self.keypair, certificate })
    }

    /// Returns the identifier of this identity.
    pub fn id(&self) -> PeerId {
        self.certificate.id()
    }

    /// Returns the certificate of this identity.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Returns the signing keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Signs the given bytes with the identity's key.
    pub fn sign_bytes(&self, message: &[u8]) -> Vec<u8> {
        self.keypair.sign(message).to_bytes().to_vec()
    }
}
