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

use crate::{IdentityError, PeerId};

use ed25519_dalek::{Keypair, PublicKey, Signature};
use pkcs8::EncodePrivateKey;
use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, GeneralName, ParsedExtension, X509Certificate};

/// The OID of the custom extension carrying the owner's ring count, encoded
/// as a 4-byte little-endian u32.
pub const RING_COUNT_OID: [u64; 4] = [2, 5, 13, 37];

const RING_COUNT_OID_STR: &str = "2.5.13.37";

/// The maximum number of rings a certificate may declare; bounded by the
/// width of the note ring mask.
pub const MAX_RINGS: u32 = 32;

/// A validated peer certificate.
///
/// Certificates are content-addressed by their `SubjectKeyId`, which doubles
/// as the owner's [`PeerId`]. The raw DER bytes are retained so the
/// certificate can be forwarded to other peers byte-identically; all derived
/// fields are parsed out once, on acceptance.
#[derive(Clone, Debug)]
pub struct Certificate {
    /// The raw DER encoding, as received or generated.
    der: Vec<u8>,
    /// The `SubjectKeyId` of the certificate.
    id: PeerId,
    /// The owner's public key.
    public_key: PublicKey,
    /// The address the owner serves gossip exchanges on.
    service_addr: String,
    /// The address the owner answers liveness pings on.
    ping_addr: String,
    /// The address of the owner's application endpoint.
    http_addr: String,
    /// The number of rings the owner participates in.
    num_rings: u32,
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl Certificate {
    /// Parses and validates a certificate from its DER encoding.
    ///
    /// Validation checks the self-signature against the certificate's own
    /// public key, the length of the `SubjectKeyId`, the ring-count
    /// extension, and the presence of all three locality entries.
    pub fn from_der(der: &[u8]) -> Result<Self, IdentityError> {
        let (rest, cert) = X509Certificate::from_der(der).map_err(|_| IdentityError::InvalidEncoding)?;
        if !rest.is_empty() {
            return Err(IdentityError::InvalidEncoding);
        }

        // Extract the owner's public key.
        let spki = cert.public_key();
        let public_key = PublicKey::from_bytes(spki.subject_public_key.data.as_ref())
            .map_err(|_| IdentityError::UnsupportedKey)?;

        // Verify the self-signature over the to-be-signed portion.
        let signature = Signature::try_from(cert.signature_value.data.as_ref())
            .map_err(|_| IdentityError::InvalidSignature)?;
        public_key
            .verify_strict(cert.tbs_certificate.as_ref(), &signature)
            .map_err(|_| IdentityError::InvalidSignature)?;

        // The `SubjectKeyId` is the owner's identifier. When the extension is
        // absent the identifier is derived the same way the generator does it,
        // as the SHA-256 digest of the raw public key bits.
        let mut id = None;
        let mut num_rings = None;
        for extension in cert.extensions() {
            if let ParsedExtension::SubjectKeyIdentifier(key_id) = extension.parsed_extension() {
                id = Some(PeerId::from_slice(key_id.0)?);
            }
            if extension.oid.to_id_string() == RING_COUNT_OID_STR {
                let bytes: [u8; 4] =
                    extension.value.try_into().map_err(|_| IdentityError::InvalidRingExtension)?;
                num_rings = Some(u32::from_le_bytes(bytes));
            }
        }
        let id = match id {
            Some(id) => id,
            None => PeerId::from_slice(Sha256::digest(spki.subject_public_key.data.as_ref()).as_slice())?,
        };
        let num_rings = num_rings.ok_or(IdentityError::InvalidRingExtension)?;
        if num_rings == 0 || num_rings > MAX_RINGS {
            return Err(IdentityError::InvalidRingExtension);
        }

        // The locality tuple is carried in the subject alternative names, in
        // order: service address, ping address, application address.
        let san = cert
            .subject_alternative_name()
            .map_err(|_| IdentityError::MissingLocality)?
            .ok_or(IdentityError::MissingLocality)?;
        let mut addrs = san.value.general_names.iter().filter_map(|name| match name {
            GeneralName::DNSName(addr) => Some(addr.to_string()),
            _ => None,
        });
        let service_addr = addrs.next().ok_or(IdentityError::MissingLocality)?;
        let ping_addr = addrs.next().ok_or(IdentityError::MissingLocality)?;
        let http_addr = addrs.next().ok_or(IdentityError::MissingLocality)?;

        Ok(Self { der: der.to_vec(), id, public_key, service_addr, ping_addr, http_addr, num_rings })
    }

    /// Generates a new self-signed certificate for the given keypair.
    pub fn generate(
        keypair: &Keypair,
        num_rings: u32,
        service_addr: &str,
        ping_addr: &str,
        http_addr: &str,
    ) -> Result<Self, IdentityError> {
        if num_rings == 0 || num_rings > MAX_RINGS {
            return Err(IdentityError::InvalidRingExtension);
        }

        // Convert the signing key into the PKCS#8 v1 document rcgen consumes;
        // embedding the public key would produce a v2 document it rejects.
        let pkcs8 = ed25519::pkcs8::KeypairBytes {
            secret_key: keypair.secret.to_bytes(),
            public_key: None,
        };
        let pkcs8_der =
            pkcs8.to_pkcs8_der().map_err(|error| IdentityError::Generation(error.to_string()))?;
        let key_pair = rcgen::KeyPair::from_der(pkcs8_der.as_bytes())
            .map_err(|error| IdentityError::Generation(error.to_string()))?;

        let mut params = rcgen::CertificateParams::new(vec![
            service_addr.to_string(),
            ping_addr.to_string(),
            http_addr.to_string(),
        ]);
        params.alg = &rcgen::PKCS_ED25519;
        params.key_pair = Some(key_pair);
        params.key_identifier_method = rcgen::KeyIdMethod::Sha256;
        params.custom_extensions = vec![rcgen::CustomExtension::from_oid_content(
            &RING_COUNT_OID,
            num_rings.to_le_bytes().to_vec(),
        )];
        let mut distinguished_name = rcgen::DistinguishedName::new();
        distinguished_name.push(rcgen::DnType::CommonName, hex::encode(keypair.public.as_bytes()));
        params.distinguished_name = distinguished_name;

        let certificate = rcgen::Certificate::from_params(params)
            .map_err(|error| IdentityError::Generation(error.to_string()))?;
        let der = certificate.serialize_der().map_err(|error| IdentityError::Generation(error.to_string()))?;

        Self::from_der(&der)
    }

    /// Returns the raw DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the owner's identifier.
    pub const fn id(&self) -> PeerId {
        self.id
    }

    /// Returns the owner's public key.
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the address the owner serves gossip exchanges on.
    pub fn service_addr(&self) -> &str {
        &self.service_addr
    }

    /// Returns the address the owner answers liveness pings on.
    pub fn ping_addr(&self) -> &str {
        &self.ping_addr
    }

    /// Returns the address of the owner's application endpoint.
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Returns the number of rings the owner participates in.
    pub const fn num_rings(&self) -> u32 {
        self.num_rings
    }

    /// Verifies a signature produced by the certificate's owner.
    pub fn verify_bytes(&self, message: &[u8], signature: &[u8]) -> bool {
        match Signature::try_from(signature) {
            Ok(signature) => self.public_key.verify_strict(message, &signature).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;

    #[test]
    fn generated_certificate_round_trips() {
        let identity = Identity::generate(32, "127.0.0.1:8000", "127.0.0.1:8001", "127.0.0.1:8002").unwrap();
        let certificate = identity.certificate();

        let reparsed = Certificate::from_der(certificate.der()).unwrap();
        assert_eq!(&reparsed, certificate);
        assert_eq!(reparsed.id(), identity.id());
        assert_eq!(reparsed.num_rings(), 32);
        assert_eq!(reparsed.service_addr(), "127.0.0.1:8000");
        assert_eq!(reparsed.ping_addr(), "127.0.0.1:8001");
        assert_eq!(reparsed.http_addr(), "127.0.0.1:8002");
    }

    #[test]
    fn tampered_certificate_is_rejected() {
        let identity = Identity::generate(8, "127.0.0.1:8000", "127.0.0.1:8001", "127.0.0.1:8002").unwrap();
        let mut der = identity.certificate().der().to_vec();
        // Flip a byte in the middle of the TBS region.
        let index = der.len() / 2;
        der[index] ^= 0xff;
        assert!(Certificate::from_der(&der).is_err());
    }

    #[test]
    fn signatures_verify_against_the_certificate() {
        let identity = Identity::generate(4, "a", "b", "c").unwrap();
        let signature = identity.sign_bytes(b"hello");
        assert!(identity.certificate().verify_bytes(b"hello", &signature));
        assert!(!identity.certificate().verify_bytes(b"goodbye", &signature));
    }

    #[test]
    fn zero_ring_count_is_rejected() {
        assert!(Identity::generate(0, "a", "b", "c").is_err());
        assert!(Identity::generate(MAX_RINGS + 1, "a", "b", "c").is_err());
    }
}
