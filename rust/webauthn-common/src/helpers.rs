//! Testing utilities for exercising relying-party ceremonies without a real
//! authenticator.
//!
//! The helpers here produce the raw bytes a browser would hand back to a
//! relying party: authenticator data, attestation objects, client data JSON
//! and X.509 attestation certificates. They deliberately depend on nothing
//! but encoders, so that the decoding crates can be tested against them
//! without sharing types.
//!
//! # Example
//!
//! ```rust
//! use webauthn_common::helpers::{SoftAuthenticator, client_data_json, flags};
//!
//! let authenticator = SoftAuthenticator::new(1);
//! let auth_data = authenticator.registration_authenticator_data("example.com", flags::UP, 0);
//! let client_data = client_data_json("webauthn.create", &[7u8; 32], "https://example.com");
//! let attestation_object = authenticator.none_attestation(&auth_data);
//! assert!(!attestation_object.is_empty());
//! assert!(!client_data.is_empty());
//! ```

mod authenticator;
pub use authenticator::*;

mod certificate;
pub use certificate::*;

use crate::RandomSource;
use ciborium::Value;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use std::sync::Mutex;

/// AAGUID used by [`SoftAuthenticator`] unless overridden.
pub const TEST_AAGUID: [u8; 16] = [
    0x6d, 0x44, 0xba, 0x9b, 0xf6, 0xec, 0x2e, 0x49, 0xb9, 0x30, 0x0c, 0x8f, 0xe9, 0x20, 0xcb, 0x73,
];

/// Authenticator data flag bits.
pub mod flags {
    /// User present.
    pub const UP: u8 = 0x01;
    /// User verified.
    pub const UV: u8 = 0x04;
    /// Backup eligible.
    pub const BE: u8 = 0x08;
    /// Backed up.
    pub const BS: u8 = 0x10;
    /// Attested credential data included.
    pub const AT: u8 = 0x40;
    /// Extension data included.
    pub const ED: u8 = 0x80;
}

/// A deterministic [`RandomSource`] for reproducible tests.
#[derive(Debug)]
pub struct SeededRandom(Mutex<ChaCha20Rng>);

impl SeededRandom {
    /// Create a source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(ChaCha20Rng::seed_from_u64(seed)))
    }
}

impl RandomSource for SeededRandom {
    fn fill(&self, buffer: &mut [u8]) {
        let mut rng = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.fill_bytes(buffer);
    }
}

/// SHA-256 of a relying party ID, as found at the start of authenticator data.
pub fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    Sha256::digest(rp_id.as_bytes()).into()
}

/// SHA-256 of arbitrary bytes.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Serialize a `CollectedClientData` JSON document.
pub fn client_data_json(ceremony_type: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": ceremony_type,
        "challenge": crate::base64url::encode(challenge),
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

/// Attested credential data to append after the fixed authenticator data
/// header.
#[derive(Debug, Clone)]
pub struct AttestedCredential<'a> {
    /// Authenticator model identifier.
    pub aaguid: [u8; 16],
    /// Credential ID, length-prefixed on the wire.
    pub credential_id: &'a [u8],
    /// COSE-encoded credential public key.
    pub public_key: &'a [u8],
}

/// Lay out authenticator data bytes.
///
/// The `AT` and `ED` flags are taken from `flags` verbatim, so tests can
/// produce inconsistent structures on purpose.
pub fn authenticator_data(
    rp_id: &str,
    flags: u8,
    counter: u32,
    attested: Option<&AttestedCredential<'_>>,
    extensions: Option<&[u8]>,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(256);
    bytes.extend_from_slice(&rp_id_hash(rp_id));
    bytes.push(flags);
    bytes.extend_from_slice(&counter.to_be_bytes());
    if let Some(attested) = attested {
        bytes.extend_from_slice(&attested.aaguid);
        bytes.extend_from_slice(&(attested.credential_id.len() as u16).to_be_bytes());
        bytes.extend_from_slice(attested.credential_id);
        bytes.extend_from_slice(attested.public_key);
    }
    if let Some(extensions) = extensions {
        bytes.extend_from_slice(extensions);
    }
    bytes
}

/// Encode an attestation object `{fmt, attStmt, authData}`.
pub fn attestation_object(format: &str, auth_data: &[u8], statement: Vec<(Value, Value)>) -> Vec<u8> {
    to_cbor(&Value::Map(vec![
        (text("fmt"), text(format)),
        (text("attStmt"), Value::Map(statement)),
        (text("authData"), Value::Bytes(auth_data.to_vec())),
    ]))
}

/// COSE_Key for an EC2 public key.
pub fn cose_ec2_key(algorithm: i64, curve: i64, x: &[u8], y: &[u8]) -> Vec<u8> {
    to_cbor(&Value::Map(vec![
        (int(1), int(2)),
        (int(3), int(algorithm)),
        (int(-1), int(curve)),
        (int(-2), Value::Bytes(x.to_vec())),
        (int(-3), Value::Bytes(y.to_vec())),
    ]))
}

/// COSE_Key for an OKP public key.
pub fn cose_okp_key(algorithm: i64, curve: i64, x: &[u8]) -> Vec<u8> {
    to_cbor(&Value::Map(vec![
        (int(1), int(1)),
        (int(3), int(algorithm)),
        (int(-1), int(curve)),
        (int(-2), Value::Bytes(x.to_vec())),
    ]))
}

/// COSE_Key for an RSA public key.
pub fn cose_rsa_key(algorithm: i64, modulus: &[u8], exponent: &[u8]) -> Vec<u8> {
    to_cbor(&Value::Map(vec![
        (int(1), int(3)),
        (int(3), int(algorithm)),
        (int(-1), Value::Bytes(modulus.to_vec())),
        (int(-2), Value::Bytes(exponent.to_vec())),
    ]))
}

/// CBOR text value.
pub fn text(value: &str) -> Value {
    Value::Text(value.to_owned())
}

/// CBOR integer value.
pub fn int(value: i64) -> Value {
    Value::Integer(value.into())
}

/// CBOR byte string value.
pub fn bytes(value: &[u8]) -> Value {
    Value::Bytes(value.to_vec())
}

/// Encode a CBOR value.
pub fn to_cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).expect("writing CBOR into a Vec cannot fail");
    out
}

/// Wrap `content` in a DER tag-length-value header.
pub fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let length = content.len();
    if length < 0x80 {
        out.push(length as u8);
    } else {
        let be = length.to_be_bytes();
        let significant: Vec<u8> = be.iter().copied().skip_while(|byte| *byte == 0).collect();
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(&significant);
    }
    out.extend_from_slice(content);
    out
}
