//! Error types for decoding and signature verification.

use crate::CoseAlgorithm;
use thiserror::Error;

/// Errors from decoding WebAuthn binary structures.
///
/// The payload string describes what was wrong and is meant for logs; it is
/// not part of the error's identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The attestation object is not a well-formed CBOR map with `fmt`,
    /// `authData` and `attStmt`, or has trailing bytes.
    #[error("malformed attestation object: {0}")]
    MalformedAttestationObject(String),

    /// The authenticator data is truncated, inconsistent with its flags,
    /// or has trailing bytes.
    #[error("malformed authenticator data: {0}")]
    MalformedAuthenticatorData(String),

    /// The COSE key is structurally invalid.
    #[error("malformed COSE key: {0}")]
    MalformedCoseKey(String),

    /// The COSE key uses a key type or curve that is not supported.
    #[error("unsupported COSE key type: {0}")]
    UnsupportedCoseKeyType(String),
}

/// Errors from [`verify_signature`](crate::verify_signature).
///
/// A signature that simply does not verify is not an error; these cover the
/// cases where verification could not be attempted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The algorithm cannot be used with the given kind of key.
    #[error("algorithm {algorithm} cannot be used with a {key_type} key")]
    AlgorithmKeyMismatch {
        /// Requested algorithm.
        algorithm: CoseAlgorithm,
        /// Description of the key that was supplied.
        key_type: &'static str,
    },

    /// The algorithm is not implemented.
    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(CoseAlgorithm),

    /// The public key could not be turned into a verifying key.
    #[error("invalid public key")]
    InvalidKey,
}
