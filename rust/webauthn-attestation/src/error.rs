//! Error types for attestation verification.

use thiserror::Error;
use webauthn_codec::SignatureError;

/// Errors from verifying an attestation statement or evaluating its trust.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    /// The statement is missing fields, has fields of the wrong type, or
    /// carries data inconsistent with the authenticator data.
    #[error("malformed attestation statement: {0}")]
    MalformedAttestationStatement(String),

    /// The attestation signature does not verify.
    #[error("attestation signature is invalid")]
    AttestationSignatureInvalid,

    /// An attestation certificate could not be parsed.
    #[error("malformed attestation certificate: {0}")]
    MalformedAttestationCertificate(String),

    /// An attestation certificate parsed but does not meet the format's
    /// requirements.
    #[error("attestation certificate requirements not met: {0}")]
    CertificateRequirementsNotMet(String),

    /// The key attested to is not the credential public key.
    #[error("attested public key does not match the credential public key")]
    PublicKeyMismatch,

    /// Verification could not be attempted with the statement's algorithm
    /// and key.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The trust-root resolver failed.
    #[error("trust root resolution failed: {0}")]
    TrustResolution(String),
}
