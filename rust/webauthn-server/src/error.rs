//! Error types for relying-party ceremonies.
//!
//! [`CeremonyError`] carries the precise reason a response was rejected and
//! is meant for logs. Remote clients should be answered with a
//! [`ServiceError`] instead, which only says whether the request was bad,
//! the ceremony failed, or the service is unavailable.

use serde::Serialize;
use thiserror::Error;
use webauthn_attestation::AttestationError;
use webauthn_codec::{CodecError, CoseAlgorithm, SignatureError};

/// Why a registration or assertion response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CeremonyError {
    /// The credential's `id` and `rawId` disagree.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// An attestation object, authenticator data or COSE key failed to
    /// decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The client data JSON did not parse or lacks a required member.
    #[error("malformed client data: {0}")]
    MalformedClientData(String),

    /// The client data `type` is not the one the ceremony expects.
    #[error("client data type mismatch: expected {expected}, received {received}")]
    TypeMismatch {
        /// `webauthn.create` or `webauthn.get`
        expected: String,
        /// The type the client reported
        received: String,
    },

    /// The client signed a different challenge.
    #[error("challenge mismatch")]
    ChallengeMismatch,

    /// The client data origin is not an accepted origin.
    #[error("origin {0} is not accepted")]
    OriginMismatch(String),

    /// Token binding in the client data does not satisfy the expectation.
    #[error("token binding mismatch")]
    TokenBindingMismatch,

    /// The authenticator data was produced for another relying party.
    #[error("RP ID hash mismatch")]
    RpIdHashMismatch,

    /// The user-present flag is not set.
    #[error("user presence is required")]
    UserPresenceRequired,

    /// User verification was required but the flag is not set.
    #[error("user verification is required")]
    UserVerificationRequired,

    /// Registration authenticator data carries no attested credential.
    #[error("authenticator data lacks attested credential data")]
    MissingAttestedCredentialData,

    /// The response's `rawId` is not the attested credential ID.
    #[error("credential ID does not match the attested credential")]
    CredentialIdMismatch,

    /// The new credential uses an algorithm the options did not offer.
    #[error("credential algorithm {0} was not requested")]
    UnrequestedAlgorithm(CoseAlgorithm),

    /// The attestation statement failed verification.
    #[error(transparent)]
    Attestation(#[from] AttestationError),

    /// The attestation format is unknown and unknown formats are rejected.
    #[error("unsupported attestation format {0}")]
    UnsupportedAttestationFormat(String),

    /// The attestation did not lead to a trusted root and untrusted
    /// attestation is not allowed.
    #[error("attestation is not trusted")]
    UntrustedAttestation,

    /// The credential ID is already registered, possibly to another user.
    #[error("credential ID is already registered")]
    CredentialIdAlreadyRegistered,

    /// The credential is not in the allow list or not registered.
    #[error("unknown credential")]
    UnknownCredential,

    /// The response names a different user than the stored credential.
    #[error("user handle does not match the credential owner")]
    UserHandleMismatch,

    /// A discoverable credential assertion arrived without a user handle.
    #[error("user handle is required when no allow list was sent")]
    MissingUserHandle,

    /// The assertion signature does not verify with the stored key.
    #[error("assertion signature is invalid")]
    SignatureInvalid,

    /// The signature could not be checked with the stored key at all.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The signature counter did not advance past the stored value.
    #[error("possible credential cloning: stored counter {stored}, received {received}")]
    PossibleCredentialCloning {
        /// Counter held by the repository
        stored: u32,
        /// Counter reported by the authenticator
        received: u32,
    },

    /// A concurrent assertion already advanced the stored counter.
    #[error("signature counter was updated concurrently")]
    CounterUpdateConflict,

    /// The credential repository failed.
    #[error("credential repository failed: {0}")]
    Repository(String),
}

/// Coarse classification of a [`CeremonyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Undecodable binary or JSON structures.
    MalformedInput,
    /// The response was produced for another challenge, origin, ceremony or
    /// relying party.
    ProtocolMismatch,
    /// A signature failed or could not be checked.
    CryptoFailure,
    /// The response is well-formed but violates relying-party policy.
    PolicyViolation,
    /// A repository or trust-root resolver failed.
    ExternalDependencyFailure,
}

impl ErrorKind {
    /// Whether the same response may be submitted again.
    ///
    /// Every other kind is a definitive verdict: the client has to restart
    /// the ceremony with a fresh challenge.
    pub fn is_retryable(self) -> bool {
        self == Self::ExternalDependencyFailure
    }
}

impl CeremonyError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedResponse(_)
            | Self::MalformedClientData(_)
            | Self::MissingAttestedCredentialData
            | Self::MissingUserHandle => ErrorKind::MalformedInput,
            Self::Codec(CodecError::UnsupportedCoseKeyType(_)) => ErrorKind::CryptoFailure,
            Self::Codec(_) => ErrorKind::MalformedInput,
            Self::TypeMismatch { .. }
            | Self::ChallengeMismatch
            | Self::OriginMismatch(_)
            | Self::TokenBindingMismatch
            | Self::RpIdHashMismatch
            | Self::CredentialIdMismatch
            | Self::UnknownCredential
            | Self::UserHandleMismatch => ErrorKind::ProtocolMismatch,
            Self::Attestation(error) => match error {
                AttestationError::MalformedAttestationStatement(_)
                | AttestationError::MalformedAttestationCertificate(_) => ErrorKind::MalformedInput,
                AttestationError::AttestationSignatureInvalid | AttestationError::Signature(_) => {
                    ErrorKind::CryptoFailure
                }
                AttestationError::CertificateRequirementsNotMet(_) => ErrorKind::PolicyViolation,
                AttestationError::PublicKeyMismatch => ErrorKind::ProtocolMismatch,
                AttestationError::TrustResolution(_) => ErrorKind::ExternalDependencyFailure,
            },
            Self::SignatureInvalid | Self::Signature(_) => ErrorKind::CryptoFailure,
            Self::UserPresenceRequired
            | Self::UserVerificationRequired
            | Self::UnrequestedAlgorithm(_)
            | Self::UnsupportedAttestationFormat(_)
            | Self::UntrustedAttestation
            | Self::CredentialIdAlreadyRegistered
            | Self::PossibleCredentialCloning { .. }
            | Self::CounterUpdateConflict => ErrorKind::PolicyViolation,
            Self::Repository(_) => ErrorKind::ExternalDependencyFailure,
        }
    }
}

/// Errors from generating ceremony options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    /// The requested challenge length is below the minimum.
    #[error("challenge length {length} is below the minimum of {minimum} bytes")]
    ChallengeTooShort {
        /// Requested length
        length: usize,
        /// Minimum accepted length
        minimum: usize,
    },

    /// A user handle must not be empty.
    #[error("user handle is empty")]
    EmptyUserHandle,

    /// A user handle is at most 64 bytes.
    #[error("user handle is {0} bytes, the maximum is 64")]
    UserHandleTooLong(usize),
}

/// Errors from validating a [`RelyingPartyConfig`](crate::RelyingPartyConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No origin is accepted.
    #[error("at least one origin must be configured")]
    NoOrigins,

    /// An origin is not an acceptable URL.
    #[error("invalid origin {origin}: {reason}")]
    InvalidOrigin {
        /// The configured origin
        origin: String,
        /// What is wrong with it
        reason: String,
    },

    /// An origin's host is neither the RP ID nor one of its subdomains.
    #[error("origin {origin} is not within RP ID {rp_id}")]
    OriginOutsideRpId {
        /// The configured origin
        origin: String,
        /// The configured RP ID
        rp_id: String,
    },

    /// The configured challenge length is below the minimum.
    #[error("challenge length {0} is below the minimum of 16 bytes")]
    ChallengeTooShort(usize),
}

/// Error codes for answering remote clients.
///
/// Each code maps to an HTTP status code via [`ErrorCode::status_code`].
/// The codes deliberately do not say which ceremony step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request could not be decoded
    InvalidRequest,
    /// The ceremony was rejected
    CeremonyFailed,
    /// A dependency is unavailable; the request may be retried
    Unavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::CeremonyFailed => 401,
            ErrorCode::Unavailable => 503,
        }
    }
}

/// Service error with code and message.
///
/// This can be converted to HTTP responses by framework-specific code. The
/// message is safe to show to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceError {
    /// The error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<&CeremonyError> for ServiceError {
    fn from(error: &CeremonyError) -> Self {
        match error.kind() {
            ErrorKind::MalformedInput => {
                ServiceError::new(ErrorCode::InvalidRequest, "Malformed credential response")
            }
            ErrorKind::ExternalDependencyFailure => {
                ServiceError::new(ErrorCode::Unavailable, "Temporarily unavailable, try again")
            }
            ErrorKind::ProtocolMismatch | ErrorKind::CryptoFailure | ErrorKind::PolicyViolation => {
                ServiceError::new(ErrorCode::CeremonyFailed, "Ceremony failed")
            }
        }
    }
}

impl From<CeremonyError> for ServiceError {
    fn from(error: CeremonyError) -> Self {
        Self::from(&error)
    }
}

impl From<OptionsError> for ServiceError {
    fn from(error: OptionsError) -> Self {
        ServiceError::new(ErrorCode::InvalidRequest, error.to_string())
    }
}
