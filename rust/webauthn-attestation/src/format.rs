//! Attestation statement formats.

mod android_key;
mod android_safetynet;
mod fido_u2f;
mod none;
mod packed;
mod tpm;

use crate::{AttestationError, Certificate, StatementVerdict};
use std::fmt;
use tracing::debug;
use webauthn_codec::{AttestationStatement, AuthenticatorData, CoseAlgorithm, Value};

/// An attestation statement format identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttestationFormat {
    /// `none`
    None,
    /// `packed`
    Packed,
    /// `fido-u2f`
    FidoU2f,
    /// `android-key`
    AndroidKey,
    /// `android-safetynet`
    AndroidSafetyNet,
    /// `tpm`
    Tpm,
    /// Any other identifier.
    Unknown(String),
}

impl AttestationFormat {
    /// The registered identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Packed => "packed",
            Self::FidoU2f => "fido-u2f",
            Self::AndroidKey => "android-key",
            Self::AndroidSafetyNet => "android-safetynet",
            Self::Tpm => "tpm",
            Self::Unknown(format) => format,
        }
    }
}

impl From<&str> for AttestationFormat {
    fn from(format: &str) -> Self {
        match format {
            "none" => Self::None,
            "packed" => Self::Packed,
            "fido-u2f" => Self::FidoU2f,
            "android-key" => Self::AndroidKey,
            "android-safetynet" => Self::AndroidSafetyNet,
            "tpm" => Self::Tpm,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verify an attestation statement against the authenticator data and the
/// SHA-256 hash of the client data it was produced for.
///
/// This checks the statement's signature and the format's requirements on
/// its certificates. Whether the certificate chain leads to a trusted root
/// is decided separately by [`evaluate_trust`](crate::evaluate_trust).
///
/// # Errors
///
/// Returns an [`AttestationError`] describing the first requirement that is
/// not met. The `none` format and unknown formats never fail.
pub fn verify_statement(
    format: &AttestationFormat,
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<StatementVerdict, AttestationError> {
    debug!(%format, "verifying attestation statement");
    match format {
        AttestationFormat::None => Ok(none::verify(statement)),
        AttestationFormat::Packed => packed::verify(statement, auth_data, client_data_hash),
        AttestationFormat::FidoU2f => fido_u2f::verify(statement, auth_data, client_data_hash),
        AttestationFormat::AndroidKey => android_key::verify(statement, auth_data, client_data_hash),
        AttestationFormat::AndroidSafetyNet => {
            android_safetynet::verify(statement, auth_data, client_data_hash)
        }
        AttestationFormat::Tpm => tpm::verify(statement, auth_data, client_data_hash),
        AttestationFormat::Unknown(_) => Ok(StatementVerdict::uncertain()),
    }
}

fn malformed(message: impl Into<String>) -> AttestationError {
    AttestationError::MalformedAttestationStatement(message.into())
}

fn requirement(message: impl Into<String>) -> AttestationError {
    AttestationError::CertificateRequirementsNotMet(message.into())
}

fn algorithm(statement: &AttestationStatement) -> Result<CoseAlgorithm, AttestationError> {
    let alg = statement.integer("alg").ok_or_else(|| malformed("missing alg"))?;
    i64::try_from(alg)
        .map(CoseAlgorithm::from_id)
        .map_err(|_| malformed("alg out of range"))
}

fn signature(statement: &AttestationStatement) -> Result<&[u8], AttestationError> {
    statement.bytes("sig").ok_or_else(|| malformed("missing sig"))
}

/// Decode the `x5c` array, returning `None` if the statement has none.
fn certificates(statement: &AttestationStatement) -> Result<Option<Vec<Certificate>>, AttestationError> {
    let Some(value) = statement.get("x5c") else {
        return Ok(None);
    };
    let Value::Array(items) = value else {
        return Err(malformed("x5c is not an array"));
    };
    if items.is_empty() {
        return Err(malformed("x5c is empty"));
    }
    items
        .iter()
        .map(|item| match item {
            Value::Bytes(der) => Certificate::from_der(der),
            _ => Err(malformed("x5c entry is not a byte string")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// `authenticatorData || clientDataHash`
fn signed_data(auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(auth_data.as_bytes().len() + client_data_hash.len());
    message.extend_from_slice(auth_data.as_bytes());
    message.extend_from_slice(client_data_hash);
    message
}

/// Require the leaf to be an end-entity v3 certificate whose AAGUID
/// extension, if present, names the authenticator model.
fn check_leaf(leaf: &Certificate, auth_data: &AuthenticatorData) -> Result<(), AttestationError> {
    if !leaf.is_v3() {
        return Err(requirement("attestation certificate is not version 3"));
    }
    if leaf.is_ca()? {
        return Err(requirement("attestation certificate is a CA"));
    }
    if let Some(aaguid) = leaf.aaguid()? {
        let attested = auth_data
            .attested_credential_data()
            .ok_or_else(|| malformed("missing attested credential data"))?;
        if aaguid != attested.aaguid {
            return Err(requirement("certificate AAGUID does not match authenticator data"));
        }
    }
    Ok(())
}

fn verify_with(
    algorithm: CoseAlgorithm,
    certificate: &Certificate,
    message: &[u8],
    signature: &[u8],
) -> Result<(), AttestationError> {
    let key = certificate.public_key()?;
    if webauthn_codec::verify_signature(algorithm, &key, message, signature)? {
        Ok(())
    } else {
        Err(AttestationError::AttestationSignatureInvalid)
    }
}
