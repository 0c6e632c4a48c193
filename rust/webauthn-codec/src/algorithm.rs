//! COSE algorithm identifiers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;

/// A COSE signature algorithm, as registered with IANA.
///
/// Identifiers outside the supported set are preserved in
/// [`CoseAlgorithm::Unsupported`] so they can be reported and re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum CoseAlgorithm {
    /// ECDSA with P-256 and SHA-256.
    Es256,
    /// ECDSA with P-384 and SHA-384.
    Es384,
    /// ECDSA with P-521 and SHA-512.
    Es512,
    /// EdDSA, restricted to Ed25519.
    EdDsa,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    Rs512,
    /// RSASSA-PSS with SHA-256.
    Ps256,
    /// Any other identifier.
    Unsupported(i64),
}

impl CoseAlgorithm {
    /// The COSE identifier.
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::Es384 => -35,
            Self::Es512 => -36,
            Self::EdDsa => -8,
            Self::Rs256 => -257,
            Self::Rs384 => -258,
            Self::Rs512 => -259,
            Self::Ps256 => -37,
            Self::Unsupported(id) => id,
        }
    }

    /// Look up an algorithm by COSE identifier.
    #[must_use]
    pub const fn from_id(id: i64) -> Self {
        match id {
            -7 => Self::Es256,
            -35 => Self::Es384,
            -36 => Self::Es512,
            -8 => Self::EdDsa,
            -257 => Self::Rs256,
            -258 => Self::Rs384,
            -259 => Self::Rs512,
            -37 => Self::Ps256,
            other => Self::Unsupported(other),
        }
    }

    /// Hash `message` with the digest this algorithm signs over.
    ///
    /// Returns `None` for EdDSA, which hashes internally, and for
    /// unsupported identifiers.
    #[must_use]
    pub fn digest(self, message: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::Es256 | Self::Rs256 | Self::Ps256 => Some(Sha256::digest(message).to_vec()),
            Self::Es384 | Self::Rs384 => Some(Sha384::digest(message).to_vec()),
            Self::Es512 | Self::Rs512 => Some(Sha512::digest(message).to_vec()),
            Self::EdDsa | Self::Unsupported(_) => None,
        }
    }
}

impl From<i64> for CoseAlgorithm {
    fn from(id: i64) -> Self {
        Self::from_id(id)
    }
}

impl From<CoseAlgorithm> for i64 {
    fn from(algorithm: CoseAlgorithm) -> Self {
        algorithm.id()
    }
}

impl fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Es256 => f.write_str("ES256"),
            Self::Es384 => f.write_str("ES384"),
            Self::Es512 => f.write_str("ES512"),
            Self::EdDsa => f.write_str("EdDSA"),
            Self::Rs256 => f.write_str("RS256"),
            Self::Rs384 => f.write_str("RS384"),
            Self::Rs512 => f.write_str("RS512"),
            Self::Ps256 => f.write_str("PS256"),
            Self::Unsupported(id) => write!(f, "COSE({id})"),
        }
    }
}
