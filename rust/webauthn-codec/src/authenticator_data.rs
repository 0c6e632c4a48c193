//! Authenticator data decoding.
//!
//! Layout:
//!
//! ```text
//! rpIdHash (32) | flags (1) | signCount (4, big-endian)
//!   [ aaguid (16) | credentialIdLength (2) | credentialId | COSE_Key ]   if AT
//!   [ extensions CBOR map ]                                              if ED
//! ```

use crate::{CodecError, CoseKey, cbor};
use ciborium::Value;
use std::fmt;

const HEADER_LEN: usize = 37;
const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// Authenticator data flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    /// User present.
    pub const UP: u8 = 0x01;
    /// User verified.
    pub const UV: u8 = 0x04;
    /// Backup eligible.
    pub const BE: u8 = 0x08;
    /// Backup state.
    pub const BS: u8 = 0x10;
    /// Attested credential data included.
    pub const AT: u8 = 0x40;
    /// Extension data included.
    pub const ED: u8 = 0x80;

    /// Wrap a raw flag byte.
    #[must_use]
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw flag byte.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the user was present.
    #[must_use]
    pub const fn user_present(self) -> bool {
        self.0 & Self::UP != 0
    }

    /// Whether the user was verified.
    #[must_use]
    pub const fn user_verified(self) -> bool {
        self.0 & Self::UV != 0
    }

    /// Whether the credential may be backed up.
    #[must_use]
    pub const fn backup_eligible(self) -> bool {
        self.0 & Self::BE != 0
    }

    /// Whether the credential is currently backed up.
    #[must_use]
    pub const fn backed_up(self) -> bool {
        self.0 & Self::BS != 0
    }

    /// Whether attested credential data follows the header.
    #[must_use]
    pub const fn attested_credential_data(self) -> bool {
        self.0 & Self::AT != 0
    }

    /// Whether an extensions map ends the structure.
    #[must_use]
    pub const fn extension_data(self) -> bool {
        self.0 & Self::ED != 0
    }
}

/// Authenticator model identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Aaguid(pub [u8; 16]);

impl Aaguid {
    /// The all-zero AAGUID reported by authenticators that do not identify
    /// their model.
    pub const ZERO: Self = Self([0u8; 16]);

    /// The raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, byte) in self.0.iter().enumerate() {
            if matches!(index, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aaguid({self})")
    }
}

/// The newly created credential carried by registration authenticator data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    /// Authenticator model.
    pub aaguid: Aaguid,
    /// Credential ID.
    pub credential_id: Vec<u8>,
    /// Decoded credential public key.
    pub credential_public_key: CoseKey,
    /// The credential public key exactly as encoded by the authenticator.
    pub credential_public_key_bytes: Vec<u8>,
}

/// Decoded authenticator data.
///
/// The original bytes are kept because signatures are computed over them,
/// not over any re-encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    raw: Vec<u8>,
    rp_id_hash: [u8; 32],
    flags: AuthenticatorFlags,
    counter: u32,
    attested_credential_data: Option<AttestedCredentialData>,
    extensions: Option<Value>,
}

impl AuthenticatorData {
    /// Decode authenticator data.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedAuthenticatorData`] if the input is
    /// shorter than 37 bytes, if a declared length overruns the buffer, if
    /// the attested credential data or extensions announced by the flags
    /// cannot be decoded, or if bytes remain after everything the flags
    /// announce. A credential key of an unsupported type is reported as
    /// [`CodecError::UnsupportedCoseKeyType`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(malformed(format!(
                "expected at least {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&bytes[..32]);
        let flags = AuthenticatorFlags::new(bytes[32]);
        let counter = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

        let mut rest = &bytes[HEADER_LEN..];

        let attested_credential_data = if flags.attested_credential_data() {
            let (data, consumed) = attested_credential_data(rest)?;
            rest = &rest[consumed..];
            Some(data)
        } else {
            None
        };

        let extensions = if flags.extension_data() {
            let (value, consumed) = cbor::decode_prefix(rest)
                .map_err(|error| malformed(format!("extensions: {error}")))?;
            if !matches!(value, Value::Map(_)) {
                return Err(malformed("extensions are not a CBOR map"));
            }
            rest = &rest[consumed..];
            Some(value)
        } else {
            None
        };

        if !rest.is_empty() {
            return Err(malformed(format!("{} trailing bytes", rest.len())));
        }

        Ok(Self {
            raw: bytes.to_vec(),
            rp_id_hash,
            flags,
            counter,
            attested_credential_data,
            extensions,
        })
    }

    /// The bytes this was decoded from.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// SHA-256 of the RP ID the authenticator scoped the credential to.
    #[must_use]
    pub const fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    /// The flag byte.
    #[must_use]
    pub const fn flags(&self) -> AuthenticatorFlags {
        self.flags
    }

    /// The signature counter.
    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// The attested credential, present when the `AT` flag is set.
    #[must_use]
    pub const fn attested_credential_data(&self) -> Option<&AttestedCredentialData> {
        self.attested_credential_data.as_ref()
    }

    /// Authenticator extension outputs, present when the `ED` flag is set.
    #[must_use]
    pub const fn extensions(&self) -> Option<&Value> {
        self.extensions.as_ref()
    }
}

fn attested_credential_data(bytes: &[u8]) -> Result<(AttestedCredentialData, usize), CodecError> {
    if bytes.len() < 18 {
        return Err(malformed("attested credential data is truncated"));
    }

    let mut aaguid = [0u8; 16];
    aaguid.copy_from_slice(&bytes[..16]);
    let id_len = usize::from(u16::from_be_bytes([bytes[16], bytes[17]]));
    if id_len > MAX_CREDENTIAL_ID_LEN {
        return Err(malformed(format!("credential ID length {id_len} exceeds {MAX_CREDENTIAL_ID_LEN}")));
    }

    let key_start = 18 + id_len;
    if bytes.len() < key_start {
        return Err(malformed(format!(
            "credential ID length {id_len} overruns the buffer"
        )));
    }
    let credential_id = bytes[18..key_start].to_vec();

    let (credential_public_key, key_len) =
        CoseKey::decode_prefix(&bytes[key_start..]).map_err(|error| match error {
            CodecError::MalformedCoseKey(reason) => malformed(format!("credential public key: {reason}")),
            other => other,
        })?;
    let end = key_start + key_len;

    Ok((
        AttestedCredentialData {
            aaguid: Aaguid(aaguid),
            credential_id,
            credential_public_key,
            credential_public_key_bytes: bytes[key_start..end].to_vec(),
        },
        end,
    ))
}

fn malformed(message: impl Into<String>) -> CodecError {
    CodecError::MalformedAuthenticatorData(message.into())
}
