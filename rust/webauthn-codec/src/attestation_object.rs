//! Attestation object decoding.

use crate::{AuthenticatorData, CodecError, cbor};
use ciborium::Value;

/// A decoded attestation object: `{fmt, authData, attStmt}`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    /// Attestation statement format identifier.
    pub format: String,
    /// Decoded authenticator data.
    pub auth_data: AuthenticatorData,
    /// Format-specific attestation statement.
    pub statement: AttestationStatement,
}

impl AttestationObject {
    /// Decode an attestation object.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedAttestationObject`] on invalid or
    /// truncated CBOR, a missing or mistyped `fmt`, `authData` or `attStmt`,
    /// or trailing bytes. Errors decoding the embedded authenticator data
    /// are passed through.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let value = cbor::decode_exact(bytes).map_err(CodecError::MalformedAttestationObject)?;
        let Value::Map(map) = value else {
            return Err(malformed("not a CBOR map"));
        };

        let format = match cbor::lookup_text(&map, "fmt") {
            Some(Value::Text(format)) => format.clone(),
            Some(_) => return Err(malformed("fmt is not a text string")),
            None => return Err(malformed("missing fmt")),
        };
        let auth_data = match cbor::lookup_text(&map, "authData") {
            Some(Value::Bytes(auth_data)) => AuthenticatorData::from_bytes(auth_data)?,
            Some(_) => return Err(malformed("authData is not a byte string")),
            None => return Err(malformed("missing authData")),
        };
        let statement = match cbor::lookup_text(&map, "attStmt") {
            Some(Value::Map(entries)) => AttestationStatement(entries.clone()),
            Some(_) => return Err(malformed("attStmt is not a map")),
            None => return Err(malformed("missing attStmt")),
        };

        Ok(Self {
            format,
            auth_data,
            statement,
        })
    }
}

/// The `attStmt` map, with typed accessors for text-keyed entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttestationStatement(Vec<(Value, Value)>);

impl AttestationStatement {
    /// Wrap raw map entries.
    #[must_use]
    pub const fn new(entries: Vec<(Value, Value)>) -> Self {
        Self(entries)
    }

    /// Whether the statement has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw map entries.
    #[must_use]
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.0
    }

    /// The value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        cbor::lookup_text(&self.0, key)
    }

    /// The byte string under `key`, if present and a byte string.
    #[must_use]
    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        match self.get(key) {
            Some(Value::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// The integer under `key`, if present and an integer.
    #[must_use]
    pub fn integer(&self, key: &str) -> Option<i128> {
        self.get(key).and_then(cbor::integer)
    }

    /// The text string under `key`, if present and a text string.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// The array under `key`, if present and an array.
    #[must_use]
    pub fn array(&self, key: &str) -> Option<&[Value]> {
        match self.get(key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }
    }
}

fn malformed(message: &str) -> CodecError {
    CodecError::MalformedAttestationObject(message.to_owned())
}
