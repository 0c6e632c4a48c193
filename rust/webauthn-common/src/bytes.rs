//! Byte array newtype for WebAuthn wire serialization.
//!
//! This module provides a [`ByteArray`] type that wraps `Vec<u8>` and
//! serializes as a base64url string in human-readable formats (JSON), and as
//! a plain byte string everywhere else.

use crate::base64url;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// A newtype wrapper around `Vec<u8>` carrying binary WebAuthn fields.
///
/// Challenges, credential IDs, user handles, signatures and the like are
/// exchanged with the browser as base64url strings. `ByteArray` takes care
/// of that encoding so the option and response structures can derive their
/// serde implementations.
///
/// # Example
///
/// ```rust
/// use webauthn_common::ByteArray;
///
/// let bytes = ByteArray::from(vec![1, 2, 3]);
/// assert_eq!(bytes.as_slice(), &[1, 2, 3]);
/// assert_eq!(bytes.to_base64url(), "AQID");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteArray(Vec<u8>);

impl ByteArray {
    /// Create a new empty `ByteArray`.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a `ByteArray` from a slice.
    pub fn from_slice(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }

    /// Decode a `ByteArray` from base64url text (padding optional).
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid base64url.
    pub fn from_base64url(text: &str) -> Result<Self, base64url::DecodeError> {
        base64url::decode(text).map(Self)
    }

    /// Encode as unpadded base64url.
    pub fn to_base64url(&self) -> String {
        base64url::encode(&self.0)
    }

    /// Get the inner bytes as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Convert into the inner `Vec<u8>`.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Get the length of the bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the bytes are empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteArray({})", self.to_base64url())
    }
}

impl fmt::Display for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl Deref for ByteArray {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for ByteArray {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ByteArray {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(vec: Vec<u8>) -> Self {
        Self(vec)
    }
}

impl From<ByteArray> for Vec<u8> {
    fn from(bytes: ByteArray) -> Self {
        bytes.0
    }
}

impl From<&[u8]> for ByteArray {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for ByteArray {
    fn from(array: [u8; N]) -> Self {
        Self(array.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for ByteArray {
    fn from(array: &[u8; N]) -> Self {
        Self(array.to_vec())
    }
}

impl Serialize for ByteArray {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base64url())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for ByteArray {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ByteArrayVisitor;

        impl<'de> serde::de::Visitor<'de> for ByteArrayVisitor {
            type Value = ByteArray;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a base64url string or a byte array")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                ByteArray::from_base64url(v).map_err(E::custom)
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteArray(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteArray(v))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(ByteArrayVisitor)
        } else {
            deserializer.deserialize_byte_buf(ByteArrayVisitor)
        }
    }
}
