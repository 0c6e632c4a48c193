//! COSE_Key decoding for credential public keys.
//!
//! Only the key types that WebAuthn authenticators emit are understood:
//! EC2 keys on the NIST curves, RSA keys and Ed25519 OKP keys. Elliptic
//! curve points are checked to lie on their curve and RSA parameters must
//! form a valid public key, so a decoded [`CoseKey`] always names a usable
//! public key.

use crate::{CodecError, CoseAlgorithm, cbor};
use ciborium::Value;
use rsa::BigUint;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;

const LABEL_KTY: i128 = 1;
const LABEL_ALG: i128 = 3;
const LABEL_CRV: i128 = -1;
const LABEL_X: i128 = -2;
const LABEL_Y: i128 = -3;
const LABEL_N: i128 = -1;
const LABEL_E: i128 = -2;

const KTY_OKP: i128 = 1;
const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;

/// NIST elliptic curves usable with EC2 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// secp256r1
    P256,
    /// secp384r1
    P384,
    /// secp521r1
    P521,
}

impl EcCurve {
    /// COSE curve identifier.
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::P256 => 1,
            Self::P384 => 2,
            Self::P521 => 3,
        }
    }

    /// Length in bytes of one affine coordinate.
    #[must_use]
    pub const fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

/// Edwards curves usable with OKP keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OkpCurve {
    /// Ed25519
    Ed25519,
}

impl OkpCurve {
    /// COSE curve identifier.
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::Ed25519 => 6,
        }
    }
}

/// A decoded public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublicKey {
    /// Elliptic curve key in affine coordinates.
    Ec2 {
        /// Curve the point lies on.
        curve: EcCurve,
        /// Big-endian x coordinate.
        x: Vec<u8>,
        /// Big-endian y coordinate.
        y: Vec<u8>,
    },
    /// RSA key. Both integers are big-endian without leading zeros.
    Rsa {
        /// Modulus.
        n: Vec<u8>,
        /// Public exponent.
        e: Vec<u8>,
    },
    /// Octet key pair.
    Okp {
        /// Curve the key belongs to.
        curve: OkpCurve,
        /// Encoded public key.
        x: Vec<u8>,
    },
}

impl PublicKey {
    /// Short name of the key type, for diagnostics.
    #[must_use]
    pub const fn key_type(&self) -> &'static str {
        match self {
            Self::Ec2 { curve: EcCurve::P256, .. } => "EC2 P-256",
            Self::Ec2 { curve: EcCurve::P384, .. } => "EC2 P-384",
            Self::Ec2 { curve: EcCurve::P521, .. } => "EC2 P-521",
            Self::Rsa { .. } => "RSA",
            Self::Okp { .. } => "OKP Ed25519",
        }
    }

    /// Build an EC2 key from a SEC1 encoded point, compressed or not.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedCoseKey`] if the point is not on
    /// `curve`.
    pub fn from_sec1(curve: EcCurve, bytes: &[u8]) -> Result<Self, CodecError> {
        let uncompressed = match curve {
            EcCurve::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(|key| key.to_encoded_point(false).as_bytes().to_vec()),
            EcCurve::P384 => p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(|key| key.to_encoded_point(false).as_bytes().to_vec()),
            EcCurve::P521 => p521::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(|key| key.to_encoded_point(false).as_bytes().to_vec()),
        }
        .map_err(|_| CodecError::MalformedCoseKey("point is not on the curve".into()))?;

        let len = curve.coordinate_len();
        Ok(Self::Ec2 {
            curve,
            x: uncompressed[1..1 + len].to_vec(),
            y: uncompressed[1 + len..].to_vec(),
        })
    }

    /// Build an RSA key from a PKCS#1 `RSAPublicKey` DER structure.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedCoseKey`] if the DER does not decode
    /// to a usable key.
    pub fn from_rsa_pkcs1(der: &[u8]) -> Result<Self, CodecError> {
        let key = rsa::RsaPublicKey::from_pkcs1_der(der)
            .map_err(|error| CodecError::MalformedCoseKey(error.to_string()))?;
        Self::rsa(&key.n().to_bytes_be(), &key.e().to_bytes_be())
    }

    /// Build an RSA key from big-endian integers.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedCoseKey`] if the modulus and exponent
    /// do not form a valid RSA public key.
    pub fn rsa(n: &[u8], e: &[u8]) -> Result<Self, CodecError> {
        let n = strip_leading_zeros(n);
        let e = strip_leading_zeros(e);
        if n.is_empty() || e.is_empty() {
            return Err(malformed("RSA modulus and exponent must be non-zero"));
        }
        rsa::RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
            .map_err(|error| malformed(format!("unusable RSA key: {error}")))?;
        Ok(Self::Rsa {
            n: n.to_vec(),
            e: e.to_vec(),
        })
    }

    /// Build an Ed25519 key from its 32-byte encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedCoseKey`] if the bytes are not a valid
    /// Ed25519 point.
    pub fn ed25519(bytes: &[u8]) -> Result<Self, CodecError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CodecError::MalformedCoseKey("Ed25519 key must be 32 bytes".into()))?;
        ed25519_dalek::VerifyingKey::from_bytes(&array)
            .map_err(|_| CodecError::MalformedCoseKey("invalid Ed25519 point".into()))?;
        Ok(Self::Okp {
            curve: OkpCurve::Ed25519,
            x: array.to_vec(),
        })
    }
}

/// A COSE_Key: a public key together with the algorithm it is used with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoseKey {
    /// The `alg` parameter.
    pub algorithm: CoseAlgorithm,
    /// The key material.
    pub key: PublicKey,
}

impl CoseKey {
    /// Decode a COSE_Key that spans all of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedCoseKeyType`] for key types or curves
    /// other than EC2 (P-256, P-384, P-521), RSA and OKP (Ed25519), and
    /// [`CodecError::MalformedCoseKey`] for anything structurally invalid,
    /// including trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let value = cbor::decode_exact(bytes).map_err(CodecError::MalformedCoseKey)?;
        Self::from_value(&value)
    }

    /// Decode a COSE_Key from the front of `bytes`, returning the key and
    /// the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// As for [`CoseKey::from_bytes`], except that trailing bytes are allowed.
    pub fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let (value, consumed) = cbor::decode_prefix(bytes).map_err(CodecError::MalformedCoseKey)?;
        Ok((Self::from_value(&value)?, consumed))
    }

    /// Encode this key as a COSE_Key map.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedCoseKey`] if CBOR encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let algorithm = (Value::from(LABEL_ALG as i64), Value::from(self.algorithm.id()));
        let entries = match &self.key {
            PublicKey::Ec2 { curve, x, y } => vec![
                (Value::from(LABEL_KTY as i64), Value::from(KTY_EC2 as i64)),
                algorithm,
                (Value::from(LABEL_CRV as i64), Value::from(curve.id())),
                (Value::from(LABEL_X as i64), Value::Bytes(x.clone())),
                (Value::from(LABEL_Y as i64), Value::Bytes(y.clone())),
            ],
            PublicKey::Rsa { n, e } => vec![
                (Value::from(LABEL_KTY as i64), Value::from(KTY_RSA as i64)),
                algorithm,
                (Value::from(LABEL_N as i64), Value::Bytes(n.clone())),
                (Value::from(LABEL_E as i64), Value::Bytes(e.clone())),
            ],
            PublicKey::Okp { curve, x } => vec![
                (Value::from(LABEL_KTY as i64), Value::from(KTY_OKP as i64)),
                algorithm,
                (Value::from(LABEL_CRV as i64), Value::from(curve.id())),
                (Value::from(LABEL_X as i64), Value::Bytes(x.clone())),
            ],
        };
        cbor::encode(&Value::Map(entries)).map_err(CodecError::MalformedCoseKey)
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let Value::Map(map) = value else {
            return Err(malformed("COSE_Key is not a map"));
        };

        let kty = cbor::lookup(map, LABEL_KTY)
            .ok_or_else(|| malformed("missing kty"))
            .and_then(|kty| cbor::integer(kty).ok_or_else(|| malformed("kty is not an integer")))?;
        let algorithm = cbor::lookup(map, LABEL_ALG)
            .ok_or_else(|| malformed("missing alg"))
            .and_then(|alg| cbor::integer(alg).ok_or_else(|| malformed("alg is not an integer")))
            .and_then(|alg| {
                i64::try_from(alg)
                    .map(CoseAlgorithm::from_id)
                    .map_err(|_| malformed("alg out of range"))
            })?;

        let key = match kty {
            KTY_EC2 => ec2_key(map)?,
            KTY_RSA => rsa_key(map)?,
            KTY_OKP => okp_key(map)?,
            other => {
                return Err(CodecError::UnsupportedCoseKeyType(format!("kty {other}")));
            }
        };

        Ok(Self { algorithm, key })
    }
}

fn ec2_key(map: &[(Value, Value)]) -> Result<PublicKey, CodecError> {
    let curve = match curve_id(map)? {
        1 => EcCurve::P256,
        2 => EcCurve::P384,
        3 => EcCurve::P521,
        other => {
            return Err(CodecError::UnsupportedCoseKeyType(format!("EC2 curve {other}")));
        }
    };
    let x = byte_string(map, LABEL_X, "x")?;
    let y = byte_string(map, LABEL_Y, "y")?;
    let len = curve.coordinate_len();
    if x.len() != len || y.len() != len {
        return Err(malformed(format!(
            "coordinates must be {len} bytes, got {} and {}",
            x.len(),
            y.len()
        )));
    }

    let mut point = Vec::with_capacity(1 + 2 * len);
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);
    PublicKey::from_sec1(curve, &point)
}

fn rsa_key(map: &[(Value, Value)]) -> Result<PublicKey, CodecError> {
    let n = byte_string(map, LABEL_N, "n")?;
    let e = byte_string(map, LABEL_E, "e")?;
    PublicKey::rsa(n, e)
}

fn okp_key(map: &[(Value, Value)]) -> Result<PublicKey, CodecError> {
    match curve_id(map)? {
        6 => PublicKey::ed25519(byte_string(map, LABEL_X, "x")?),
        other => Err(CodecError::UnsupportedCoseKeyType(format!("OKP curve {other}"))),
    }
}

fn curve_id(map: &[(Value, Value)]) -> Result<i128, CodecError> {
    cbor::lookup(map, LABEL_CRV)
        .ok_or_else(|| malformed("missing crv"))
        .and_then(|crv| cbor::integer(crv).ok_or_else(|| malformed("crv is not an integer")))
}

fn byte_string<'a>(
    map: &'a [(Value, Value)],
    label: i128,
    name: &str,
) -> Result<&'a [u8], CodecError> {
    match cbor::lookup(map, label) {
        Some(Value::Bytes(bytes)) => Ok(bytes),
        Some(_) => Err(malformed(format!("{name} is not a byte string"))),
        None => Err(malformed(format!("missing {name}"))),
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn malformed(message: impl Into<String>) -> CodecError {
    CodecError::MalformedCoseKey(message.into())
}
