//! X.509 attestation certificates.

use crate::AttestationError;
use der::asn1::{AnyRef, ObjectIdentifier, OctetString};
use der::{Decode, Reader, SliceReader};
use std::fmt;
use std::time::Duration;
use webauthn_codec::{
    Aaguid, CoseAlgorithm, EcCurve, PublicKey, verify_ecdsa_any_curve, verify_signature,
};
use x509_cert::certificate::Version;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage};

const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");

/// The FIDO `id-fido-gen-ce-aaguid` extension.
pub const FIDO_AAGUID_EXTENSION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.45724.1.1.4");

/// A parsed X.509 certificate that keeps its original encoding.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    inner: x509_cert::Certificate,
}

impl Certificate {
    /// Parse a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::MalformedAttestationCertificate`] if the
    /// bytes are not a DER X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, AttestationError> {
        let inner = x509_cert::Certificate::from_der(der).map_err(malformed)?;
        Ok(Self {
            der: der.to_vec(),
            inner,
        })
    }

    /// The DER encoding this certificate was parsed from.
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The underlying parsed certificate.
    #[must_use]
    pub const fn inner(&self) -> &x509_cert::Certificate {
        &self.inner
    }

    /// Whether this is an X.509 v3 certificate.
    #[must_use]
    pub fn is_v3(&self) -> bool {
        self.inner.tbs_certificate.version == Version::V3
    }

    /// The subject in RFC 4514 form.
    #[must_use]
    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    /// Whether the subject is the empty sequence.
    #[must_use]
    pub fn has_empty_subject(&self) -> bool {
        self.inner.tbs_certificate.subject.0.is_empty()
    }

    /// Whether some relative distinguished name of the subject is exactly
    /// `CN=<name>`.
    #[must_use]
    pub fn has_common_name(&self, name: &str) -> bool {
        let expected = format!("CN={name}");
        self.inner
            .tbs_certificate
            .subject
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter())
            .any(|attribute| attribute.to_string() == expected)
    }

    /// The raw value of the extension `oid`, if present.
    #[must_use]
    pub fn extension(&self, oid: &ObjectIdentifier) -> Option<&[u8]> {
        self.inner
            .tbs_certificate
            .extensions
            .as_ref()?
            .iter()
            .find(|extension| &extension.extn_id == oid)
            .map(|extension| extension.extn_value.as_bytes())
    }

    /// Whether the basic constraints extension marks this as a CA.
    ///
    /// # Errors
    ///
    /// Fails if the extension is present but does not decode.
    pub fn is_ca(&self) -> Result<bool, AttestationError> {
        Ok(self.basic_constraints()?.is_some_and(|constraints| constraints.ca))
    }

    /// The most intermediate CA certificates that may follow this one
    /// in a path, if the basic constraints extension limits it.
    ///
    /// # Errors
    ///
    /// Fails if the extension is present but does not decode.
    pub fn path_len_constraint(&self) -> Result<Option<u8>, AttestationError> {
        Ok(self
            .basic_constraints()?
            .and_then(|constraints| constraints.path_len_constraint))
    }

    fn basic_constraints(&self) -> Result<Option<BasicConstraints>, AttestationError> {
        self.extension(&BASIC_CONSTRAINTS)
            .map(|value| BasicConstraints::from_der(value).map_err(malformed))
            .transpose()
    }

    /// The extended key usage purposes.
    ///
    /// # Errors
    ///
    /// Fails if the extension is present but does not decode.
    pub fn extended_key_usage(&self) -> Result<Vec<ObjectIdentifier>, AttestationError> {
        match self.extension(&EXTENDED_KEY_USAGE) {
            Some(value) => Ok(ExtendedKeyUsage::from_der(value).map_err(malformed)?.0),
            None => Ok(Vec::new()),
        }
    }

    /// The AAGUID from the FIDO AAGUID extension, if present.
    ///
    /// # Errors
    ///
    /// Fails if the extension is not an OCTET STRING of 16 bytes.
    pub fn aaguid(&self) -> Result<Option<Aaguid>, AttestationError> {
        let Some(value) = self.extension(&FIDO_AAGUID_EXTENSION) else {
            return Ok(None);
        };
        let octets = OctetString::from_der(value).map_err(malformed)?;
        let bytes: [u8; 16] = octets
            .as_bytes()
            .try_into()
            .map_err(|_| AttestationError::MalformedAttestationCertificate(
                "AAGUID extension is not 16 bytes".into(),
            ))?;
        Ok(Some(Aaguid(bytes)))
    }

    /// The subject public key.
    ///
    /// # Errors
    ///
    /// Fails if the key algorithm is not EC (P-256, P-384, P-521), RSA or
    /// Ed25519, or the key bits do not decode.
    pub fn public_key(&self) -> Result<PublicKey, AttestationError> {
        let info = &self.inner.tbs_certificate.subject_public_key_info;
        let bits = info.subject_public_key.raw_bytes();
        let oid = info.algorithm.oid;
        let key = if oid == EC_PUBLIC_KEY {
            let curve = info
                .algorithm
                .parameters
                .as_ref()
                .and_then(|parameters| parameters.decode_as::<ObjectIdentifier>().ok())
                .ok_or_else(|| malformed_message("EC key without a named curve"))?;
            let curve = if curve == SECP256R1 {
                EcCurve::P256
            } else if curve == SECP384R1 {
                EcCurve::P384
            } else if curve == SECP521R1 {
                EcCurve::P521
            } else {
                return Err(malformed_message(format!("unsupported curve {curve}")));
            };
            PublicKey::from_sec1(curve, bits)
        } else if oid == RSA_ENCRYPTION {
            PublicKey::from_rsa_pkcs1(bits)
        } else if oid == ED25519 {
            PublicKey::ed25519(bits)
        } else {
            return Err(malformed_message(format!("unsupported key algorithm {oid}")));
        };
        key.map_err(malformed)
    }

    /// Whether the certificate is within its validity window at `now`,
    /// measured from the Unix epoch.
    #[must_use]
    pub fn is_valid_at(&self, now: Duration) -> bool {
        let validity = &self.inner.tbs_certificate.validity;
        validity.not_before.to_unix_duration() <= now && now <= validity.not_after.to_unix_duration()
    }

    /// Whether `issuer` names and signs this certificate.
    ///
    /// The signature is checked over the to-be-signed bytes exactly as they
    /// were received. Signatures made with algorithms other than ECDSA,
    /// RSA PKCS#1 v1.5 (SHA-2) and Ed25519 never verify. Whether `issuer`
    /// may act as a CA is not checked here.
    #[must_use]
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        if self.inner.tbs_certificate.issuer != issuer.inner.tbs_certificate.subject {
            return false;
        }
        let Some(algorithm) = signature_algorithm(&self.inner.signature_algorithm.oid) else {
            return false;
        };
        let Ok(key) = issuer.public_key() else {
            return false;
        };
        let Ok(tbs) = self.tbs_der() else {
            return false;
        };
        let Some(signature) = self.inner.signature.as_bytes() else {
            return false;
        };
        let verified = match algorithm {
            CoseAlgorithm::Es256 | CoseAlgorithm::Es384 | CoseAlgorithm::Es512 => {
                verify_ecdsa_any_curve(algorithm, &key, tbs, signature)
            }
            _ => verify_signature(algorithm, &key, tbs, signature),
        };
        matches!(verified, Ok(true))
    }

    /// The `tbsCertificate` element as it appears in the original encoding.
    fn tbs_der(&self) -> der::Result<&[u8]> {
        let certificate = AnyRef::from_der(&self.der)?;
        SliceReader::new(certificate.value())?.tlv_bytes()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .field("issuer", &self.inner.tbs_certificate.issuer.to_string())
            .finish()
    }
}

// ECDSA entries name only the digest; the curve comes from the issuer key.
fn signature_algorithm(oid: &ObjectIdentifier) -> Option<CoseAlgorithm> {
    [
        (ECDSA_WITH_SHA256, CoseAlgorithm::Es256),
        (ECDSA_WITH_SHA384, CoseAlgorithm::Es384),
        (ECDSA_WITH_SHA512, CoseAlgorithm::Es512),
        (SHA256_WITH_RSA, CoseAlgorithm::Rs256),
        (SHA384_WITH_RSA, CoseAlgorithm::Rs384),
        (SHA512_WITH_RSA, CoseAlgorithm::Rs512),
        (ED25519, CoseAlgorithm::EdDsa),
    ]
    .into_iter()
    .find(|(known, _)| known == oid)
    .map(|(_, algorithm)| algorithm)
}

fn malformed(error: impl fmt::Display) -> AttestationError {
    AttestationError::MalformedAttestationCertificate(error.to_string())
}

fn malformed_message(message: impl Into<String>) -> AttestationError {
    AttestationError::MalformedAttestationCertificate(message.into())
}
