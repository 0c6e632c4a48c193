//! TPM 2.0 attestation.
//!
//! The statement carries a `TPMT_PUBLIC` (`pubArea`) describing the
//! credential key and a `TPMS_ATTEST` (`certInfo`) in which the TPM's
//! attestation identity key certifies that public area. Both are big-endian
//! TPM wire structures with `u16` length-prefixed byte strings.

use super::{
    algorithm, certificates, check_leaf, malformed, requirement, signature, signed_data,
    verify_with,
};
use crate::{AttestationError, StatementVerdict};
use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use webauthn_codec::{AttestationStatement, AuthenticatorData, EcCurve, PublicKey};

const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

const TPM_ALG_RSA: u16 = 0x0001;
const TPM_ALG_SHA256: u16 = 0x000b;
const TPM_ALG_SHA384: u16 = 0x000c;
const TPM_ALG_SHA512: u16 = 0x000d;
const TPM_ALG_NULL: u16 = 0x0010;
const TPM_ALG_ECC: u16 = 0x0023;

const TPM_ECC_NIST_P256: u16 = 0x0003;
const TPM_ECC_NIST_P384: u16 = 0x0004;
const TPM_ECC_NIST_P521: u16 = 0x0005;

/// `tcg-kp-AIKCertificate`
const AIK_CERTIFICATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.23.133.8.3");

pub(super) fn verify(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<StatementVerdict, AttestationError> {
    if statement.text("ver") != Some("2.0") {
        return Err(malformed("ver must be \"2.0\""));
    }
    let algorithm = algorithm(statement)?;
    let signature = signature(statement)?;
    let trust_path = certificates(statement)?.ok_or_else(|| malformed("missing x5c"))?;
    let cert_info = statement
        .bytes("certInfo")
        .ok_or_else(|| malformed("missing certInfo"))?;
    let pub_area = statement
        .bytes("pubArea")
        .ok_or_else(|| malformed("missing pubArea"))?;

    let public = PublicArea::parse(pub_area)?;
    let credential = auth_data
        .attested_credential_data()
        .ok_or_else(|| malformed("missing attested credential data"))?;
    if public.key != credential.credential_public_key.key {
        return Err(AttestationError::PublicKeyMismatch);
    }

    let attest = CertifyInfo::parse(cert_info)?;
    if attest.magic != TPM_GENERATED_VALUE {
        return Err(malformed("certInfo magic is not TPM_GENERATED_VALUE"));
    }
    if attest.kind != TPM_ST_ATTEST_CERTIFY {
        return Err(malformed("certInfo type is not TPM_ST_ATTEST_CERTIFY"));
    }
    let expected_extra_data = algorithm
        .digest(&signed_data(auth_data, client_data_hash))
        .ok_or_else(|| malformed(format!("alg {algorithm} has no digest")))?;
    if attest.extra_data != expected_extra_data {
        return Err(malformed("certInfo extraData does not match authenticator and client data"));
    }
    if attest.attested_name != name(public.name_algorithm, pub_area)? {
        return Err(malformed("certInfo does not certify pubArea"));
    }

    let aik = &trust_path[0];
    verify_with(algorithm, aik, cert_info, signature)?;
    check_leaf(aik, auth_data)?;
    if !aik.has_empty_subject() {
        return Err(requirement("AIK certificate subject is not empty"));
    }
    if !aik.extended_key_usage()?.contains(&AIK_CERTIFICATE) {
        return Err(requirement("AIK certificate lacks the tcg-kp-AIKCertificate purpose"));
    }

    Ok(StatementVerdict::basic(trust_path))
}

/// `nameAlg || H_nameAlg(pubArea)`
fn name(name_algorithm: u16, pub_area: &[u8]) -> Result<Vec<u8>, AttestationError> {
    let digest = match name_algorithm {
        TPM_ALG_SHA256 => Sha256::digest(pub_area).to_vec(),
        TPM_ALG_SHA384 => Sha384::digest(pub_area).to_vec(),
        TPM_ALG_SHA512 => Sha512::digest(pub_area).to_vec(),
        other => return Err(malformed(format!("unsupported nameAlg {other:#06x}"))),
    };
    let mut name = name_algorithm.to_be_bytes().to_vec();
    name.extend_from_slice(&digest);
    Ok(name)
}

struct PublicArea {
    name_algorithm: u16,
    key: PublicKey,
}

impl PublicArea {
    fn parse(bytes: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = TpmReader::new(bytes, "pubArea");
        let kind = reader.u16()?;
        let name_algorithm = reader.u16()?;
        let _object_attributes = reader.u32()?;
        let _auth_policy = reader.sized()?;

        let key = match kind {
            TPM_ALG_RSA => {
                reader.symmetric()?;
                reader.scheme()?;
                let _key_bits = reader.u16()?;
                let exponent = match reader.u32()? {
                    0 => 65537,
                    exponent => exponent,
                };
                let modulus = reader.sized()?;
                PublicKey::rsa(modulus, &exponent.to_be_bytes())
                    .map_err(|_| malformed("pubArea RSA key is unusable"))?
            }
            TPM_ALG_ECC => {
                reader.symmetric()?;
                reader.scheme()?;
                let curve = match reader.u16()? {
                    TPM_ECC_NIST_P256 => EcCurve::P256,
                    TPM_ECC_NIST_P384 => EcCurve::P384,
                    TPM_ECC_NIST_P521 => EcCurve::P521,
                    other => return Err(malformed(format!("unsupported TPM curve {other:#06x}"))),
                };
                // kdf
                reader.scheme()?;
                let x = reader.sized()?;
                let y = reader.sized()?;
                let mut point = Vec::with_capacity(1 + x.len() + y.len());
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                PublicKey::from_sec1(curve, &point)
                    .map_err(|_| malformed("pubArea ECC point is not on its curve"))?
            }
            other => return Err(malformed(format!("unsupported pubArea type {other:#06x}"))),
        };
        reader.finish()?;

        Ok(Self {
            name_algorithm,
            key,
        })
    }
}

struct CertifyInfo {
    magic: u32,
    kind: u16,
    extra_data: Vec<u8>,
    attested_name: Vec<u8>,
}

impl CertifyInfo {
    fn parse(bytes: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = TpmReader::new(bytes, "certInfo");
        let magic = reader.u32()?;
        let kind = reader.u16()?;
        let _qualified_signer = reader.sized()?;
        let extra_data = reader.sized()?.to_vec();
        // clockInfo: clock, resetCount, restartCount, safe
        reader.take(17)?;
        let _firmware_version = reader.take(8)?;
        let attested_name = reader.sized()?.to_vec();
        let _qualified_name = reader.sized()?;
        reader.finish()?;

        Ok(Self {
            magic,
            kind,
            extra_data,
            attested_name,
        })
    }
}

struct TpmReader<'a> {
    bytes: &'a [u8],
    structure: &'static str,
}

impl<'a> TpmReader<'a> {
    fn new(bytes: &'a [u8], structure: &'static str) -> Self {
        Self { bytes, structure }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], AttestationError> {
        if self.bytes.len() < len {
            return Err(malformed(format!("{} is truncated", self.structure)));
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    fn u16(&mut self) -> Result<u16, AttestationError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, AttestationError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// A `TPM2B_*` byte string.
    fn sized(&mut self) -> Result<&'a [u8], AttestationError> {
        let len = usize::from(self.u16()?);
        self.take(len)
    }

    /// A `TPMT_SYM_DEF_OBJECT`: an algorithm, then key bits and mode unless
    /// it is `TPM_ALG_NULL`.
    fn symmetric(&mut self) -> Result<(), AttestationError> {
        if self.u16()? != TPM_ALG_NULL {
            self.take(4)?;
        }
        Ok(())
    }

    /// A signing or KDF scheme: an algorithm, then a hash algorithm unless
    /// it is `TPM_ALG_NULL`.
    fn scheme(&mut self) -> Result<(), AttestationError> {
        if self.u16()? != TPM_ALG_NULL {
            self.take(2)?;
        }
        Ok(())
    }

    fn finish(&self) -> Result<(), AttestationError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(malformed(format!("{} has trailing bytes", self.structure)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(bytes: &[u8]) -> Vec<u8> {
        let mut out = (bytes.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(bytes);
        out
    }

    fn rsa_pub_area(modulus: &[u8], exponent: u32) -> Vec<u8> {
        let mut area = Vec::new();
        area.extend_from_slice(&TPM_ALG_RSA.to_be_bytes());
        area.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes());
        area.extend_from_slice(&0x0006_0472u32.to_be_bytes());
        area.extend(sized(&[]));
        area.extend_from_slice(&TPM_ALG_NULL.to_be_bytes());
        area.extend_from_slice(&TPM_ALG_NULL.to_be_bytes());
        area.extend_from_slice(&2048u16.to_be_bytes());
        area.extend_from_slice(&exponent.to_be_bytes());
        area.extend(sized(modulus));
        area
    }

    #[test]
    fn it_parses_an_rsa_public_area_with_default_exponent() {
        let modulus = [0xc5u8; 256];
        let area = PublicArea::parse(&rsa_pub_area(&modulus, 0)).unwrap();
        assert_eq!(area.name_algorithm, TPM_ALG_SHA256);
        assert_eq!(area.key, PublicKey::rsa(&modulus, &[0x01, 0x00, 0x01]).unwrap());
    }

    #[test]
    fn it_rejects_an_unusable_rsa_public_area() {
        assert!(matches!(
            PublicArea::parse(&rsa_pub_area(&[0xc4u8; 256], 1)),
            Err(AttestationError::MalformedAttestationStatement(_))
        ));
    }

    #[test]
    fn it_rejects_trailing_bytes_in_public_area() {
        let mut bytes = rsa_pub_area(&[0xc5u8; 256], 3);
        bytes.push(0);
        assert!(matches!(
            PublicArea::parse(&bytes),
            Err(AttestationError::MalformedAttestationStatement(_))
        ));
    }

    #[test]
    fn names_are_prefixed_with_the_algorithm() {
        let name = name(TPM_ALG_SHA256, b"area").unwrap();
        assert_eq!(&name[..2], &[0x00, 0x0b]);
        assert_eq!(&name[2..], Sha256::digest(b"area").as_slice());
        assert!(super::name(0x0004, b"area").is_err());
    }
}
