//! Algorithm-dispatching signature verification.
//!
//! Verification distinguishes three outcomes:
//!
//! - `Ok(true)`: the signature is valid for the message.
//! - `Ok(false)`: the signature is wrong, including signature bytes that do
//!   not even parse.
//! - `Err(_)`: verification could not be attempted, because the algorithm
//!   is unsupported, does not fit the key, or the key is unusable.

use crate::{CoseAlgorithm, CoseKey, EcCurve, OkpCurve, PublicKey, SignatureError};
use rsa::{BigUint, RsaPublicKey, pkcs1v15, pss};
use sha2::{Sha256, Sha384, Sha512};
use signature::Verifier;
use signature::hazmat::PrehashVerifier;

/// Verify `signature` over `message` with `public_key` under `algorithm`.
///
/// ECDSA signatures are expected in ASN.1 DER form, as WebAuthn
/// authenticators produce them.
///
/// # Errors
///
/// - [`SignatureError::UnsupportedAlgorithm`] for [`CoseAlgorithm::Unsupported`].
/// - [`SignatureError::AlgorithmKeyMismatch`] if the key type or curve does
///   not fit the algorithm.
/// - [`SignatureError::InvalidKey`] if the key cannot be materialized.
pub fn verify_signature(
    algorithm: CoseAlgorithm,
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, SignatureError> {
    match (algorithm, public_key) {
        (CoseAlgorithm::Es256, PublicKey::Ec2 { curve: EcCurve::P256, .. }) => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1(public_key))
                .map_err(|_| SignatureError::InvalidKey)?;
            Ok(p256::ecdsa::Signature::from_der(signature)
                .is_ok_and(|signature| key.verify(message, &signature).is_ok()))
        }
        (CoseAlgorithm::Es384, PublicKey::Ec2 { curve: EcCurve::P384, .. }) => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1(public_key))
                .map_err(|_| SignatureError::InvalidKey)?;
            Ok(p384::ecdsa::Signature::from_der(signature)
                .is_ok_and(|signature| key.verify(message, &signature).is_ok()))
        }
        (CoseAlgorithm::Es512, PublicKey::Ec2 { curve: EcCurve::P521, .. }) => {
            let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1(public_key))
                .map_err(|_| SignatureError::InvalidKey)?;
            Ok(p521::ecdsa::Signature::from_der(signature)
                .is_ok_and(|signature| key.verify(message, &signature).is_ok()))
        }
        (CoseAlgorithm::EdDsa, PublicKey::Okp { curve: OkpCurve::Ed25519, x }) => {
            let bytes: &[u8; 32] = x
                .as_slice()
                .try_into()
                .map_err(|_| SignatureError::InvalidKey)?;
            let key = ed25519_dalek::VerifyingKey::from_bytes(bytes)
                .map_err(|_| SignatureError::InvalidKey)?;
            Ok(ed25519_dalek::Signature::from_slice(signature)
                .is_ok_and(|signature| key.verify(message, &signature).is_ok()))
        }
        (CoseAlgorithm::Rs256, PublicKey::Rsa { n, e }) => {
            let key = pkcs1v15::VerifyingKey::<Sha256>::new(rsa_key(n, e)?);
            Ok(pkcs1v15_verify(&key, message, signature))
        }
        (CoseAlgorithm::Rs384, PublicKey::Rsa { n, e }) => {
            let key = pkcs1v15::VerifyingKey::<Sha384>::new(rsa_key(n, e)?);
            Ok(pkcs1v15_verify(&key, message, signature))
        }
        (CoseAlgorithm::Rs512, PublicKey::Rsa { n, e }) => {
            let key = pkcs1v15::VerifyingKey::<Sha512>::new(rsa_key(n, e)?);
            Ok(pkcs1v15_verify(&key, message, signature))
        }
        (CoseAlgorithm::Ps256, PublicKey::Rsa { n, e }) => {
            let key = pss::VerifyingKey::<Sha256>::new(rsa_key(n, e)?);
            Ok(pss::Signature::try_from(signature)
                .is_ok_and(|signature| key.verify(message, &signature).is_ok()))
        }
        (CoseAlgorithm::Unsupported(_), _) => Err(SignatureError::UnsupportedAlgorithm(algorithm)),
        (_, key) => Err(SignatureError::AlgorithmKeyMismatch {
            algorithm,
            key_type: key.key_type(),
        }),
    }
}

/// Verify an ECDSA `signature` over `message` hashed with the digest of
/// `algorithm`, on whichever curve `public_key` lies.
///
/// X.509 certificates pair any SHA-2 digest with any curve, so unlike
/// [`verify_signature`] the digest and the curve need not match.
///
/// # Errors
///
/// - [`SignatureError::UnsupportedAlgorithm`] if `algorithm` is not ECDSA.
/// - [`SignatureError::AlgorithmKeyMismatch`] if the key is not an EC2 key.
/// - [`SignatureError::InvalidKey`] if the key cannot be materialized.
pub fn verify_ecdsa_any_curve(
    algorithm: CoseAlgorithm,
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, SignatureError> {
    let digest = match algorithm {
        CoseAlgorithm::Es256 | CoseAlgorithm::Es384 | CoseAlgorithm::Es512 => {
            algorithm.digest(message).unwrap_or_default()
        }
        _ => return Err(SignatureError::UnsupportedAlgorithm(algorithm)),
    };
    match public_key {
        PublicKey::Ec2 { curve: EcCurve::P256, .. } => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1(public_key))
                .map_err(|_| SignatureError::InvalidKey)?;
            Ok(p256::ecdsa::Signature::from_der(signature)
                .is_ok_and(|signature| key.verify_prehash(&digest, &signature).is_ok()))
        }
        PublicKey::Ec2 { curve: EcCurve::P384, .. } => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1(public_key))
                .map_err(|_| SignatureError::InvalidKey)?;
            Ok(p384::ecdsa::Signature::from_der(signature)
                .is_ok_and(|signature| key.verify_prehash(&digest, &signature).is_ok()))
        }
        PublicKey::Ec2 { curve: EcCurve::P521, .. } => {
            let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1(public_key))
                .map_err(|_| SignatureError::InvalidKey)?;
            Ok(p521::ecdsa::Signature::from_der(signature)
                .is_ok_and(|signature| key.verify_prehash(&digest, &signature).is_ok()))
        }
        key => Err(SignatureError::AlgorithmKeyMismatch {
            algorithm,
            key_type: key.key_type(),
        }),
    }
}

impl CoseKey {
    /// Verify `signature` over `message` with this key and its own
    /// algorithm.
    ///
    /// # Errors
    ///
    /// See [`verify_signature`].
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, SignatureError> {
        verify_signature(self.algorithm, &self.key, message, signature)
    }
}

fn sec1(key: &PublicKey) -> Vec<u8> {
    match key {
        PublicKey::Ec2 { x, y, .. } => {
            let mut point = Vec::with_capacity(1 + x.len() + y.len());
            point.push(0x04);
            point.extend_from_slice(x);
            point.extend_from_slice(y);
            point
        }
        _ => Vec::new(),
    }
}

fn rsa_key(n: &[u8], e: &[u8]) -> Result<RsaPublicKey, SignatureError> {
    RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
        .map_err(|_| SignatureError::InvalidKey)
}

fn pkcs1v15_verify<D>(key: &pkcs1v15::VerifyingKey<D>, message: &[u8], signature: &[u8]) -> bool
where
    D: sha2::Digest,
{
    pkcs1v15::Signature::try_from(signature)
        .is_ok_and(|signature| key.verify(message, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rsa::traits::PublicKeyParts;
    use signature::hazmat::PrehashSigner;
    use signature::{RandomizedSigner, Signer};
    use webauthn_common::helpers::SoftAuthenticator;

    fn es256_key(authenticator: &SoftAuthenticator) -> PublicKey {
        CoseKey::from_bytes(&authenticator.cose_public_key())
            .unwrap()
            .key
    }

    #[test]
    fn it_verifies_es256() {
        let authenticator = SoftAuthenticator::new(1);
        let signature = authenticator.sign(b"message");
        let key = es256_key(&authenticator);

        assert_eq!(verify_signature(CoseAlgorithm::Es256, &key, b"message", &signature), Ok(true));
        assert_eq!(verify_signature(CoseAlgorithm::Es256, &key, b"other", &signature), Ok(false));
    }

    #[test]
    fn malformed_signatures_are_false_not_errors() {
        let key = es256_key(&SoftAuthenticator::new(1));
        assert_eq!(verify_signature(CoseAlgorithm::Es256, &key, b"message", &[]), Ok(false));
        assert_eq!(
            verify_signature(CoseAlgorithm::Es256, &key, b"message", &[0x30, 0xff, 0x00]),
            Ok(false)
        );
    }

    #[test]
    fn it_rejects_algorithm_key_mismatch() {
        let key = es256_key(&SoftAuthenticator::new(1));
        assert_eq!(
            verify_signature(CoseAlgorithm::Rs256, &key, b"message", &[0u8; 256]),
            Err(SignatureError::AlgorithmKeyMismatch {
                algorithm: CoseAlgorithm::Rs256,
                key_type: "EC2 P-256",
            })
        );
        assert!(matches!(
            verify_signature(CoseAlgorithm::Es384, &key, b"message", &[]),
            Err(SignatureError::AlgorithmKeyMismatch { .. })
        ));
    }

    #[test]
    fn it_rejects_unsupported_algorithms() {
        let key = es256_key(&SoftAuthenticator::new(1));
        assert_eq!(
            verify_signature(CoseAlgorithm::Unsupported(-47), &key, b"message", &[]),
            Err(SignatureError::UnsupportedAlgorithm(CoseAlgorithm::Unsupported(-47)))
        );
    }

    #[test]
    fn it_reports_unusable_keys() {
        let key = PublicKey::Ec2 {
            curve: EcCurve::P256,
            x: vec![1u8; 32],
            y: vec![2u8; 32],
        };
        assert_eq!(
            verify_signature(CoseAlgorithm::Es256, &key, b"message", &[]),
            Err(SignatureError::InvalidKey)
        );
    }

    #[test]
    fn it_verifies_es384() {
        let signing_key = p384::ecdsa::SigningKey::random(&mut ChaCha20Rng::seed_from_u64(7));
        let signature: p384::ecdsa::Signature = signing_key.sign(b"message");
        let point = signing_key.verifying_key().to_encoded_point(false);
        let key = PublicKey::from_sec1(EcCurve::P384, point.as_bytes()).unwrap();

        assert_eq!(
            verify_signature(CoseAlgorithm::Es384, &key, b"message", signature.to_der().as_bytes()),
            Ok(true)
        );
    }

    #[test]
    fn it_verifies_ecdsa_with_a_digest_of_another_size() {
        let signing_key = p384::ecdsa::SigningKey::random(&mut ChaCha20Rng::seed_from_u64(8));
        let digest = CoseAlgorithm::Es256.digest(b"message").unwrap();
        let signature: p384::ecdsa::Signature = signing_key.sign_prehash(&digest).unwrap();
        let point = signing_key.verifying_key().to_encoded_point(false);
        let key = PublicKey::from_sec1(EcCurve::P384, point.as_bytes()).unwrap();
        let der = signature.to_der();

        assert_eq!(
            verify_ecdsa_any_curve(CoseAlgorithm::Es256, &key, b"message", der.as_bytes()),
            Ok(true)
        );
        assert_eq!(
            verify_ecdsa_any_curve(CoseAlgorithm::Es384, &key, b"message", der.as_bytes()),
            Ok(false)
        );
        assert!(matches!(
            verify_signature(CoseAlgorithm::Es256, &key, b"message", der.as_bytes()),
            Err(SignatureError::AlgorithmKeyMismatch { .. })
        ));
    }

    #[test]
    fn ecdsa_on_any_curve_still_needs_an_ec_key() {
        let key = PublicKey::ed25519(
            ed25519_dalek::SigningKey::from_bytes(&[42u8; 32])
                .verifying_key()
                .as_bytes(),
        )
        .unwrap();
        assert!(matches!(
            verify_ecdsa_any_curve(CoseAlgorithm::Es256, &key, b"message", &[]),
            Err(SignatureError::AlgorithmKeyMismatch { .. })
        ));
        assert_eq!(
            verify_ecdsa_any_curve(CoseAlgorithm::Rs256, &key, b"message", &[]),
            Err(SignatureError::UnsupportedAlgorithm(CoseAlgorithm::Rs256))
        );
    }

    #[test]
    fn it_verifies_eddsa() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[42u8; 32]);
        let signature = signing_key.sign(b"message");
        let key = PublicKey::ed25519(signing_key.verifying_key().as_bytes()).unwrap();

        assert_eq!(
            verify_signature(CoseAlgorithm::EdDsa, &key, b"message", &signature.to_bytes()),
            Ok(true)
        );
        assert_eq!(
            verify_signature(CoseAlgorithm::EdDsa, &key, b"message", &[0u8; 10]),
            Ok(false)
        );
    }

    #[test]
    fn it_verifies_rsa_pkcs1v15_and_pss() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = private_key.to_public_key();
        let key =
            PublicKey::rsa(&public_key.n().to_bytes_be(), &public_key.e().to_bytes_be()).unwrap();

        let rs256 = pkcs1v15::SigningKey::<Sha256>::new(private_key.clone()).sign(b"message");
        assert_eq!(
            verify_signature(CoseAlgorithm::Rs256, &key, b"message", &Box::<[u8]>::from(rs256)),
            Ok(true)
        );

        let ps256 = pss::SigningKey::<Sha256>::new(private_key).sign_with_rng(&mut rng, b"message");
        assert_eq!(
            verify_signature(CoseAlgorithm::Ps256, &key, b"message", &Box::<[u8]>::from(ps256)),
            Ok(true)
        );
        assert_eq!(
            verify_signature(CoseAlgorithm::Rs256, &key, b"message", &[1u8; 256]),
            Ok(false)
        );
    }
}
