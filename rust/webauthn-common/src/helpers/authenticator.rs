use super::{
    AttestedCredential, TEST_AAGUID, attestation_object, authenticator_data, bytes, cose_ec2_key,
    flags, int, sha256, text,
};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey, signature::Signer};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// COSE algorithm identifier for ES256.
const ES256: i64 = -7;
/// COSE curve identifier for P-256.
const P256: i64 = 1;

/// A software authenticator holding a single P-256 credential.
///
/// Two authenticators built from the same seed hold the same key and
/// credential ID.
#[derive(Debug, Clone)]
pub struct SoftAuthenticator {
    signing_key: SigningKey,
    credential_id: Vec<u8>,
    aaguid: [u8; 16],
}

impl SoftAuthenticator {
    /// Create an authenticator whose key is derived from `seed`.
    pub fn new(seed: u8) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(u64::from(seed));
        Self {
            signing_key: SigningKey::random(&mut rng),
            credential_id: vec![seed; 16],
            aaguid: TEST_AAGUID,
        }
    }

    /// Replace the credential ID.
    pub fn with_credential_id(mut self, credential_id: impl Into<Vec<u8>>) -> Self {
        self.credential_id = credential_id.into();
        self
    }

    /// Replace the AAGUID.
    pub fn with_aaguid(mut self, aaguid: [u8; 16]) -> Self {
        self.aaguid = aaguid;
        self
    }

    /// The credential ID.
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// The authenticator model identifier.
    pub fn aaguid(&self) -> [u8; 16] {
        self.aaguid
    }

    /// The credential's private key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The credential's public key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Affine `(x, y)` coordinates of the public key.
    pub fn public_key_coordinates(&self) -> ([u8; 32], [u8; 32]) {
        let point = self.verifying_key().to_encoded_point(false);
        let encoded = point.as_bytes();
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&encoded[1..33]);
        y.copy_from_slice(&encoded[33..65]);
        (x, y)
    }

    /// The public key as an ES256 COSE_Key.
    pub fn cose_public_key(&self) -> Vec<u8> {
        let (x, y) = self.public_key_coordinates();
        cose_ec2_key(ES256, P256, &x, &y)
    }

    /// Authenticator data for a registration, with attested credential data.
    ///
    /// The `AT` flag is always set.
    pub fn registration_authenticator_data(&self, rp_id: &str, flags: u8, counter: u32) -> Vec<u8> {
        let public_key = self.cose_public_key();
        authenticator_data(
            rp_id,
            flags | flags::AT,
            counter,
            Some(&AttestedCredential {
                aaguid: self.aaguid,
                credential_id: &self.credential_id,
                public_key: &public_key,
            }),
            None,
        )
    }

    /// Authenticator data for an assertion.
    pub fn assertion_authenticator_data(&self, rp_id: &str, flags: u8, counter: u32) -> Vec<u8> {
        authenticator_data(rp_id, flags, counter, None, None)
    }

    /// DER-encoded ES256 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_der().as_bytes().to_vec()
    }

    /// Sign `authenticatorData || SHA-256(clientDataJSON)`.
    pub fn assert(&self, auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
        self.sign(&signed_data(auth_data, client_data_json))
    }

    /// Attestation object in the `none` format.
    pub fn none_attestation(&self, auth_data: &[u8]) -> Vec<u8> {
        attestation_object("none", auth_data, Vec::new())
    }

    /// Attestation object in the `packed` format using self attestation.
    pub fn self_attestation(&self, auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
        let signature = self.assert(auth_data, client_data_json);
        attestation_object(
            "packed",
            auth_data,
            vec![(text("alg"), int(ES256)), (text("sig"), bytes(&signature))],
        )
    }
}

/// `authenticatorData || SHA-256(clientDataJSON)`.
pub fn signed_data(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(auth_data.len() + 32);
    message.extend_from_slice(auth_data);
    message.extend_from_slice(&sha256(client_data_json));
    message
}
