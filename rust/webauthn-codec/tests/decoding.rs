use pretty_assertions::assert_eq;
use proptest::prelude::*;
use testresult::TestResult;
use webauthn_codec::{
    AttestationObject, AuthenticatorData, CodecError, CoseAlgorithm, CoseKey, verify_signature,
};
use webauthn_common::helpers::{SoftAuthenticator, client_data_json, flags, signed_data};

fn registration_object(seed: u8) -> Vec<u8> {
    let authenticator = SoftAuthenticator::new(seed);
    let auth_data = authenticator.registration_authenticator_data("example.com", flags::UP, 0);
    let client_data = client_data_json("webauthn.create", &[seed; 32], "https://example.com");
    authenticator.self_attestation(&auth_data, &client_data)
}

#[test]
fn decoding_is_deterministic() -> TestResult {
    let bytes = registration_object(3);
    let first = AttestationObject::from_bytes(&bytes)?;
    let second = AttestationObject::from_bytes(&bytes)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn self_attestation_signature_verifies_with_the_credential_key() -> TestResult {
    let authenticator = SoftAuthenticator::new(8);
    let auth_data = authenticator.registration_authenticator_data("example.com", flags::UP, 0);
    let client_data = client_data_json("webauthn.create", &[1u8; 32], "https://example.com");
    let object = AttestationObject::from_bytes(&authenticator.self_attestation(&auth_data, &client_data))?;

    let credential = object
        .auth_data
        .attested_credential_data()
        .expect("attested credential data");
    let signature = object.statement.bytes("sig").expect("sig");
    let message = signed_data(object.auth_data.as_bytes(), &client_data);

    assert_eq!(credential.credential_public_key.algorithm, CoseAlgorithm::Es256);
    assert!(verify_signature(
        CoseAlgorithm::Es256,
        &credential.credential_public_key.key,
        &message,
        signature
    )?);
    Ok(())
}

#[test]
fn every_truncation_of_authenticator_data_is_rejected() {
    let bytes = SoftAuthenticator::new(2).registration_authenticator_data("example.com", flags::UP, 0);
    for len in 0..bytes.len() {
        assert!(
            matches!(
                AuthenticatorData::from_bytes(&bytes[..len]),
                Err(CodecError::MalformedAuthenticatorData(_))
            ),
            "truncation to {len} bytes was accepted"
        );
    }
}

proptest! {
    #[test]
    fn attestation_object_decoding_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = AttestationObject::from_bytes(&bytes);
    }

    #[test]
    fn authenticator_data_decoding_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = AuthenticatorData::from_bytes(&bytes);
    }

    #[test]
    fn cose_key_decoding_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = CoseKey::from_bytes(&bytes);
    }

    #[test]
    fn corrupted_attestation_objects_decode_the_same_way_twice(
        index in 0usize..64,
        replacement in any::<u8>(),
    ) {
        let mut bytes = registration_object(4);
        let index = index % bytes.len();
        bytes[index] = replacement;
        prop_assert_eq!(
            AttestationObject::from_bytes(&bytes),
            AttestationObject::from_bytes(&bytes)
        );
    }

    #[test]
    fn header_fields_are_read_verbatim(flag_bits in any::<u8>(), counter in any::<u32>()) {
        let flag_bits = flag_bits & !(flags::AT | flags::ED);
        let bytes = SoftAuthenticator::new(1).assertion_authenticator_data("example.com", flag_bits, counter);
        let data = AuthenticatorData::from_bytes(&bytes).unwrap();
        prop_assert_eq!(data.flags().bits(), flag_bits);
        prop_assert_eq!(data.counter(), counter);
    }
}
