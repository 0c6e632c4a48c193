use super::{algorithm, certificates, malformed, requirement, signature, signed_data, verify_with};
use crate::{AttestationError, StatementVerdict};
use der::asn1::{AnyRef, ObjectIdentifier, OctetStringRef};
use der::{Reader, SliceReader};
use webauthn_codec::{AttestationStatement, AuthenticatorData};

/// The Android key attestation extension carrying a `KeyDescription`.
const KEY_DESCRIPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.11129.2.1.17");

pub(super) fn verify(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<StatementVerdict, AttestationError> {
    let algorithm = algorithm(statement)?;
    let signature = signature(statement)?;
    let trust_path = certificates(statement)?.ok_or_else(|| malformed("missing x5c"))?;
    let leaf = &trust_path[0];

    verify_with(algorithm, leaf, &signed_data(auth_data, client_data_hash), signature)?;

    let credential = auth_data
        .attested_credential_data()
        .ok_or_else(|| malformed("missing attested credential data"))?;
    if leaf.public_key()? != credential.credential_public_key.key {
        return Err(AttestationError::PublicKeyMismatch);
    }

    let description = leaf
        .extension(&KEY_DESCRIPTION)
        .ok_or_else(|| requirement("missing key attestation extension"))?;
    let challenge = attestation_challenge(description)
        .map_err(|error| requirement(format!("invalid key description: {error}")))?;
    if challenge != client_data_hash {
        return Err(requirement("attestation challenge does not match client data hash"));
    }

    Ok(StatementVerdict::basic(trust_path))
}

/// Read `attestationChallenge`, the fifth field of `KeyDescription`.
fn attestation_challenge(description: &[u8]) -> der::Result<Vec<u8>> {
    let mut reader = SliceReader::new(description)?;
    let challenge = reader.sequence(|sequence| {
        // attestationVersion, attestationSecurityLevel,
        // keymasterVersion, keymasterSecurityLevel
        for _ in 0..4 {
            sequence.decode::<AnyRef<'_>>()?;
        }
        let challenge = sequence.decode::<OctetStringRef<'_>>()?.as_bytes().to_vec();
        while !sequence.is_finished() {
            sequence.decode::<AnyRef<'_>>()?;
        }
        Ok(challenge)
    })?;
    reader.finish(challenge)
}
