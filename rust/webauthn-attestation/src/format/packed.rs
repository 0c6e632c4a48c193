use super::{algorithm, certificates, check_leaf, malformed, signature, signed_data, verify_with};
use crate::{AttestationError, StatementVerdict};
use webauthn_codec::{AttestationStatement, AuthenticatorData};

pub(super) fn verify(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<StatementVerdict, AttestationError> {
    let algorithm = algorithm(statement)?;
    let signature = signature(statement)?;
    if statement.get("ecdaaKeyId").is_some() {
        return Err(malformed("ECDAA attestation is not supported"));
    }
    let message = signed_data(auth_data, client_data_hash);

    if let Some(trust_path) = certificates(statement)? {
        let leaf = &trust_path[0];
        verify_with(algorithm, leaf, &message, signature)?;
        check_leaf(leaf, auth_data)?;
        return Ok(StatementVerdict::basic(trust_path));
    }

    let credential = auth_data
        .attested_credential_data()
        .ok_or_else(|| malformed("missing attested credential data"))?;
    let key = &credential.credential_public_key;
    if key.algorithm != algorithm {
        return Err(malformed(format!(
            "self attestation alg {algorithm} does not match credential key alg {}",
            key.algorithm
        )));
    }
    if key.verify(&message, signature)? {
        Ok(StatementVerdict::self_attestation())
    } else {
        Err(AttestationError::AttestationSignatureInvalid)
    }
}
