use super::{certificates, malformed, requirement, signature, verify_with};
use crate::{AttestationError, StatementVerdict};
use webauthn_codec::{AttestationStatement, AuthenticatorData, CoseAlgorithm, EcCurve, PublicKey};

pub(super) fn verify(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<StatementVerdict, AttestationError> {
    let signature = signature(statement)?;
    let trust_path = certificates(statement)?.ok_or_else(|| malformed("missing x5c"))?;
    if trust_path.len() != 1 {
        return Err(malformed(format!(
            "expected exactly one certificate, got {}",
            trust_path.len()
        )));
    }
    let certificate = &trust_path[0];
    if !matches!(
        certificate.public_key()?,
        PublicKey::Ec2 {
            curve: EcCurve::P256,
            ..
        }
    ) {
        return Err(requirement("attestation key is not an EC P-256 key"));
    }

    let credential = auth_data
        .attested_credential_data()
        .ok_or_else(|| malformed("missing attested credential data"))?;
    let PublicKey::Ec2 {
        curve: EcCurve::P256,
        x,
        y,
    } = &credential.credential_public_key.key
    else {
        return Err(malformed("credential public key is not an EC2 P-256 key"));
    };

    // 0x00 || rpIdHash || clientDataHash || credentialId || 0x04 || x || y
    let mut message = Vec::with_capacity(1 + 32 + 32 + credential.credential_id.len() + 65);
    message.push(0x00);
    message.extend_from_slice(auth_data.rp_id_hash());
    message.extend_from_slice(client_data_hash);
    message.extend_from_slice(&credential.credential_id);
    message.push(0x04);
    message.extend_from_slice(x);
    message.extend_from_slice(y);

    verify_with(CoseAlgorithm::Es256, certificate, &message, signature)?;
    Ok(StatementVerdict::basic(trust_path))
}
