use super::{check_leaf, malformed, requirement, signed_data, verify_with};
use crate::{AttestationError, Certificate, StatementVerdict};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use webauthn_codec::{AttestationStatement, AuthenticatorData, CoseAlgorithm};

const ATTESTATION_HOSTNAME: &str = "attest.android.com";

#[derive(Deserialize)]
struct JwsHeader {
    alg: String,
    x5c: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetPayload {
    nonce: String,
    cts_profile_match: bool,
}

pub(super) fn verify(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<StatementVerdict, AttestationError> {
    match statement.text("ver") {
        Some(version) if !version.is_empty() => {}
        _ => return Err(malformed("missing ver")),
    }
    let response = statement
        .bytes("response")
        .ok_or_else(|| malformed("missing response"))?;
    let jws = std::str::from_utf8(response).map_err(|_| malformed("response is not UTF-8"))?;

    let mut parts = jws.split('.');
    let (Some(header), Some(payload), Some(jws_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("response is not a compact JWS"));
    };

    let header: JwsHeader = decode_json(header)?;
    if header.alg != "RS256" {
        return Err(malformed(format!("unsupported JWS algorithm {}", header.alg)));
    }
    let trust_path = header
        .x5c
        .iter()
        .map(|certificate| {
            STANDARD
                .decode(certificate)
                .map_err(|_| malformed("x5c entry is not base64"))
                .and_then(|der| Certificate::from_der(&der))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let leaf = trust_path.first().ok_or_else(|| malformed("x5c is empty"))?;

    let signature = webauthn_common::base64url::decode(jws_signature)
        .map_err(|_| malformed("JWS signature is not base64url"))?;
    let signing_input = &jws[..header_and_payload_len(jws)];
    verify_with(CoseAlgorithm::Rs256, leaf, signing_input.as_bytes(), &signature)?;

    if !leaf.has_common_name(ATTESTATION_HOSTNAME) {
        return Err(requirement(format!(
            "attestation certificate is not issued to {ATTESTATION_HOSTNAME}"
        )));
    }
    check_leaf(leaf, auth_data)?;

    let payload: SafetyNetPayload = decode_json(payload)?;
    let expected_nonce = STANDARD.encode(Sha256::digest(signed_data(auth_data, client_data_hash)));
    if payload.nonce != expected_nonce {
        return Err(malformed("nonce does not match authenticator and client data"));
    }
    if !payload.cts_profile_match {
        return Err(malformed("device failed the CTS profile match"));
    }

    Ok(StatementVerdict::basic(trust_path))
}

fn decode_json<T: for<'de> Deserialize<'de>>(part: &str) -> Result<T, AttestationError> {
    let bytes = webauthn_common::base64url::decode(part)
        .map_err(|_| malformed("JWS segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|error| malformed(format!("JWS segment: {error}")))
}

/// Length of `header.payload`, the part of a compact JWS that is signed.
fn header_and_payload_len(jws: &str) -> usize {
    jws.rfind('.').unwrap_or(jws.len())
}
