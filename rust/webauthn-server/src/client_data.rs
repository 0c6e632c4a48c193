//! Collected client data and its validation.

use crate::CeremonyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use subtle::ConstantTimeEq;
use webauthn_common::ByteArray;

/// The ceremony a client data record was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientDataType {
    /// `webauthn.create`
    Create,
    /// `webauthn.get`
    Get,
}

impl ClientDataType {
    /// The `type` member value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

/// Token binding state reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    /// Token binding was used; the `id` member carries the binding ID.
    Present,
    /// The client supports token binding but did not negotiate it.
    Supported,
    /// The client does not support token binding.
    NotSupported,
}

/// The `tokenBinding` member of client data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBinding {
    /// Binding state.
    pub status: TokenBindingStatus,
    /// Base64url token binding ID, present when `status` is `present`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// What to do when the client reports token binding nobody asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingPolicy {
    /// Fail with [`CeremonyError::TokenBindingMismatch`].
    #[default]
    Reject,
    /// Accept the response.
    Ignore,
}

/// The client's record of a ceremony, signed over by the authenticator.
///
/// `type`, `challenge` and `origin` are required. Members this library does
/// not know are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    /// `webauthn.create` or `webauthn.get`.
    #[serde(rename = "type")]
    pub ceremony_type: String,
    /// The challenge as the client saw it.
    pub challenge: ByteArray,
    /// Origin of the calling document.
    pub origin: String,
    /// Whether the caller was in a cross-origin iframe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    /// Origin of the top-level document when `cross_origin` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_origin: Option<String>,
    /// Token binding state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_binding: Option<TokenBinding>,
}

impl CollectedClientData {
    /// Parse the `clientDataJSON` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::MalformedClientData`] if the bytes are not
    /// JSON, a required member is missing, or the challenge is not base64url.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CeremonyError> {
        serde_json::from_slice(bytes)
            .map_err(|error| CeremonyError::MalformedClientData(error.to_string()))
    }
}

/// What a ceremony expects the client data to say.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedClientData<'a> {
    /// The ceremony type.
    pub ceremony_type: ClientDataType,
    /// The challenge from the issued options.
    pub challenge: &'a [u8],
    /// Accepted origins, matched exactly.
    pub origins: &'a BTreeSet<String>,
    /// Token binding ID of the caller's TLS connection, if any.
    pub token_binding_id: Option<&'a str>,
    /// Handling of unexpected token binding.
    pub token_binding_policy: TokenBindingPolicy,
}

/// Check client data against expectations, in order: type, challenge,
/// origin, token binding. The first failing check decides the error.
///
/// # Errors
///
/// Returns [`CeremonyError::TypeMismatch`],
/// [`CeremonyError::ChallengeMismatch`], [`CeremonyError::OriginMismatch`] or
/// [`CeremonyError::TokenBindingMismatch`].
pub fn validate_client_data(
    client_data: &CollectedClientData,
    expected: &ExpectedClientData<'_>,
) -> Result<(), CeremonyError> {
    if client_data.ceremony_type != expected.ceremony_type.as_str() {
        return Err(CeremonyError::TypeMismatch {
            expected: expected.ceremony_type.as_str().to_owned(),
            received: client_data.ceremony_type.clone(),
        });
    }

    if !bool::from(client_data.challenge.as_slice().ct_eq(expected.challenge)) {
        return Err(CeremonyError::ChallengeMismatch);
    }

    if !expected.origins.contains(&client_data.origin) {
        return Err(CeremonyError::OriginMismatch(client_data.origin.clone()));
    }

    let presented = client_data
        .token_binding
        .as_ref()
        .filter(|binding| binding.status == TokenBindingStatus::Present);
    match (expected.token_binding_id, presented) {
        (Some(expected_id), Some(binding)) if binding.id.as_deref() == Some(expected_id) => Ok(()),
        (Some(_), _) => Err(CeremonyError::TokenBindingMismatch),
        (None, Some(_)) if expected.token_binding_policy == TokenBindingPolicy::Reject => {
            Err(CeremonyError::TokenBindingMismatch)
        }
        (None, _) => Ok(()),
    }
}
