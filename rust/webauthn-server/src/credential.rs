//! Credentials returned by the client.

use crate::{AuthenticatorAttachment, CeremonyError, PublicKeyCredentialType};
use serde::{Deserialize, Serialize};
use webauthn_common::ByteArray;

/// The `response` member of a registration credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    /// Serialized client data.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: ByteArray,
    /// CBOR attestation object.
    pub attestation_object: ByteArray,
    /// Transports the authenticator reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

/// The `response` member of an authentication credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    /// Serialized client data.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: ByteArray,
    /// Raw authenticator data.
    pub authenticator_data: ByteArray,
    /// Signature over `authenticatorData || SHA-256(clientDataJSON)`.
    pub signature: ByteArray,
    /// Handle of the user the credential belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<ByteArray>,
}

/// Output of the `credProps` extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CredentialPropertiesOutput {
    /// Whether a discoverable credential was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rk: Option<bool>,
}

/// Client extension outputs the relying party understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExtensionOutputs {
    /// Whether the `appid` extension was used to sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<bool>,
    /// Output of `credProps`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<CredentialPropertiesOutput>,
}

/// A credential returned by `navigator.credentials.create()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPublicKeyCredential {
    /// Base64url credential ID.
    pub id: String,
    /// Credential ID.
    pub raw_id: ByteArray,
    /// Authenticator response.
    pub response: AuthenticatorAttestationResponse,
    /// Always `public-key`.
    #[serde(rename = "type")]
    pub kind: PublicKeyCredentialType,
    /// Extension outputs.
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
    /// Attachment of the authenticator used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
}

/// A credential returned by `navigator.credentials.get()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertedPublicKeyCredential {
    /// Base64url credential ID.
    pub id: String,
    /// Credential ID.
    pub raw_id: ByteArray,
    /// Authenticator response.
    pub response: AuthenticatorAssertionResponse,
    /// Always `public-key`.
    #[serde(rename = "type")]
    pub kind: PublicKeyCredentialType,
    /// Extension outputs.
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
    /// Attachment of the authenticator used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
}

impl CreatedPublicKeyCredential {
    /// Assemble a credential from its binary parts.
    pub fn new(
        raw_id: impl Into<ByteArray>,
        client_data_json: impl Into<ByteArray>,
        attestation_object: impl Into<ByteArray>,
    ) -> Self {
        let raw_id = raw_id.into();
        Self {
            id: raw_id.to_base64url(),
            raw_id,
            response: AuthenticatorAttestationResponse {
                client_data_json: client_data_json.into(),
                attestation_object: attestation_object.into(),
                transports: Vec::new(),
            },
            kind: PublicKeyCredentialType::PublicKey,
            client_extension_results: ClientExtensionOutputs::default(),
            authenticator_attachment: None,
        }
    }
}

impl AssertedPublicKeyCredential {
    /// Assemble a credential from its binary parts.
    pub fn new(
        raw_id: impl Into<ByteArray>,
        client_data_json: impl Into<ByteArray>,
        authenticator_data: impl Into<ByteArray>,
        signature: impl Into<ByteArray>,
        user_handle: Option<ByteArray>,
    ) -> Self {
        let raw_id = raw_id.into();
        Self {
            id: raw_id.to_base64url(),
            raw_id,
            response: AuthenticatorAssertionResponse {
                client_data_json: client_data_json.into(),
                authenticator_data: authenticator_data.into(),
                signature: signature.into(),
                user_handle,
            },
            kind: PublicKeyCredentialType::PublicKey,
            client_extension_results: ClientExtensionOutputs::default(),
            authenticator_attachment: None,
        }
    }

    /// The user handle, treating an empty one as absent.
    pub fn user_handle(&self) -> Option<&ByteArray> {
        self.response
            .user_handle
            .as_ref()
            .filter(|handle| !handle.is_empty())
    }
}

/// `id` must be the base64url form of `rawId`.
pub(crate) fn check_id(id: &str, raw_id: &ByteArray) -> Result<(), CeremonyError> {
    match ByteArray::from_base64url(id) {
        Ok(decoded) if decoded == *raw_id => Ok(()),
        _ => Err(CeremonyError::MalformedResponse(
            "id is not the base64url encoding of rawId".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reads_browser_json() {
        let json = r#"{
            "id": "AQID",
            "rawId": "AQID",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "AAAA",
                "signature": "MEU",
                "userHandle": ""
            },
            "clientExtensionResults": {"appid": true},
            "authenticatorAttachment": "cross-platform"
        }"#;
        let credential: AssertedPublicKeyCredential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.raw_id.as_slice(), &[1, 2, 3]);
        assert_eq!(credential.response.client_data_json.as_slice(), b"{}");
        assert_eq!(credential.client_extension_results.appid, Some(true));
        assert_eq!(credential.user_handle(), None);
        assert_eq!(
            credential.authenticator_attachment,
            Some(AuthenticatorAttachment::CrossPlatform)
        );
        assert!(check_id(&credential.id, &credential.raw_id).is_ok());
    }

    #[test]
    fn padded_ids_are_accepted() {
        let raw_id = ByteArray::from(vec![1u8, 2]);
        assert!(check_id("AQI=", &raw_id).is_ok());
        assert!(check_id("AQI", &raw_id).is_ok());
        assert!(check_id("AQM", &raw_id).is_err());
    }

    #[test]
    fn extension_results_default_to_empty() {
        let json = r#"{
            "id": "AQID",
            "rawId": "AQID",
            "type": "public-key",
            "response": {"clientDataJSON": "e30", "attestationObject": "oA"}
        }"#;
        let credential: CreatedPublicKeyCredential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.client_extension_results, ClientExtensionOutputs::default());
        assert!(credential.response.transports.is_empty());
    }
}
