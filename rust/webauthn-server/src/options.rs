//! Ceremony options sent to the client.
//!
//! Field names follow the WebAuthn dictionaries verbatim, so these types can
//! be serialized straight into `navigator.credentials.create()` and
//! `navigator.credentials.get()` arguments.

use crate::{OptionsError, RelyingPartyIdentity, UserIdentity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use webauthn_codec::CoseAlgorithm;
use webauthn_common::{ByteArray, RandomSource};

/// Shortest challenge the options generator will produce.
pub const MIN_CHALLENGE_LENGTH: usize = 16;

/// Challenge length used unless configured otherwise.
pub const DEFAULT_CHALLENGE_LENGTH: usize = 32;

/// The only credential type WebAuthn defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PublicKeyCredentialType {
    /// `public-key`
    #[default]
    #[serde(rename = "public-key")]
    PublicKey,
}

/// An acceptable credential algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyCredentialParameters {
    /// Always `public-key`.
    #[serde(rename = "type")]
    pub kind: PublicKeyCredentialType,
    /// COSE algorithm identifier.
    pub alg: CoseAlgorithm,
}

impl PublicKeyCredentialParameters {
    /// Parameters for a public-key credential using `alg`.
    pub fn new(alg: CoseAlgorithm) -> Self {
        Self {
            kind: PublicKeyCredentialType::PublicKey,
            alg,
        }
    }
}

/// How the client may reach an authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorTransport {
    /// `usb`
    Usb,
    /// `nfc`
    Nfc,
    /// `ble`
    Ble,
    /// `smart-card`
    SmartCard,
    /// `hybrid`
    Hybrid,
    /// `internal`
    Internal,
}

/// A reference to an existing credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyCredentialDescriptor {
    /// Always `public-key`.
    #[serde(rename = "type")]
    pub kind: PublicKeyCredentialType,
    /// Credential ID.
    pub id: ByteArray,
    /// Transport hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// A descriptor for credential `id` without transport hints.
    pub fn new(id: impl Into<ByteArray>) -> Self {
        Self {
            kind: PublicKeyCredentialType::PublicKey,
            id: id.into(),
            transports: None,
        }
    }

    /// Add transport hints.
    pub fn with_transports(mut self, transports: Vec<AuthenticatorTransport>) -> Self {
        self.transports = Some(transports);
        self
    }
}

/// Whether the authenticator must verify the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    /// `required`
    Required,
    /// `preferred`
    #[default]
    Preferred,
    /// `discouraged`
    Discouraged,
}

/// Whether a client-side discoverable credential should be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    /// `discouraged`
    Discouraged,
    /// `preferred`
    Preferred,
    /// `required`
    Required,
}

/// Platform or roaming authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    /// `platform`
    Platform,
    /// `cross-platform`
    CrossPlatform,
}

/// Authenticator requirements for registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    /// Required attachment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    /// Discoverable credential requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<ResidentKeyRequirement>,
    /// Legacy form of `residentKey: required`.
    #[serde(default)]
    pub require_resident_key: bool,
    /// User verification requirement.
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
}

/// How much attestation the relying party wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    /// `none`
    #[default]
    None,
    /// `indirect`
    Indirect,
    /// `direct`
    Direct,
    /// `enterprise`
    Enterprise,
}

/// Extension inputs for registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationExtensionInputs {
    /// FIDO AppID whose U2F credentials should be excluded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid_exclude: Option<String>,
    /// Ask the client to report credential properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<bool>,
}

/// Extension inputs for authentication.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionExtensionInputs {
    /// FIDO AppID under which a U2F credential may have been registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
}

/// Options for `navigator.credentials.create()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialCreationOptions {
    /// The relying party.
    pub rp: RelyingPartyIdentity,
    /// The user account.
    pub user: UserIdentity,
    /// Fresh random challenge.
    pub challenge: ByteArray,
    /// Acceptable algorithms, most preferred first.
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    /// Timeout hint in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Credentials the user already has, by unique ID.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
    /// Authenticator requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    /// Attestation conveyance preference.
    #[serde(default)]
    pub attestation: AttestationConveyancePreference,
    /// Extension inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<RegistrationExtensionInputs>,
}

impl PublicKeyCredentialCreationOptions {
    /// The user verification requirement, `preferred` when no selection
    /// criteria were sent.
    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.authenticator_selection
            .map(|selection| selection.user_verification)
            .unwrap_or_default()
    }
}

/// Options for `navigator.credentials.get()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    /// Fresh random challenge.
    pub challenge: ByteArray,
    /// Timeout hint in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// The RP ID the assertion is scoped to.
    pub rp_id: String,
    /// Acceptable credentials, by unique ID. Empty for discoverable
    /// credentials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    /// User verification requirement.
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
    /// Extension inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<AssertionExtensionInputs>,
}

/// Parameters for [`start_registration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    /// The relying party.
    pub rp: RelyingPartyIdentity,
    /// The user account.
    pub user: UserIdentity,
    /// Acceptable algorithms, most preferred first.
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    /// Credentials to exclude. Duplicates are dropped.
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
    /// Authenticator requirements.
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    /// Attestation conveyance preference.
    pub attestation: AttestationConveyancePreference,
    /// Extension inputs.
    pub extensions: Option<RegistrationExtensionInputs>,
    /// Timeout hint in milliseconds.
    pub timeout: Option<u64>,
    /// Challenge length in bytes.
    pub challenge_length: usize,
}

impl RegistrationRequest {
    /// A request offering `algorithms` with everything else defaulted.
    pub fn new(
        rp: RelyingPartyIdentity,
        user: UserIdentity,
        algorithms: impl IntoIterator<Item = CoseAlgorithm>,
    ) -> Self {
        Self {
            rp,
            user,
            pub_key_cred_params: algorithms
                .into_iter()
                .map(PublicKeyCredentialParameters::new)
                .collect(),
            exclude_credentials: Vec::new(),
            authenticator_selection: None,
            attestation: AttestationConveyancePreference::default(),
            extensions: None,
            timeout: None,
            challenge_length: DEFAULT_CHALLENGE_LENGTH,
        }
    }

    /// Exclude credentials the user already holds.
    pub fn with_exclude_credentials(
        mut self,
        credentials: impl IntoIterator<Item = PublicKeyCredentialDescriptor>,
    ) -> Self {
        self.exclude_credentials = credentials.into_iter().collect();
        self
    }

    /// Set authenticator requirements.
    pub fn with_authenticator_selection(mut self, selection: AuthenticatorSelectionCriteria) -> Self {
        self.authenticator_selection = Some(selection);
        self
    }

    /// Set the attestation conveyance preference.
    pub fn with_attestation(mut self, attestation: AttestationConveyancePreference) -> Self {
        self.attestation = attestation;
        self
    }

    /// Set extension inputs.
    pub fn with_extensions(mut self, extensions: RegistrationExtensionInputs) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Set the timeout hint.
    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the challenge length.
    pub fn with_challenge_length(mut self, length: usize) -> Self {
        self.challenge_length = length;
        self
    }
}

/// Parameters for [`start_assertion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRequest {
    /// The RP ID.
    pub rp_id: String,
    /// Acceptable credentials. Duplicates are dropped.
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    /// User verification requirement.
    pub user_verification: UserVerificationRequirement,
    /// Extension inputs.
    pub extensions: Option<AssertionExtensionInputs>,
    /// Timeout hint in milliseconds.
    pub timeout: Option<u64>,
    /// Challenge length in bytes.
    pub challenge_length: usize,
}

impl AssertionRequest {
    /// A request for `rp_id` with everything else defaulted.
    pub fn new(rp_id: impl Into<String>) -> Self {
        Self {
            rp_id: rp_id.into(),
            allow_credentials: Vec::new(),
            user_verification: UserVerificationRequirement::default(),
            extensions: None,
            timeout: None,
            challenge_length: DEFAULT_CHALLENGE_LENGTH,
        }
    }

    /// Restrict the assertion to these credentials.
    pub fn with_allow_credentials(
        mut self,
        credentials: impl IntoIterator<Item = PublicKeyCredentialDescriptor>,
    ) -> Self {
        self.allow_credentials = credentials.into_iter().collect();
        self
    }

    /// Set the user verification requirement.
    pub fn with_user_verification(mut self, requirement: UserVerificationRequirement) -> Self {
        self.user_verification = requirement;
        self
    }

    /// Set extension inputs.
    pub fn with_extensions(mut self, extensions: AssertionExtensionInputs) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Set the timeout hint.
    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the challenge length.
    pub fn with_challenge_length(mut self, length: usize) -> Self {
        self.challenge_length = length;
        self
    }
}

/// Build registration options with a fresh challenge.
///
/// # Errors
///
/// Returns [`OptionsError::ChallengeTooShort`] if the requested challenge
/// length is below [`MIN_CHALLENGE_LENGTH`].
pub fn start_registration(
    request: RegistrationRequest,
    random: &impl RandomSource,
) -> Result<PublicKeyCredentialCreationOptions, OptionsError> {
    let challenge = challenge(request.challenge_length, random)?;
    debug!(
        rp_id = %request.rp.id,
        excluded = request.exclude_credentials.len(),
        "starting registration"
    );
    Ok(PublicKeyCredentialCreationOptions {
        rp: request.rp,
        user: request.user,
        challenge,
        pub_key_cred_params: request.pub_key_cred_params,
        timeout: request.timeout,
        exclude_credentials: deduplicate(request.exclude_credentials),
        authenticator_selection: request.authenticator_selection,
        attestation: request.attestation,
        extensions: request.extensions,
    })
}

/// Build authentication options with a fresh challenge.
///
/// # Errors
///
/// Returns [`OptionsError::ChallengeTooShort`] if the requested challenge
/// length is below [`MIN_CHALLENGE_LENGTH`].
pub fn start_assertion(
    request: AssertionRequest,
    random: &impl RandomSource,
) -> Result<PublicKeyCredentialRequestOptions, OptionsError> {
    let challenge = challenge(request.challenge_length, random)?;
    debug!(
        rp_id = %request.rp_id,
        allowed = request.allow_credentials.len(),
        "starting assertion"
    );
    Ok(PublicKeyCredentialRequestOptions {
        challenge,
        timeout: request.timeout,
        rp_id: request.rp_id,
        allow_credentials: deduplicate(request.allow_credentials),
        user_verification: request.user_verification,
        extensions: request.extensions,
    })
}

fn challenge(length: usize, random: &impl RandomSource) -> Result<ByteArray, OptionsError> {
    if length < MIN_CHALLENGE_LENGTH {
        return Err(OptionsError::ChallengeTooShort {
            length,
            minimum: MIN_CHALLENGE_LENGTH,
        });
    }
    Ok(random.bytes(length).into())
}

/// Drop descriptors whose ID was already seen, keeping the first.
fn deduplicate(descriptors: Vec<PublicKeyCredentialDescriptor>) -> Vec<PublicKeyCredentialDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|descriptor| seen.insert(descriptor.id.clone()))
        .collect()
}
