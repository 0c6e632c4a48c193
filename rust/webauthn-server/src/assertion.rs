//! The authentication ceremony.

use crate::relying_party::{check_user_flags, repository_error, verify_rp_id_hash};
use crate::{
    AssertedPublicKeyCredential, CeremonyError, ClientDataType, CollectedClientData,
    CounterPolicy, CredentialRepository, ExpectedClientData, PublicKeyCredentialRequestOptions,
    RelyingParty, credential::check_id, validate_client_data,
};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, instrument, warn};
use webauthn_codec::AuthenticatorData;
use webauthn_common::ByteArray;

/// Steps of the authentication ceremony, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionStep {
    /// Decode the credential, client data and authenticator data.
    ParseResponse,
    /// Find the stored credential and check who owns it.
    LookupCredential,
    /// Check type, challenge, origin and token binding.
    ValidateClientData,
    /// Check the authenticator signed for this RP ID.
    VerifyRpIdHash,
    /// Check the user presence and verification flags.
    CheckUserPresentFlag,
    /// Check the signature with the stored key.
    VerifySignature,
    /// Compare and persist the signature counter.
    CheckSignatureCounter,
}

impl fmt::Display for AssertionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ParseResponse => "parse-response",
            Self::LookupCredential => "lookup-credential",
            Self::ValidateClientData => "validate-client-data",
            Self::VerifyRpIdHash => "verify-rp-id-hash",
            Self::CheckUserPresentFlag => "check-user-present-flag",
            Self::VerifySignature => "verify-signature",
            Self::CheckSignatureCounter => "check-signature-counter",
        })
    }
}

/// An assertion response together with the options it answers.
#[derive(Debug, Clone, Copy)]
pub struct FinishAssertion<'a> {
    /// The options issued for this ceremony.
    pub options: &'a PublicKeyCredentialRequestOptions,
    /// The credential the client returned.
    pub response: &'a AssertedPublicKeyCredential,
    /// Token binding ID of the caller's TLS connection, if any.
    pub token_binding_id: Option<&'a str>,
}

impl<'a> FinishAssertion<'a> {
    /// Pair a response with the options it answers.
    pub fn new(
        options: &'a PublicKeyCredentialRequestOptions,
        response: &'a AssertedPublicKeyCredential,
    ) -> Self {
        Self {
            options,
            response,
            token_binding_id: None,
        }
    }

    /// Require the client data to carry this token binding ID.
    pub fn with_token_binding_id(mut self, token_binding_id: &'a str) -> Self {
        self.token_binding_id = Some(token_binding_id);
        self
    }
}

/// A verified assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    /// The credential that signed.
    pub credential_id: ByteArray,
    /// Handle of the user the credential belongs to.
    pub user_handle: ByteArray,
    /// Counter reported by the authenticator.
    pub signature_count: u32,
    /// `false` when the counter did not advance and the counter policy let
    /// the assertion through anyway.
    pub signature_counter_valid: bool,
    /// Whether the authenticator verified the user.
    pub user_verified: bool,
    /// Whether the credential may be backed up.
    pub backup_eligible: bool,
    /// Whether the credential is backed up.
    pub backed_up: bool,
    /// Conditions that did not prevent authentication.
    pub warnings: Vec<String>,
}

impl<S, R, G> RelyingParty<S, R, G>
where
    S: CredentialRepository,
{
    /// Verify an assertion response.
    ///
    /// When the signature counter advanced, the stored counter is updated
    /// with a single compare-and-set as the last step. No other step
    /// writes to the repository, so a rejected assertion leaves it
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns the [`CeremonyError`] of the first failing step.
    #[instrument(skip_all, fields(rp_id = %ceremony.options.rp_id, credential_id = %ceremony.response.id))]
    pub async fn finish_assertion(
        &self,
        ceremony: FinishAssertion<'_>,
    ) -> Result<AssertionResult, CeremonyError> {
        self.verify_assertion(ceremony)
            .await
            .inspect_err(|error| warn!(%error, kind = ?error.kind(), "assertion rejected"))
    }

    async fn verify_assertion(
        &self,
        ceremony: FinishAssertion<'_>,
    ) -> Result<AssertionResult, CeremonyError> {
        let FinishAssertion {
            options,
            response,
            token_binding_id,
        } = ceremony;

        debug!(step = %AssertionStep::ParseResponse, "assertion step");
        check_id(&response.id, &response.raw_id)?;
        let client_data = CollectedClientData::from_json(&response.response.client_data_json)?;
        let auth_data = AuthenticatorData::from_bytes(&response.response.authenticator_data)?;

        debug!(step = %AssertionStep::LookupCredential, "assertion step");
        let discoverable = options.allow_credentials.is_empty();
        if !discoverable
            && !options
                .allow_credentials
                .iter()
                .any(|descriptor| descriptor.id == response.raw_id)
        {
            return Err(CeremonyError::UnknownCredential);
        }
        let user_handle = response.user_handle();
        if discoverable && user_handle.is_none() {
            return Err(CeremonyError::MissingUserHandle);
        }
        let stored = self
            .repository
            .lookup(&response.raw_id)
            .await
            .map_err(repository_error)?
            .ok_or(CeremonyError::UnknownCredential)?;
        if user_handle.is_some_and(|handle| *handle != stored.user_handle) {
            return Err(CeremonyError::UserHandleMismatch);
        }

        debug!(step = %AssertionStep::ValidateClientData, "assertion step");
        validate_client_data(
            &client_data,
            &ExpectedClientData {
                ceremony_type: ClientDataType::Get,
                challenge: &options.challenge,
                origins: &self.config.origins,
                token_binding_id,
                token_binding_policy: self.config.token_binding_policy,
            },
        )?;

        debug!(step = %AssertionStep::VerifyRpIdHash, "assertion step");
        let appid = options
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.appid.as_deref())
            .filter(|_| response.client_extension_results.appid == Some(true));
        verify_rp_id_hash(&auth_data, appid.unwrap_or(options.rp_id.as_str()))?;

        debug!(step = %AssertionStep::CheckUserPresentFlag, "assertion step");
        let flags = auth_data.flags();
        check_user_flags(flags, options.user_verification)?;

        debug!(step = %AssertionStep::VerifySignature, "assertion step");
        let mut signed_data = auth_data.as_bytes().to_vec();
        signed_data.extend_from_slice(&Sha256::digest(&response.response.client_data_json));
        if !stored
            .public_key
            .verify(&signed_data, &response.response.signature)?
        {
            return Err(CeremonyError::SignatureInvalid);
        }

        debug!(step = %AssertionStep::CheckSignatureCounter, "assertion step");
        let stored_count = stored.signature_count;
        let received = auth_data.counter();
        let advanced = received > stored_count;
        let signature_counter_valid = advanced || (received == 0 && stored_count == 0);
        let mut warnings = Vec::new();
        if !signature_counter_valid {
            match self.config.counter_policy {
                CounterPolicy::Reject => {
                    return Err(CeremonyError::PossibleCredentialCloning {
                        stored: stored_count,
                        received,
                    });
                }
                CounterPolicy::FlagAndAccept => {
                    warn!(stored = stored_count, received, "signature counter did not advance");
                    warnings.push(format!(
                        "signature counter did not advance: stored {stored_count}, received {received}"
                    ));
                }
            }
        }
        if advanced
            && !self
                .repository
                .update_counter(&stored.credential_id, stored_count, received)
                .await
                .map_err(repository_error)?
        {
            return Err(CeremonyError::CounterUpdateConflict);
        }

        debug!(counter = received, "assertion verified");
        Ok(AssertionResult {
            credential_id: stored.credential_id,
            user_handle: stored.user_handle,
            signature_count: received,
            signature_counter_valid,
            user_verified: flags.user_verified(),
            backup_eligible: flags.backup_eligible(),
            backed_up: flags.backed_up(),
            warnings,
        })
    }
}
