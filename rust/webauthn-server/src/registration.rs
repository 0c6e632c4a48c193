//! The registration ceremony.

use crate::relying_party::{check_user_flags, repository_error, verify_rp_id_hash};
use crate::{
    CeremonyError, ClientDataType, CollectedClientData, CreatedPublicKeyCredential,
    CredentialRepository, ExpectedClientData, PublicKeyCredentialCreationOptions,
    RegisteredCredential, RelyingParty, UnknownAttestationPolicy, credential::check_id,
    validate_client_data,
};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, instrument, warn};
use webauthn_attestation::{
    AttestationFormat, AttestationVerdict, TrustRootResolver, evaluate_trust, verify_statement,
};
use webauthn_codec::{Aaguid, AttestationObject};

/// Steps of the registration ceremony, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStep {
    /// Decode the credential, client data and attestation object.
    ParseResponse,
    /// Check type, challenge, origin and token binding.
    ValidateClientData,
    /// Check the authenticator scoped the credential to this RP ID.
    VerifyRpIdHash,
    /// Check the user presence and verification flags.
    CheckUserPresentFlag,
    /// Extract the new credential.
    ParseAttestedCredentialData,
    /// Verify the attestation statement and evaluate its trust.
    DispatchAttestationVerifier,
    /// Check no one registered the credential ID before.
    CheckCredentialIdUnique,
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ParseResponse => "parse-response",
            Self::ValidateClientData => "validate-client-data",
            Self::VerifyRpIdHash => "verify-rp-id-hash",
            Self::CheckUserPresentFlag => "check-user-present-flag",
            Self::ParseAttestedCredentialData => "parse-attested-credential-data",
            Self::DispatchAttestationVerifier => "dispatch-attestation-verifier",
            Self::CheckCredentialIdUnique => "check-credential-id-unique",
        })
    }
}

/// A registration response together with the options it answers.
#[derive(Debug, Clone, Copy)]
pub struct FinishRegistration<'a> {
    /// The options issued for this ceremony.
    pub options: &'a PublicKeyCredentialCreationOptions,
    /// The credential the client returned.
    pub response: &'a CreatedPublicKeyCredential,
    /// Token binding ID of the caller's TLS connection, if any.
    pub token_binding_id: Option<&'a str>,
}

impl<'a> FinishRegistration<'a> {
    /// Pair a response with the options it answers.
    pub fn new(
        options: &'a PublicKeyCredentialCreationOptions,
        response: &'a CreatedPublicKeyCredential,
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

/// A verified registration.
///
/// The caller is expected to store `credential` in its repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    /// The new credential.
    pub credential: RegisteredCredential,
    /// Attestation verification outcome.
    pub attestation: AttestationVerdict,
    /// Whether the authenticator verified the user.
    pub user_verified: bool,
    /// Whether the credential may be backed up.
    pub backup_eligible: bool,
    /// Whether the credential is backed up.
    pub backed_up: bool,
    /// Conditions that did not prevent registration.
    pub warnings: Vec<String>,
}

impl<S, R, G> RelyingParty<S, R, G>
where
    S: CredentialRepository,
    R: TrustRootResolver,
{
    /// Verify a registration response.
    ///
    /// The repository is consulted once, to check the credential ID is not
    /// registered yet. Nothing is written to it.
    ///
    /// # Errors
    ///
    /// Returns the [`CeremonyError`] of the first failing step.
    #[instrument(skip_all, fields(rp_id = %ceremony.options.rp.id, credential_id = %ceremony.response.id))]
    pub async fn finish_registration(
        &self,
        ceremony: FinishRegistration<'_>,
    ) -> Result<RegistrationResult, CeremonyError> {
        self.verify_registration(ceremony)
            .await
            .inspect_err(|error| warn!(%error, kind = ?error.kind(), "registration rejected"))
    }

    async fn verify_registration(
        &self,
        ceremony: FinishRegistration<'_>,
    ) -> Result<RegistrationResult, CeremonyError> {
        let FinishRegistration {
            options,
            response,
            token_binding_id,
        } = ceremony;

        debug!(step = %RegistrationStep::ParseResponse, "registration step");
        check_id(&response.id, &response.raw_id)?;
        let client_data = CollectedClientData::from_json(&response.response.client_data_json)?;
        let attestation = AttestationObject::from_bytes(&response.response.attestation_object)?;
        let auth_data = &attestation.auth_data;

        debug!(step = %RegistrationStep::ValidateClientData, "registration step");
        validate_client_data(
            &client_data,
            &ExpectedClientData {
                ceremony_type: ClientDataType::Create,
                challenge: &options.challenge,
                origins: &self.config.origins,
                token_binding_id,
                token_binding_policy: self.config.token_binding_policy,
            },
        )?;

        debug!(step = %RegistrationStep::VerifyRpIdHash, "registration step");
        verify_rp_id_hash(auth_data, &options.rp.id)?;

        debug!(step = %RegistrationStep::CheckUserPresentFlag, "registration step");
        let flags = auth_data.flags();
        check_user_flags(flags, options.user_verification())?;

        debug!(step = %RegistrationStep::ParseAttestedCredentialData, "registration step");
        let attested = auth_data
            .attested_credential_data()
            .ok_or(CeremonyError::MissingAttestedCredentialData)?;
        if attested.credential_id.as_slice() != response.raw_id.as_slice() {
            return Err(CeremonyError::CredentialIdMismatch);
        }
        let algorithm = attested.credential_public_key.algorithm;
        if !options
            .pub_key_cred_params
            .iter()
            .any(|parameters| parameters.alg == algorithm)
        {
            return Err(CeremonyError::UnrequestedAlgorithm(algorithm));
        }

        debug!(
            step = %RegistrationStep::DispatchAttestationVerifier,
            format = %attestation.format,
            "registration step"
        );
        let format = AttestationFormat::from(attestation.format.as_str());
        if matches!(format, AttestationFormat::Unknown(_))
            && self.config.unknown_attestation == UnknownAttestationPolicy::Reject
        {
            return Err(CeremonyError::UnsupportedAttestationFormat(
                attestation.format.clone(),
            ));
        }
        let client_data_hash = Sha256::digest(&response.response.client_data_json);
        let statement = verify_statement(&format, &attestation.statement, auth_data, &client_data_hash)?;
        let aaguid = Some(&attested.aaguid).filter(|aaguid| **aaguid != Aaguid::ZERO);
        let verdict = evaluate_trust(statement, &format, aaguid, self.trust_roots.as_ref()).await?;
        if !verdict.trustworthy && !self.config.allow_untrusted_attestation {
            return Err(CeremonyError::UntrustedAttestation);
        }

        debug!(step = %RegistrationStep::CheckCredentialIdUnique, "registration step");
        if self
            .repository
            .exists_anywhere(&attested.credential_id)
            .await
            .map_err(repository_error)?
        {
            return Err(CeremonyError::CredentialIdAlreadyRegistered);
        }

        debug!(
            attestation_type = ?verdict.attestation_type,
            trustworthy = verdict.trustworthy,
            "registration verified"
        );
        Ok(RegistrationResult {
            credential: RegisteredCredential {
                credential_id: attested.credential_id.clone().into(),
                user_handle: options.user.id().clone(),
                public_key: attested.credential_public_key.clone(),
                public_key_bytes: attested.credential_public_key_bytes.clone().into(),
                signature_count: auth_data.counter(),
                aaguid: attested.aaguid,
            },
            warnings: verdict.warnings.clone(),
            attestation: verdict,
            user_verified: flags.user_verified(),
            backup_eligible: flags.backup_eligible(),
            backed_up: flags.backed_up(),
        })
    }
}
