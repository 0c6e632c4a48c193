use crate::{
    AssertionRequest, CeremonyError, ConfigError, CredentialRepository, OptionsError,
    PublicKeyCredentialCreationOptions, PublicKeyCredentialRequestOptions, RegistrationRequest,
    RelyingPartyConfig, UserIdentity, UserVerificationRequirement, start_assertion,
    start_registration,
};
use sha2::{Digest, Sha256};
use webauthn_attestation::StaticTrustRoots;
use webauthn_codec::{AuthenticatorData, AuthenticatorFlags};
use webauthn_common::{OsRandom, RandomSource};

/// A relying party: configuration plus the collaborators its ceremonies
/// consult.
///
/// - `S` stores registered credentials.
/// - `R` resolves attestation trust roots. Without one, every certificate
///   chain is reported untrusted.
/// - `G` supplies challenge bytes.
///
/// A relying party holds no per-ceremony state. The caller keeps the
/// options it issued and hands them back when the response arrives.
#[derive(Debug, Clone)]
pub struct RelyingParty<S, R = StaticTrustRoots, G = OsRandom> {
    pub(crate) config: RelyingPartyConfig,
    pub(crate) repository: S,
    pub(crate) trust_roots: Option<R>,
    pub(crate) random: G,
}

impl<S: CredentialRepository> RelyingParty<S> {
    /// Create a relying party without trust roots, drawing challenges from
    /// the operating system.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not [validate](RelyingPartyConfig::validate).
    pub fn new(config: RelyingPartyConfig, repository: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            repository,
            trust_roots: None,
            random: OsRandom,
        })
    }
}

impl<S, R, G> RelyingParty<S, R, G> {
    /// Evaluate attestation chains against `trust_roots`.
    pub fn with_trust_roots<T>(self, trust_roots: T) -> RelyingParty<S, T, G> {
        RelyingParty {
            config: self.config,
            repository: self.repository,
            trust_roots: Some(trust_roots),
            random: self.random,
        }
    }

    /// Draw challenges from `random`.
    pub fn with_random<H>(self, random: H) -> RelyingParty<S, R, H> {
        RelyingParty {
            config: self.config,
            repository: self.repository,
            trust_roots: self.trust_roots,
            random,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    /// The credential repository.
    pub fn repository(&self) -> &S {
        &self.repository
    }
}

impl<S, R, G: RandomSource> RelyingParty<S, R, G> {
    /// A registration request for `user` carrying the configured identity,
    /// algorithms, attestation preference, timeout and challenge length.
    pub fn registration_request(&self, user: UserIdentity) -> RegistrationRequest {
        RegistrationRequest::new(
            self.config.identity.clone(),
            user,
            self.config.preferred_algorithms.iter().copied(),
        )
        .with_attestation(self.config.attestation)
        .with_timeout(self.config.timeout)
        .with_challenge_length(self.config.challenge_length)
    }

    /// Generate registration options with a fresh challenge.
    ///
    /// # Errors
    ///
    /// See [`start_registration`].
    pub fn start_registration(
        &self,
        request: RegistrationRequest,
    ) -> Result<PublicKeyCredentialCreationOptions, OptionsError> {
        start_registration(request, &self.random)
    }

    /// An assertion request carrying the configured RP ID, timeout and
    /// challenge length.
    pub fn assertion_request(&self) -> AssertionRequest {
        AssertionRequest::new(self.config.identity.id.clone())
            .with_timeout(self.config.timeout)
            .with_challenge_length(self.config.challenge_length)
    }

    /// Generate assertion options with a fresh challenge.
    ///
    /// # Errors
    ///
    /// See [`start_assertion`].
    pub fn start_assertion(
        &self,
        request: AssertionRequest,
    ) -> Result<PublicKeyCredentialRequestOptions, OptionsError> {
        start_assertion(request, &self.random)
    }

    /// A user identity with a fresh random handle.
    pub fn new_user(&self, name: impl Into<String>, display_name: impl Into<String>) -> UserIdentity {
        UserIdentity::generate(&self.random, name, display_name)
    }
}

pub(crate) fn verify_rp_id_hash(auth_data: &AuthenticatorData, rp_id: &str) -> Result<(), CeremonyError> {
    let expected = Sha256::digest(rp_id.as_bytes());
    if auth_data.rp_id_hash().as_slice() == expected.as_slice() {
        Ok(())
    } else {
        Err(CeremonyError::RpIdHashMismatch)
    }
}

pub(crate) fn check_user_flags(
    flags: AuthenticatorFlags,
    user_verification: UserVerificationRequirement,
) -> Result<(), CeremonyError> {
    if !flags.user_present() {
        return Err(CeremonyError::UserPresenceRequired);
    }
    if user_verification == UserVerificationRequirement::Required && !flags.user_verified() {
        return Err(CeremonyError::UserVerificationRequired);
    }
    Ok(())
}

pub(crate) fn repository_error(error: impl std::error::Error) -> CeremonyError {
    CeremonyError::Repository(error.to_string())
}
