//! Relying-party configuration.

use crate::{
    AttestationConveyancePreference, ConfigError, DEFAULT_CHALLENGE_LENGTH, MIN_CHALLENGE_LENGTH,
    RelyingPartyIdentity, TokenBindingPolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;
use webauthn_codec::CoseAlgorithm;

/// What to do when an assertion's signature counter did not advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CounterPolicy {
    /// Fail with [`CeremonyError::PossibleCredentialCloning`](crate::CeremonyError::PossibleCredentialCloning).
    #[default]
    Reject,
    /// Succeed, but mark the counter invalid and add a warning.
    FlagAndAccept,
}

/// What to do with an attestation format this library does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownAttestationPolicy {
    /// Register the credential with an uncertain, untrusted attestation.
    #[default]
    AcceptUncertain,
    /// Fail with [`CeremonyError::UnsupportedAttestationFormat`](crate::CeremonyError::UnsupportedAttestationFormat).
    Reject,
}

/// Settings for a [`RelyingParty`](crate::RelyingParty).
///
/// Only `identity` and `origins` have no default. A configuration is
/// checked with [`RelyingPartyConfig::validate`] when a relying party is
/// built from it.
///
/// ```
/// # use webauthn_server::{RelyingPartyConfig, RelyingPartyIdentity, CounterPolicy};
/// let config = RelyingPartyConfig::new(
///     RelyingPartyIdentity::new("example.com", "Example"),
///     ["https://login.example.com"],
/// )
/// .with_counter_policy(CounterPolicy::FlagAndAccept);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RelyingPartyConfig {
    /// The relying party.
    pub identity: RelyingPartyIdentity,
    /// Origins client data may come from, matched exactly.
    pub origins: BTreeSet<String>,
    /// Length of generated challenges in bytes.
    #[serde(default = "default_challenge_length")]
    pub challenge_length: usize,
    /// Algorithms offered at registration, most preferred first.
    #[serde(default = "default_algorithms")]
    pub preferred_algorithms: Vec<CoseAlgorithm>,
    /// Ceremony timeout hint in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Attestation conveyance preference for registration.
    #[serde(default)]
    pub attestation: AttestationConveyancePreference,
    /// Handling of token binding nobody asked for.
    #[serde(default)]
    pub token_binding_policy: TokenBindingPolicy,
    /// Handling of signature counters that did not advance.
    #[serde(default)]
    pub counter_policy: CounterPolicy,
    /// Handling of unknown attestation formats.
    #[serde(default)]
    pub unknown_attestation: UnknownAttestationPolicy,
    /// Whether to register credentials whose attestation is not trusted.
    #[serde(default = "default_allow_untrusted")]
    pub allow_untrusted_attestation: bool,
}

fn default_challenge_length() -> usize {
    DEFAULT_CHALLENGE_LENGTH
}

fn default_algorithms() -> Vec<CoseAlgorithm> {
    vec![CoseAlgorithm::Es256, CoseAlgorithm::EdDsa, CoseAlgorithm::Rs256]
}

fn default_allow_untrusted() -> bool {
    true
}

impl RelyingPartyConfig {
    /// A configuration accepting `origins`, with every other setting at its
    /// default.
    pub fn new<I, S>(identity: RelyingPartyIdentity, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity,
            origins: origins.into_iter().map(Into::into).collect(),
            challenge_length: default_challenge_length(),
            preferred_algorithms: default_algorithms(),
            timeout: None,
            attestation: AttestationConveyancePreference::default(),
            token_binding_policy: TokenBindingPolicy::default(),
            counter_policy: CounterPolicy::default(),
            unknown_attestation: UnknownAttestationPolicy::default(),
            allow_untrusted_attestation: default_allow_untrusted(),
        }
    }

    /// Set the challenge length.
    pub fn with_challenge_length(mut self, length: usize) -> Self {
        self.challenge_length = length;
        self
    }

    /// Set the algorithms offered at registration.
    pub fn with_preferred_algorithms(
        mut self,
        algorithms: impl IntoIterator<Item = CoseAlgorithm>,
    ) -> Self {
        self.preferred_algorithms = algorithms.into_iter().collect();
        self
    }

    /// Set the timeout hint.
    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the attestation conveyance preference.
    pub fn with_attestation(mut self, attestation: AttestationConveyancePreference) -> Self {
        self.attestation = attestation;
        self
    }

    /// Set the token binding policy.
    pub fn with_token_binding_policy(mut self, policy: TokenBindingPolicy) -> Self {
        self.token_binding_policy = policy;
        self
    }

    /// Set the counter policy.
    pub fn with_counter_policy(mut self, policy: CounterPolicy) -> Self {
        self.counter_policy = policy;
        self
    }

    /// Set the unknown attestation format policy.
    pub fn with_unknown_attestation(mut self, policy: UnknownAttestationPolicy) -> Self {
        self.unknown_attestation = policy;
        self
    }

    /// Set whether untrusted attestation is accepted.
    pub fn with_allow_untrusted_attestation(mut self, allow: bool) -> Self {
        self.allow_untrusted_attestation = allow;
        self
    }

    /// Check the configuration.
    ///
    /// Every origin must be an `https` URL, or `http` on `localhost`, whose
    /// host is the RP ID or a subdomain of it.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origins.is_empty() {
            return Err(ConfigError::NoOrigins);
        }
        for origin in &self.origins {
            self.validate_origin(origin)?;
        }
        if self.challenge_length < MIN_CHALLENGE_LENGTH {
            return Err(ConfigError::ChallengeTooShort(self.challenge_length));
        }
        Ok(())
    }

    fn validate_origin(&self, origin: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidOrigin {
            origin: origin.to_owned(),
            reason: reason.to_owned(),
        };
        let url = Url::parse(origin).map_err(|error| invalid(&error.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("no host"))?;

        match url.scheme() {
            "https" => {}
            "http" if host == "localhost" => {}
            _ => return Err(invalid("scheme must be https")),
        }

        let rp_id = self.identity.id.as_str();
        let within = host == rp_id
            || host
                .strip_suffix(rp_id)
                .is_some_and(|prefix| prefix.ends_with('.'));
        if !within {
            return Err(ConfigError::OriginOutsideRpId {
                origin: origin.to_owned(),
                rp_id: rp_id.to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(origins: &[&str]) -> RelyingPartyConfig {
        RelyingPartyConfig::new(
            RelyingPartyIdentity::new("example.com", "Example"),
            origins.iter().copied(),
        )
    }

    #[test]
    fn it_accepts_the_rp_id_and_its_subdomains() {
        assert_eq!(
            config(&["https://example.com", "https://login.example.com:8443"]).validate(),
            Ok(())
        );
    }

    #[test]
    fn it_rejects_lookalike_hosts() {
        assert_eq!(
            config(&["https://badexample.com"]).validate(),
            Err(ConfigError::OriginOutsideRpId {
                origin: "https://badexample.com".into(),
                rp_id: "example.com".into()
            })
        );
    }

    #[test]
    fn plain_http_is_only_accepted_on_localhost() {
        let localhost = RelyingPartyConfig::new(
            RelyingPartyIdentity::new("localhost", "Dev"),
            ["http://localhost:8080"],
        );
        assert_eq!(localhost.validate(), Ok(()));

        assert!(matches!(
            config(&["http://example.com"]).validate(),
            Err(ConfigError::InvalidOrigin { .. })
        ));
    }

    #[test]
    fn it_requires_origins_and_long_challenges() {
        assert_eq!(config(&[]).validate(), Err(ConfigError::NoOrigins));
        assert_eq!(
            config(&["https://example.com"])
                .with_challenge_length(8)
                .validate(),
            Err(ConfigError::ChallengeTooShort(8))
        );
        assert!(matches!(
            config(&["not a url"]).validate(),
            Err(ConfigError::InvalidOrigin { .. })
        ));
    }

    #[test]
    fn deserialization_fills_in_defaults() {
        let json = r#"{
            "identity": {"id": "example.com", "name": "Example"},
            "origins": ["https://example.com"],
            "counter_policy": "flag-and-accept"
        }"#;
        let parsed: RelyingPartyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            config(&["https://example.com"]).with_counter_policy(CounterPolicy::FlagAndAccept)
        );
        assert!(parsed.allow_untrusted_attestation);
        assert_eq!(parsed.challenge_length, 32);
    }
}
