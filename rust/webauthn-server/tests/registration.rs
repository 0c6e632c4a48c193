//! End-to-end registration ceremonies against a software authenticator.
mod registration {
    use pretty_assertions::assert_eq;
    use testresult::TestResult;
    use webauthn_common::helpers::{
        SeededRandom, SoftAuthenticator, TEST_AAGUID, attestation_object, authenticator_data,
        client_data_json, flags,
    };
    use webauthn_server::{
        Aaguid, AttestationType, AuthenticatorSelectionCriteria, CeremonyError, CoseAlgorithm,
        CreatedPublicKeyCredential, ErrorKind, FinishRegistration, InMemoryRepository,
        PublicKeyCredentialCreationOptions, RegisteredCredential, RelyingParty, RelyingPartyConfig,
        RelyingPartyIdentity, StaticTrustRoots, UnknownAttestationPolicy,
        UserVerificationRequirement,
    };

    const RP_ID: &str = "example.com";
    const ORIGIN: &str = "https://example.com";

    type Party = RelyingParty<InMemoryRepository, StaticTrustRoots, SeededRandom>;

    fn relying_party(configure: impl FnOnce(RelyingPartyConfig) -> RelyingPartyConfig) -> Party {
        let config = RelyingPartyConfig::new(RelyingPartyIdentity::new(RP_ID, "Example"), [ORIGIN]);
        RelyingParty::new(configure(config), InMemoryRepository::new())
            .expect("valid configuration")
            .with_random(SeededRandom::new(5))
    }

    fn options(relying_party: &Party) -> PublicKeyCredentialCreationOptions {
        let user = relying_party.new_user("alice", "Alice");
        relying_party
            .start_registration(relying_party.registration_request(user))
            .expect("options")
    }

    /// What the client and authenticator put into a registration response.
    struct Response {
        authenticator: SoftAuthenticator,
        ceremony_type: &'static str,
        origin: &'static str,
        rp_id: &'static str,
        flags: u8,
        challenge: Option<Vec<u8>>,
        format: &'static str,
    }

    impl Default for Response {
        fn default() -> Self {
            Self {
                authenticator: SoftAuthenticator::new(1),
                ceremony_type: "webauthn.create",
                origin: ORIGIN,
                rp_id: RP_ID,
                flags: flags::UP | flags::UV,
                challenge: None,
                format: "none",
            }
        }
    }

    impl Response {
        fn to(&self, options: &PublicKeyCredentialCreationOptions) -> CreatedPublicKeyCredential {
            let challenge = self
                .challenge
                .clone()
                .unwrap_or_else(|| options.challenge.to_vec());
            let client_data = client_data_json(self.ceremony_type, &challenge, self.origin);
            let auth_data = self
                .authenticator
                .registration_authenticator_data(self.rp_id, self.flags, 0);
            let attestation = match self.format {
                "none" => self.authenticator.none_attestation(&auth_data),
                "packed" => self.authenticator.self_attestation(&auth_data, &client_data),
                other => attestation_object(other, &auth_data, Vec::new()),
            };
            CreatedPublicKeyCredential::new(self.authenticator.credential_id(), client_data, attestation)
        }
    }

    async fn finish(
        relying_party: &Party,
        options: &PublicKeyCredentialCreationOptions,
        response: &Response,
    ) -> Result<webauthn_server::RegistrationResult, CeremonyError> {
        let credential = response.to(options);
        relying_party
            .finish_registration(FinishRegistration::new(options, &credential))
            .await
    }

    #[test_log::test(tokio::test)]
    async fn it_registers_a_credential_with_none_attestation() -> TestResult {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response::default();

        let result = finish(&relying_party, &options, &response).await?;

        assert_eq!(result.attestation.attestation_type, AttestationType::None);
        assert!(!result.attestation.trustworthy);
        assert!(result.warnings.is_empty());
        assert!(result.user_verified);
        assert!(!result.backup_eligible);
        assert!(!result.backed_up);

        let credential = result.credential;
        assert_eq!(credential.signature_count, 0);
        assert_eq!(credential.credential_id.as_slice(), response.authenticator.credential_id());
        assert_eq!(&credential.user_handle, options.user.id());
        assert_eq!(
            credential.public_key_bytes.as_slice(),
            response.authenticator.cose_public_key().as_slice()
        );
        assert_eq!(credential.public_key.algorithm, CoseAlgorithm::Es256);
        assert_eq!(credential.aaguid, Aaguid(TEST_AAGUID));

        assert!(relying_party.repository().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_backup_flags() -> TestResult {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response {
            flags: flags::UP | flags::BE | flags::BS,
            ..Response::default()
        };

        let result = finish(&relying_party, &options, &response).await?;

        assert!(!result.user_verified);
        assert!(result.backup_eligible);
        assert!(result.backed_up);
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_client_data_for_another_ceremony() {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);

        let stale = Response {
            challenge: Some(vec![0u8; 32]),
            ..Response::default()
        };
        assert_eq!(
            finish(&relying_party, &options, &stale).await,
            Err(CeremonyError::ChallengeMismatch)
        );

        let foreign = Response {
            origin: "https://evil.example",
            ..Response::default()
        };
        assert_eq!(
            finish(&relying_party, &options, &foreign).await,
            Err(CeremonyError::OriginMismatch("https://evil.example".into()))
        );

        let assertion = Response {
            ceremony_type: "webauthn.get",
            ..Response::default()
        };
        assert_eq!(
            finish(&relying_party, &options, &assertion).await,
            Err(CeremonyError::TypeMismatch {
                expected: "webauthn.create".into(),
                received: "webauthn.get".into()
            })
        );
    }

    #[tokio::test]
    async fn it_rejects_credentials_scoped_to_another_rp_id() {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response {
            rp_id: "evil.example",
            ..Response::default()
        };
        assert_eq!(
            finish(&relying_party, &options, &response).await,
            Err(CeremonyError::RpIdHashMismatch)
        );
    }

    #[tokio::test]
    async fn it_requires_user_presence() {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response {
            flags: flags::UV,
            ..Response::default()
        };
        assert_eq!(
            finish(&relying_party, &options, &response).await,
            Err(CeremonyError::UserPresenceRequired)
        );
    }

    #[tokio::test]
    async fn it_requires_user_verification_only_when_requested() -> TestResult {
        let relying_party = relying_party(|config| config);
        let present_only = Response {
            flags: flags::UP,
            ..Response::default()
        };

        let preferred = options(&relying_party);
        assert!(finish(&relying_party, &preferred, &present_only).await.is_ok());

        let user = relying_party.new_user("bob", "Bob");
        let required = relying_party.start_registration(
            relying_party
                .registration_request(user)
                .with_authenticator_selection(AuthenticatorSelectionCriteria {
                    user_verification: UserVerificationRequirement::Required,
                    ..AuthenticatorSelectionCriteria::default()
                }),
        )?;
        assert_eq!(
            finish(&relying_party, &required, &present_only).await,
            Err(CeremonyError::UserVerificationRequired)
        );
        Ok(())
    }

    #[tokio::test]
    async fn it_requires_attested_credential_data() {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let authenticator = SoftAuthenticator::new(1);
        let auth_data = authenticator_data(RP_ID, flags::UP, 0, None, None);
        let credential = CreatedPublicKeyCredential::new(
            authenticator.credential_id(),
            client_data_json("webauthn.create", &options.challenge, ORIGIN),
            authenticator.none_attestation(&auth_data),
        );
        assert_eq!(
            relying_party
                .finish_registration(FinishRegistration::new(&options, &credential))
                .await,
            Err(CeremonyError::MissingAttestedCredentialData)
        );
    }

    #[tokio::test]
    async fn raw_id_must_name_the_attested_credential() {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response::default().to(&options);
        let credential = CreatedPublicKeyCredential::new(
            vec![9u8; 16],
            response.response.client_data_json.clone(),
            response.response.attestation_object.clone(),
        );
        assert_eq!(
            relying_party
                .finish_registration(FinishRegistration::new(&options, &credential))
                .await,
            Err(CeremonyError::CredentialIdMismatch)
        );
    }

    #[tokio::test]
    async fn id_must_encode_raw_id() {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let mut credential = Response::default().to(&options);
        credential.id = "not the raw id".into();
        let error = relying_party
            .finish_registration(FinishRegistration::new(&options, &credential))
            .await
            .unwrap_err();
        assert!(matches!(error, CeremonyError::MalformedResponse(_)));
        assert_eq!(error.kind(), ErrorKind::MalformedInput);
    }

    #[tokio::test]
    async fn undecodable_attestation_objects_are_malformed_input() {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let mut credential = Response::default().to(&options);
        credential.response.attestation_object = vec![0xa0].into();
        let error = relying_party
            .finish_registration(FinishRegistration::new(&options, &credential))
            .await
            .unwrap_err();
        assert!(matches!(error, CeremonyError::Codec(_)));
        assert_eq!(error.kind(), ErrorKind::MalformedInput);
    }

    #[tokio::test]
    async fn the_credential_algorithm_must_have_been_offered() {
        let relying_party =
            relying_party(|config| config.with_preferred_algorithms([CoseAlgorithm::Rs256]));
        let options = options(&relying_party);
        assert_eq!(
            finish(&relying_party, &options, &Response::default()).await,
            Err(CeremonyError::UnrequestedAlgorithm(CoseAlgorithm::Es256))
        );
    }

    #[tokio::test]
    async fn it_refuses_credential_ids_registered_before() -> TestResult {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response::default();
        relying_party.repository().insert(RegisteredCredential::from_parts(
            response.authenticator.credential_id(),
            vec![3u8; 16],
            response.authenticator.cose_public_key(),
            7,
            Aaguid(TEST_AAGUID),
        )?);

        let error = finish(&relying_party, &options, &response).await.unwrap_err();
        assert_eq!(error, CeremonyError::CredentialIdAlreadyRegistered);
        assert_eq!(error.kind(), ErrorKind::PolicyViolation);
        Ok(())
    }

    #[tokio::test]
    async fn self_attestation_is_accepted_but_untrusted() -> TestResult {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response {
            format: "packed",
            ..Response::default()
        };

        let result = finish(&relying_party, &options, &response).await?;
        assert_eq!(result.attestation.attestation_type, AttestationType::SelfAttestation);
        assert!(!result.attestation.trustworthy);

        let strict = self::relying_party(|config| config.with_allow_untrusted_attestation(false));
        let options = self::options(&strict);
        assert_eq!(
            finish(&strict, &options, &response).await,
            Err(CeremonyError::UntrustedAttestation)
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_formats_follow_the_configured_policy() -> TestResult {
        let response = Response {
            format: "x-custom",
            ..Response::default()
        };

        let lenient = relying_party(|config| config);
        let options = self::options(&lenient);
        let result = finish(&lenient, &options, &response).await?;
        assert_eq!(result.attestation.attestation_type, AttestationType::Uncertain);
        assert!(!result.attestation.trustworthy);
        assert_eq!(result.warnings.len(), 1);

        let strict = relying_party(|config| config.with_unknown_attestation(UnknownAttestationPolicy::Reject));
        let options = self::options(&strict);
        assert_eq!(
            finish(&strict, &options, &response).await,
            Err(CeremonyError::UnsupportedAttestationFormat("x-custom".into()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn a_verified_registration_can_be_stored_and_asserted_later() -> TestResult {
        let relying_party = relying_party(|config| config);
        let options = options(&relying_party);
        let response = Response::default();
        let result = finish(&relying_party, &options, &response).await?;

        relying_party.repository().insert(result.credential.clone());
        assert_eq!(
            relying_party.repository().get(response.authenticator.credential_id()),
            Some(result.credential)
        );

        let again = self::options(&relying_party);
        assert_eq!(
            finish(&relying_party, &again, &response).await,
            Err(CeremonyError::CredentialIdAlreadyRegistered)
        );
        Ok(())
    }
}
