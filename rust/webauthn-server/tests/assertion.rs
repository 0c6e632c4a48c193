//! End-to-end assertion ceremonies against a software authenticator.
mod assertion {
    use pretty_assertions::assert_eq;
    use std::convert::Infallible;
    use std::io;
    use std::sync::{Arc, Mutex};
    use testresult::TestResult;
    use webauthn_common::helpers::{
        SeededRandom, SoftAuthenticator, TEST_AAGUID, client_data_json, flags,
    };
    use webauthn_server::{
        Aaguid, AssertedPublicKeyCredential, AssertionExtensionInputs, AssertionResult,
        CeremonyError, CounterPolicy, CredentialRepository, ErrorKind, FinishAssertion,
        InMemoryRepository, PublicKeyCredentialDescriptor, PublicKeyCredentialRequestOptions,
        RegisteredCredential, RelyingParty, RelyingPartyConfig, RelyingPartyIdentity,
        ServiceError, StaticTrustRoots, UserVerificationRequirement,
    };

    const RP_ID: &str = "example.com";
    const ORIGIN: &str = "https://example.com";
    const USER_HANDLE: [u8; 16] = [7u8; 16];

    /// Records every counter update and optionally refuses them, as a store
    /// would after losing a race.
    #[derive(Debug, Clone, Default)]
    struct RecordingRepository {
        inner: InMemoryRepository,
        updates: Arc<Mutex<Vec<(Vec<u8>, u32, u32)>>>,
        conflicting: bool,
    }

    impl RecordingRepository {
        fn updates(&self) -> Vec<(Vec<u8>, u32, u32)> {
            self.updates.lock().unwrap().clone()
        }
    }

    impl CredentialRepository for RecordingRepository {
        type Error = Infallible;

        async fn lookup(&self, credential_id: &[u8]) -> Result<Option<RegisteredCredential>, Infallible> {
            self.inner.lookup(credential_id).await
        }

        async fn exists_anywhere(&self, credential_id: &[u8]) -> Result<bool, Infallible> {
            self.inner.exists_anywhere(credential_id).await
        }

        async fn update_counter(
            &self,
            credential_id: &[u8],
            expected: u32,
            new: u32,
        ) -> Result<bool, Infallible> {
            self.updates
                .lock()
                .unwrap()
                .push((credential_id.to_vec(), expected, new));
            if self.conflicting {
                return Ok(false);
            }
            self.inner.update_counter(credential_id, expected, new).await
        }
    }

    /// A store that cannot be reached.
    struct OfflineRepository;

    impl CredentialRepository for OfflineRepository {
        type Error = io::Error;

        async fn lookup(&self, _: &[u8]) -> Result<Option<RegisteredCredential>, io::Error> {
            Err(io::Error::other("storage offline"))
        }

        async fn exists_anywhere(&self, _: &[u8]) -> Result<bool, io::Error> {
            Err(io::Error::other("storage offline"))
        }

        async fn update_counter(&self, _: &[u8], _: u32, _: u32) -> Result<bool, io::Error> {
            Err(io::Error::other("storage offline"))
        }
    }

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig::new(RelyingPartyIdentity::new(RP_ID, "Example"), [ORIGIN])
    }

    struct Fixture {
        authenticator: SoftAuthenticator,
        relying_party: RelyingParty<RecordingRepository, StaticTrustRoots, SeededRandom>,
    }

    impl Fixture {
        fn new(stored_counter: u32) -> Self {
            Self::with(stored_counter, RecordingRepository::default(), config())
        }

        fn with(stored_counter: u32, repository: RecordingRepository, config: RelyingPartyConfig) -> Self {
            let authenticator = SoftAuthenticator::new(1);
            repository.inner.insert(
                RegisteredCredential::from_parts(
                    authenticator.credential_id(),
                    USER_HANDLE,
                    authenticator.cose_public_key(),
                    stored_counter,
                    Aaguid(TEST_AAGUID),
                )
                .expect("valid key"),
            );
            let relying_party = RelyingParty::new(config, repository)
                .expect("valid configuration")
                .with_random(SeededRandom::new(8));
            Self {
                authenticator,
                relying_party,
            }
        }

        fn repository(&self) -> &RecordingRepository {
            self.relying_party.repository()
        }

        fn stored_counter(&self) -> Option<u32> {
            self.repository()
                .inner
                .get(self.authenticator.credential_id())
                .map(|credential| credential.signature_count)
        }

        fn options(&self) -> PublicKeyCredentialRequestOptions {
            let allowed = PublicKeyCredentialDescriptor::new(self.authenticator.credential_id());
            self.relying_party
                .start_assertion(self.relying_party.assertion_request().with_allow_credentials([allowed]))
                .expect("options")
        }

        fn respond(
            &self,
            options: &PublicKeyCredentialRequestOptions,
            counter: u32,
        ) -> AssertedPublicKeyCredential {
            self.respond_as(&self.authenticator, options, RP_ID, flags::UP | flags::UV, counter)
        }

        fn respond_as(
            &self,
            signer: &SoftAuthenticator,
            options: &PublicKeyCredentialRequestOptions,
            rp_id: &str,
            flags: u8,
            counter: u32,
        ) -> AssertedPublicKeyCredential {
            let client_data = client_data_json("webauthn.get", &options.challenge, ORIGIN);
            let auth_data = self
                .authenticator
                .assertion_authenticator_data(rp_id, flags, counter);
            let signature = signer.assert(&auth_data, &client_data);
            AssertedPublicKeyCredential::new(
                self.authenticator.credential_id(),
                client_data,
                auth_data,
                signature,
                Some(USER_HANDLE.into()),
            )
        }

        async fn finish(
            &self,
            options: &PublicKeyCredentialRequestOptions,
            credential: &AssertedPublicKeyCredential,
        ) -> Result<AssertionResult, CeremonyError> {
            self.relying_party
                .finish_assertion(FinishAssertion::new(options, credential))
                .await
        }
    }

    #[test_log::test(tokio::test)]
    async fn it_accepts_an_advancing_counter_and_persists_it() -> TestResult {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let credential = fixture.respond(&options, 6);

        let result = fixture.finish(&options, &credential).await?;

        assert_eq!(
            result,
            AssertionResult {
                credential_id: fixture.authenticator.credential_id().into(),
                user_handle: USER_HANDLE.into(),
                signature_count: 6,
                signature_counter_valid: true,
                user_verified: true,
                backup_eligible: false,
                backed_up: false,
                warnings: Vec::new(),
            }
        );
        assert_eq!(
            fixture.repository().updates(),
            vec![(fixture.authenticator.credential_id().to_vec(), 5, 6)]
        );
        assert_eq!(fixture.stored_counter(), Some(6));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn it_detects_a_regressed_counter_without_touching_the_store() {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let credential = fixture.respond(&options, 3);

        let error = fixture.finish(&options, &credential).await.unwrap_err();

        assert_eq!(
            error,
            CeremonyError::PossibleCredentialCloning {
                stored: 5,
                received: 3
            }
        );
        assert_eq!(error.kind(), ErrorKind::PolicyViolation);
        assert!(fixture.repository().updates().is_empty());
        assert_eq!(fixture.stored_counter(), Some(5));
    }

    #[tokio::test]
    async fn a_repeated_non_zero_counter_is_a_regression() {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let credential = fixture.respond(&options, 5);
        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::PossibleCredentialCloning {
                stored: 5,
                received: 5
            })
        );
    }

    #[tokio::test]
    async fn authenticators_without_counters_report_zero() -> TestResult {
        let fixture = Fixture::new(0);
        let options = fixture.options();
        let credential = fixture.respond(&options, 0);

        let result = fixture.finish(&options, &credential).await?;

        assert!(result.signature_counter_valid);
        assert_eq!(result.signature_count, 0);
        assert!(fixture.repository().updates().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn flag_and_accept_lets_a_regressed_counter_through() -> TestResult {
        let fixture = Fixture::with(
            5,
            RecordingRepository::default(),
            config().with_counter_policy(CounterPolicy::FlagAndAccept),
        );
        let options = fixture.options();
        let credential = fixture.respond(&options, 3);

        let result = fixture.finish(&options, &credential).await?;

        assert!(!result.signature_counter_valid);
        assert_eq!(result.signature_count, 3);
        assert_eq!(result.warnings.len(), 1);
        assert!(fixture.repository().updates().is_empty());
        assert_eq!(fixture.stored_counter(), Some(5));
        Ok(())
    }

    #[tokio::test]
    async fn a_lost_counter_race_is_a_conflict() {
        let repository = RecordingRepository {
            conflicting: true,
            ..RecordingRepository::default()
        };
        let fixture = Fixture::with(5, repository, config());
        let options = fixture.options();
        let credential = fixture.respond(&options, 6);

        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::CounterUpdateConflict)
        );
        assert_eq!(fixture.repository().updates().len(), 1);
    }

    #[tokio::test]
    async fn signatures_must_come_from_the_stored_key() {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let impostor = SoftAuthenticator::new(2);
        let credential = fixture.respond_as(&impostor, &options, RP_ID, flags::UP, 6);

        let error = fixture.finish(&options, &credential).await.unwrap_err();

        assert_eq!(error, CeremonyError::SignatureInvalid);
        assert_eq!(error.kind(), ErrorKind::CryptoFailure);
        assert!(fixture.repository().updates().is_empty());
        assert_eq!(fixture.stored_counter(), Some(5));
    }

    #[tokio::test]
    async fn tampered_authenticator_data_breaks_the_signature() {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let mut credential = fixture.respond(&options, 6);
        let mut auth_data = credential.response.authenticator_data.to_vec();
        auth_data[36] = 9;
        credential.response.authenticator_data = auth_data.into();

        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::SignatureInvalid)
        );
        assert!(fixture.repository().updates().is_empty());
    }

    #[tokio::test]
    async fn credentials_outside_the_allow_list_are_unknown() -> TestResult {
        let fixture = Fixture::new(5);
        let options = fixture.relying_party.start_assertion(
            fixture
                .relying_party
                .assertion_request()
                .with_allow_credentials([PublicKeyCredentialDescriptor::new(vec![9u8; 16])]),
        )?;
        let credential = fixture.respond(&options, 6);
        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::UnknownCredential)
        );
        Ok(())
    }

    #[tokio::test]
    async fn unregistered_credentials_are_unknown() {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let stranger = SoftAuthenticator::new(3);
        let client_data = client_data_json("webauthn.get", &options.challenge, ORIGIN);
        let auth_data = stranger.assertion_authenticator_data(RP_ID, flags::UP, 1);
        let credential = AssertedPublicKeyCredential::new(
            stranger.credential_id(),
            client_data.clone(),
            auth_data.clone(),
            stranger.assert(&auth_data, &client_data),
            None,
        );
        let options = PublicKeyCredentialRequestOptions {
            allow_credentials: vec![PublicKeyCredentialDescriptor::new(stranger.credential_id())],
            ..options
        };
        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::UnknownCredential)
        );
    }

    #[tokio::test]
    async fn the_user_handle_must_match_the_owner() {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let mut credential = fixture.respond(&options, 6);
        credential.response.user_handle = Some(vec![1u8; 16].into());
        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::UserHandleMismatch)
        );
    }

    #[tokio::test]
    async fn discoverable_assertions_need_a_user_handle() -> TestResult {
        let fixture = Fixture::new(5);
        let options = fixture
            .relying_party
            .start_assertion(fixture.relying_party.assertion_request())?;

        let mut anonymous = fixture.respond(&options, 6);
        anonymous.response.user_handle = Some(Vec::<u8>::new().into());
        assert_eq!(
            fixture.finish(&options, &anonymous).await,
            Err(CeremonyError::MissingUserHandle)
        );

        let identified = fixture.respond(&options, 6);
        let result = fixture.finish(&options, &identified).await?;
        assert_eq!(result.user_handle.as_slice(), &USER_HANDLE);
        Ok(())
    }

    #[tokio::test]
    async fn user_verification_is_enforced_when_required() -> TestResult {
        let fixture = Fixture::new(5);
        let options = fixture.relying_party.start_assertion(
            fixture
                .relying_party
                .assertion_request()
                .with_allow_credentials([PublicKeyCredentialDescriptor::new(
                    fixture.authenticator.credential_id(),
                )])
                .with_user_verification(UserVerificationRequirement::Required),
        )?;
        let credential = fixture.respond_as(&fixture.authenticator, &options, RP_ID, flags::UP, 6);
        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::UserVerificationRequired)
        );
        Ok(())
    }

    #[tokio::test]
    async fn legacy_credentials_may_sign_for_their_app_id() -> TestResult {
        const APP_ID: &str = "https://example.com/u2f/app-id.json";
        let fixture = Fixture::new(5);
        let allowed = PublicKeyCredentialDescriptor::new(fixture.authenticator.credential_id());
        let options = fixture.relying_party.start_assertion(
            fixture
                .relying_party
                .assertion_request()
                .with_allow_credentials([allowed])
                .with_extensions(AssertionExtensionInputs {
                    appid: Some(APP_ID.into()),
                }),
        )?;

        let mut credential = fixture.respond_as(&fixture.authenticator, &options, APP_ID, flags::UP, 6);
        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::RpIdHashMismatch)
        );

        credential.client_extension_results.appid = Some(true);
        let result = fixture.finish(&options, &credential).await?;
        assert_eq!(result.signature_count, 6);
        Ok(())
    }

    #[tokio::test]
    async fn unexpected_token_binding_is_rejected_by_default() -> TestResult {
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let client_data = serde_json::to_vec(&serde_json::json!({
            "type": "webauthn.get",
            "challenge": options.challenge.to_base64url(),
            "origin": ORIGIN,
            "tokenBinding": {"status": "present", "id": "AQID"},
        }))?;
        let auth_data = fixture
            .authenticator
            .assertion_authenticator_data(RP_ID, flags::UP, 6);
        let signature = fixture.authenticator.assert(&auth_data, &client_data);
        let credential = AssertedPublicKeyCredential::new(
            fixture.authenticator.credential_id(),
            client_data,
            auth_data,
            signature,
            None,
        );

        assert_eq!(
            fixture.finish(&options, &credential).await,
            Err(CeremonyError::TokenBindingMismatch)
        );

        let bound = fixture
            .relying_party
            .finish_assertion(FinishAssertion::new(&options, &credential).with_token_binding_id("AQID"))
            .await?;
        assert_eq!(bound.signature_count, 6);
        Ok(())
    }

    #[tokio::test]
    async fn repository_failures_are_retryable() -> TestResult {
        let relying_party = RelyingParty::new(config(), OfflineRepository)?;
        let fixture = Fixture::new(5);
        let options = fixture.options();
        let credential = fixture.respond(&options, 6);

        let error = relying_party
            .finish_assertion(FinishAssertion::new(&options, &credential))
            .await
            .unwrap_err();

        assert_eq!(error, CeremonyError::Repository("storage offline".into()));
        assert!(error.kind().is_retryable());
        assert_eq!(ServiceError::from(&error).status_code(), 503);
        Ok(())
    }

    #[tokio::test]
    async fn responses_for_another_challenge_are_rejected() {
        let fixture = Fixture::new(5);
        let issued = fixture.options();
        let other = fixture.options();
        let credential = fixture.respond(&other, 6);
        assert_eq!(
            fixture.finish(&issued, &credential).await,
            Err(CeremonyError::ChallengeMismatch)
        );
        assert!(fixture.repository().updates().is_empty());
    }
}
