//! WebAuthn relying-party ceremonies.
//!
//! A [`RelyingParty`] issues options for `navigator.credentials.create()`
//! and `navigator.credentials.get()`, then verifies what the client sends
//! back:
//!
//! - [`RelyingParty::finish_registration`] checks a new credential and its
//!   attestation, yielding a [`RegistrationResult`] the caller stores.
//! - [`RelyingParty::finish_assertion`] checks a signature made with a
//!   stored credential, yielding an [`AssertionResult`].
//!
//! Every rejection is a specific [`CeremonyError`]. Convert it into a
//! [`ServiceError`] before answering a remote client.
//!
//! The relying party keeps no session state: the caller holds on to the
//! issued options until the response arrives and discards them afterwards,
//! so each challenge is used once. Credentials live behind the
//! [`CredentialRepository`] trait; [`InMemoryRepository`] is a reference
//! implementation.

#![warn(missing_docs)]

mod assertion;
mod client_data;
mod config;
mod credential;
mod error;
mod identity;
mod options;
mod registration;
mod relying_party;
mod repository;

pub use assertion::*;
pub use client_data::*;
pub use config::*;
pub use credential::{
    AssertedPublicKeyCredential, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    ClientExtensionOutputs, CreatedPublicKeyCredential, CredentialPropertiesOutput,
};
pub use error::*;
pub use identity::*;
pub use options::*;
pub use registration::*;
pub use relying_party::RelyingParty;
pub use repository::*;

pub use webauthn_attestation::{
    AttestationFormat, AttestationType, AttestationVerdict, StaticTrustRoots, TrustRootResolver,
};
pub use webauthn_codec::{Aaguid, CoseAlgorithm};
pub use webauthn_common::{ByteArray, OsRandom, RandomSource};
