//! Registered credentials and the repository that holds them.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use webauthn_codec::{Aaguid, CodecError, CoseKey};
use webauthn_common::ByteArray;

/// A credential as stored after a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCredential {
    /// Credential ID.
    pub credential_id: ByteArray,
    /// Handle of the user the credential belongs to.
    pub user_handle: ByteArray,
    /// Decoded credential public key.
    pub public_key: CoseKey,
    /// The COSE encoding of `public_key`, for persistence.
    pub public_key_bytes: ByteArray,
    /// Last signature counter seen.
    pub signature_count: u32,
    /// Authenticator model.
    pub aaguid: Aaguid,
}

impl RegisteredCredential {
    /// Rebuild a credential from persisted fields.
    ///
    /// # Errors
    ///
    /// Fails if `public_key_bytes` is not a supported COSE key.
    pub fn from_parts(
        credential_id: impl Into<ByteArray>,
        user_handle: impl Into<ByteArray>,
        public_key_bytes: impl Into<ByteArray>,
        signature_count: u32,
        aaguid: Aaguid,
    ) -> Result<Self, CodecError> {
        let public_key_bytes = public_key_bytes.into();
        Ok(Self {
            credential_id: credential_id.into(),
            user_handle: user_handle.into(),
            public_key: CoseKey::from_bytes(&public_key_bytes)?,
            public_key_bytes,
            signature_count,
            aaguid,
        })
    }
}

/// Storage for registered credentials, consulted by the ceremonies.
///
/// A ceremony makes at most one `lookup` or `exists_anywhere` call and at
/// most one `update_counter` call.
pub trait CredentialRepository {
    /// Error type for storage failures.
    type Error: std::error::Error;

    /// Fetch the credential with ID `credential_id`.
    fn lookup(
        &self,
        credential_id: &[u8],
    ) -> impl Future<Output = Result<Option<RegisteredCredential>, Self::Error>>;

    /// Whether `credential_id` is registered to any user.
    fn exists_anywhere(
        &self,
        credential_id: &[u8],
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Set the signature counter to `new` if it is still `expected`.
    ///
    /// Returns `false` if the counter had changed, which means a concurrent
    /// assertion won the race.
    fn update_counter(
        &self,
        credential_id: &[u8],
        expected: u32,
        new: u32,
    ) -> impl Future<Output = Result<bool, Self::Error>>;
}

impl<R: CredentialRepository> CredentialRepository for &R {
    type Error = R::Error;

    fn lookup(
        &self,
        credential_id: &[u8],
    ) -> impl Future<Output = Result<Option<RegisteredCredential>, Self::Error>> {
        (**self).lookup(credential_id)
    }

    fn exists_anywhere(
        &self,
        credential_id: &[u8],
    ) -> impl Future<Output = Result<bool, Self::Error>> {
        (**self).exists_anywhere(credential_id)
    }

    fn update_counter(
        &self,
        credential_id: &[u8],
        expected: u32,
        new: u32,
    ) -> impl Future<Output = Result<bool, Self::Error>> {
        (**self).update_counter(credential_id, expected, new)
    }
}

type CredentialMap = Arc<Mutex<HashMap<ByteArray, RegisteredCredential>>>;

/// A repository held in memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    credentials: CredentialMap,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `credential`, replacing any credential with the same ID.
    pub fn insert(&self, credential: RegisteredCredential) {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential.credential_id.clone(), credential);
    }

    /// A copy of the credential with ID `credential_id`.
    pub fn get(&self, credential_id: &[u8]) -> Option<RegisteredCredential> {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(credential_id)
            .cloned()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialRepository for InMemoryRepository {
    type Error = Infallible;

    async fn lookup(&self, credential_id: &[u8]) -> Result<Option<RegisteredCredential>, Self::Error> {
        Ok(self.get(credential_id))
    }

    async fn exists_anywhere(&self, credential_id: &[u8]) -> Result<bool, Self::Error> {
        Ok(self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(credential_id))
    }

    async fn update_counter(
        &self,
        credential_id: &[u8],
        expected: u32,
        new: u32,
    ) -> Result<bool, Self::Error> {
        let mut credentials = self.credentials.lock().unwrap_or_else(PoisonError::into_inner);
        match credentials.get_mut(credential_id) {
            Some(credential) if credential.signature_count == expected => {
                credential.signature_count = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
