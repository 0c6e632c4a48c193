use crate::OptionsError;
use serde::{Deserialize, Serialize};
use webauthn_common::{ByteArray, RandomSource};

/// The relying party a credential is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyIdentity {
    /// The RP ID: a registrable domain such as `example.com`.
    pub id: String,
    /// Human-readable name shown by the client.
    pub name: String,
}

impl RelyingPartyIdentity {
    /// Create an identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The user account a credential is created for.
///
/// The user handle (`id`) is between 1 and 64 bytes; this is checked at
/// construction and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "UserIdentityFields")]
pub struct UserIdentity {
    id: ByteArray,
    name: String,
    display_name: String,
}

impl UserIdentity {
    /// Maximum user handle length in bytes.
    pub const MAX_HANDLE_LENGTH: usize = 64;

    /// Length of handles produced by [`UserIdentity::generate`].
    pub const GENERATED_HANDLE_LENGTH: usize = 32;

    /// Create an identity with the given user handle.
    ///
    /// # Errors
    ///
    /// Fails if the handle is empty or longer than 64 bytes.
    pub fn new(
        id: impl Into<ByteArray>,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, OptionsError> {
        let id = id.into();
        if id.is_empty() {
            return Err(OptionsError::EmptyUserHandle);
        }
        if id.len() > Self::MAX_HANDLE_LENGTH {
            return Err(OptionsError::UserHandleTooLong(id.len()));
        }
        Ok(Self {
            id,
            name: name.into(),
            display_name: display_name.into(),
        })
    }

    /// Create an identity with a fresh random user handle.
    pub fn generate(
        random: &impl RandomSource,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: random.bytes(Self::GENERATED_HANDLE_LENGTH).into(),
            name: name.into(),
            display_name: display_name.into(),
        }
    }

    /// The user handle.
    pub fn id(&self) -> &ByteArray {
        &self.id
    }

    /// The account name, such as an email address.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name shown to the user.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdentityFields {
    id: ByteArray,
    name: String,
    display_name: String,
}

impl TryFrom<UserIdentityFields> for UserIdentity {
    type Error = OptionsError;

    fn try_from(fields: UserIdentityFields) -> Result<Self, Self::Error> {
        Self::new(fields.id, fields.name, fields.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webauthn_common::helpers::SeededRandom;

    #[test]
    fn user_handles_are_bounded() {
        assert_eq!(
            UserIdentity::new(Vec::new(), "alice", "Alice"),
            Err(OptionsError::EmptyUserHandle)
        );
        assert_eq!(
            UserIdentity::new(vec![1u8; 65], "alice", "Alice"),
            Err(OptionsError::UserHandleTooLong(65))
        );
        assert!(UserIdentity::new(vec![1u8; 64], "alice", "Alice").is_ok());
    }

    #[test]
    fn generated_handles_have_the_generated_length() {
        let user = UserIdentity::generate(&SeededRandom::new(1), "alice", "Alice");
        assert_eq!(user.id().len(), UserIdentity::GENERATED_HANDLE_LENGTH);
    }

    #[test]
    fn deserialization_validates_the_handle() {
        let json = r#"{"id":"","name":"alice","displayName":"Alice"}"#;
        assert!(serde_json::from_str::<UserIdentity>(json).is_err());

        let json = r#"{"id":"AQID","name":"alice","displayName":"Alice"}"#;
        let user: UserIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(user.id().as_slice(), &[1, 2, 3]);
        assert_eq!(user.display_name(), "Alice");
    }
}
