//! Base64url encoding as used on the WebAuthn wire.
//!
//! Output is always unpadded. Input is accepted with or without padding,
//! since browsers and client libraries disagree on the matter.

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

pub use base64::DecodeError;

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    ENGINE.encode(bytes)
}

/// Decode base64url text, with or without trailing padding.
///
/// # Errors
///
/// Returns an error if `text` contains characters outside the url-safe
/// alphabet or has an invalid length.
pub fn decode(text: impl AsRef<[u8]>) -> Result<Vec<u8>, DecodeError> {
    ENGINE.decode(text)
}
