#![warn(missing_docs)]

//! This crate constitutes a library of light weight helpers that are shared
//! across the WebAuthn relying-party crates. Their chief quality is that they
//! have virtually zero dependencies.

pub mod base64url;

mod bytes;
pub use bytes::*;

mod random;
pub use random::*;

#[cfg(feature = "helpers")]
pub mod helpers;
