//! Decoding and signature verification for the binary structures exchanged
//! in WebAuthn ceremonies.
//!
//! Everything here is a pure function of its input bytes: the decoders
//! perform no I/O, keep no state and return the same result for the same
//! input, so they are safe to run on attacker-supplied data.
//!
//! - [`AttestationObject`] decodes the CBOR `{fmt, authData, attStmt}` map.
//! - [`AuthenticatorData`] decodes the authenticator's signed record.
//! - [`CoseKey`] decodes credential public keys.
//! - [`verify_signature`] dispatches on [`CoseAlgorithm`].

#![warn(missing_docs)]

mod cbor;

pub mod algorithm;
pub mod attestation_object;
pub mod authenticator_data;
pub mod cose;
pub mod error;
pub mod verify;

pub use algorithm::*;
pub use attestation_object::*;
pub use authenticator_data::*;
pub use cose::*;
pub use error::*;
pub use verify::*;

pub use ciborium::Value;
