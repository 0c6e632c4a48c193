//! Attestation statement verification for WebAuthn registrations.
//!
//! Verification happens in two stages:
//!
//! - [`verify_statement`] checks a statement against the authenticator data
//!   and client data hash it was produced over, yielding a
//!   [`StatementVerdict`].
//! - [`evaluate_trust`] decides whether the statement's certificate chain
//!   leads to a root supplied by a [`TrustRootResolver`], yielding an
//!   [`AttestationVerdict`].
//!
//! Supported formats: `none`, `packed`, `fido-u2f`, `android-key`,
//! `android-safetynet` and `tpm`. Unknown formats verify as
//! [`AttestationType::Uncertain`].

#![warn(missing_docs)]

pub mod certificate;
pub mod error;
pub mod format;
pub mod resolver;
pub mod trust;
pub mod verdict;

pub use certificate::*;
pub use error::*;
pub use format::*;
pub use resolver::*;
pub use trust::*;
pub use verdict::*;
