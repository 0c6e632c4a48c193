use crate::{AttestationFormat, Certificate};

/// How the authenticator vouched for the new credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttestationType {
    /// No attestation was provided.
    None,
    /// The credential key signed its own attestation.
    SelfAttestation,
    /// An attestation certificate chain vouches for the authenticator.
    Basic,
    /// The format is unknown, so nothing can be said.
    Uncertain,
}

/// The outcome of checking an attestation statement on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementVerdict {
    /// The kind of attestation.
    pub attestation_type: AttestationType,
    /// Certificates from the statement, leaf first. Empty unless
    /// `attestation_type` is [`AttestationType::Basic`].
    pub trust_path: Vec<Certificate>,
}

impl StatementVerdict {
    /// A verdict carrying no attestation.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attestation_type: AttestationType::None,
            trust_path: Vec::new(),
        }
    }

    /// A verdict for an unrecognised format.
    #[must_use]
    pub const fn uncertain() -> Self {
        Self {
            attestation_type: AttestationType::Uncertain,
            trust_path: Vec::new(),
        }
    }

    /// A self attestation verdict.
    #[must_use]
    pub const fn self_attestation() -> Self {
        Self {
            attestation_type: AttestationType::SelfAttestation,
            trust_path: Vec::new(),
        }
    }

    /// A certificate-backed verdict.
    #[must_use]
    pub const fn basic(trust_path: Vec<Certificate>) -> Self {
        Self {
            attestation_type: AttestationType::Basic,
            trust_path,
        }
    }
}

/// The outcome of attestation verification including trust evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationVerdict {
    /// The statement format.
    pub format: AttestationFormat,
    /// The kind of attestation.
    pub attestation_type: AttestationType,
    /// Certificates from the statement, leaf first.
    pub trust_path: Vec<Certificate>,
    /// Whether the trust path leads to a root the resolver vouches for.
    pub trustworthy: bool,
    /// Reasons trust could not be established, for logs.
    pub warnings: Vec<String>,
}
