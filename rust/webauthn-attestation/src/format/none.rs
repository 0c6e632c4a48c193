use crate::StatementVerdict;
use tracing::debug;
use webauthn_codec::AttestationStatement;

pub(super) fn verify(statement: &AttestationStatement) -> StatementVerdict {
    if !statement.is_empty() {
        debug!("ignoring non-empty statement of a none attestation");
    }
    StatementVerdict::none()
}
