//! Attestation trust evaluation.

use crate::{
    AttestationError, AttestationFormat, AttestationType, AttestationVerdict, Certificate,
    StatementVerdict, TrustRootResolver,
};
use std::time::Duration;
use tracing::{debug, warn};
use web_time::{SystemTime, UNIX_EPOCH};
use webauthn_codec::Aaguid;

/// Decide whether a statement verdict is backed by a trusted root.
///
/// Only [`AttestationType::Basic`] verdicts can be trustworthy. Their trust
/// path must verify link by link, every certificate must be within its
/// validity window, and the last certificate must be, or be issued by, one
/// of the roots `resolver` returns for the authenticator model and format.
/// Every issuing certificate, root included, must be a CA whose
/// `pathLenConstraint` admits the intermediates below it.
///
/// Without a resolver the verdict is returned untrusted with a warning.
/// A chain that does not lead to a trusted root is likewise untrusted with
/// a warning; deciding whether to accept it is up to the caller.
///
/// # Errors
///
/// Returns [`AttestationError::TrustResolution`] if the resolver fails.
pub async fn evaluate_trust<R: TrustRootResolver>(
    verdict: StatementVerdict,
    format: &AttestationFormat,
    aaguid: Option<&Aaguid>,
    resolver: Option<&R>,
) -> Result<AttestationVerdict, AttestationError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    evaluate_trust_at(verdict, format, aaguid, resolver, now).await
}

/// [`evaluate_trust`] at a fixed time, measured from the Unix epoch.
///
/// # Errors
///
/// Returns [`AttestationError::TrustResolution`] if the resolver fails.
pub async fn evaluate_trust_at<R: TrustRootResolver>(
    verdict: StatementVerdict,
    format: &AttestationFormat,
    aaguid: Option<&Aaguid>,
    resolver: Option<&R>,
    now: Duration,
) -> Result<AttestationVerdict, AttestationError> {
    let StatementVerdict {
        attestation_type,
        trust_path,
    } = verdict;
    let mut result = AttestationVerdict {
        format: format.clone(),
        attestation_type,
        trust_path,
        trustworthy: false,
        warnings: Vec::new(),
    };

    match attestation_type {
        AttestationType::None | AttestationType::SelfAttestation => return Ok(result),
        AttestationType::Uncertain => {
            result
                .warnings
                .push(format!("unknown attestation format {:?}", format.as_str()));
            return Ok(result);
        }
        AttestationType::Basic => {}
    }

    let Some(resolver) = resolver else {
        result
            .warnings
            .push("unverified chain: no trust root resolver configured".to_owned());
        return Ok(result);
    };

    let roots = resolver
        .resolve(aaguid, format)
        .await
        .map_err(|error| AttestationError::TrustResolution(error.to_string()))?;

    match validate_chain(&result.trust_path, &roots, now) {
        Ok(()) => {
            debug!(%format, "attestation chain leads to a trusted root");
            result.trustworthy = true;
        }
        Err(reason) => {
            warn!(%format, %reason, "attestation chain is not trusted");
            result.warnings.push(format!("unverified chain: {reason}"));
        }
    }
    Ok(result)
}

fn validate_chain(chain: &[Certificate], roots: &[Certificate], now: Duration) -> Result<(), String> {
    let Some(last) = chain.last() else {
        return Err("empty trust path".to_owned());
    };
    if roots.is_empty() {
        return Err("no trust roots for this authenticator".to_owned());
    }

    for (depth, certificate) in chain.iter().enumerate() {
        if !certificate.is_valid_at(now) {
            return Err(format!("certificate at depth {depth} is outside its validity period"));
        }
    }
    for (depth, pair) in chain.windows(2).enumerate() {
        if !pair[0].is_issued_by(&pair[1]) {
            return Err(format!("certificate at depth {depth} is not issued by its successor"));
        }
        check_issuer(&pair[1], depth)
            .map_err(|reason| format!("certificate at depth {} {reason}", depth + 1))?;
    }

    let below_root = chain.len() - 1;
    let anchored = roots.iter().any(|root| {
        root == last
            || (root.is_valid_at(now)
                && check_issuer(root, below_root).is_ok()
                && last.is_issued_by(root))
    });
    if anchored {
        Ok(())
    } else {
        Err("chain does not lead to a trusted root".to_owned())
    }
}

/// Check that `issuer` may sign a path holding `intermediates` CA
/// certificates between it and the leaf.
fn check_issuer(issuer: &Certificate, intermediates: usize) -> Result<(), String> {
    if !issuer.is_ca().map_err(|error| error.to_string())? {
        return Err("is not a certificate authority".to_owned());
    }
    match issuer.path_len_constraint().map_err(|error| error.to_string())? {
        Some(limit) if usize::from(limit) < intermediates => Err(format!(
            "allows {limit} intermediate certificates below it but has {intermediates}"
        )),
        _ => Ok(()),
    }
}
