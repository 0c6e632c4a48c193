//! Trust-root resolution.

use crate::{AttestationFormat, Certificate};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use webauthn_codec::Aaguid;

/// Supplies the root certificates an attestation chain may lead to.
///
/// Implementations typically consult a metadata service keyed by the
/// authenticator model. The call is async so that such lookups can go over
/// the network.
pub trait TrustRootResolver {
    /// Error type for resolution failures.
    type Error: std::error::Error;

    /// Resolve the roots trusted for `aaguid` (when the authenticator
    /// reported one) under attestation `format`.
    fn resolve(
        &self,
        aaguid: Option<&Aaguid>,
        format: &AttestationFormat,
    ) -> impl Future<Output = Result<Vec<Certificate>, Self::Error>>;
}

impl<R: TrustRootResolver> TrustRootResolver for &R {
    type Error = R::Error;

    fn resolve(
        &self,
        aaguid: Option<&Aaguid>,
        format: &AttestationFormat,
    ) -> impl Future<Output = Result<Vec<Certificate>, Self::Error>> {
        (**self).resolve(aaguid, format)
    }
}

/// An in-memory resolver with roots registered per AAGUID and per format.
///
/// A lookup returns the roots registered for the AAGUID followed by those
/// registered for the format.
#[derive(Debug, Clone, Default)]
pub struct StaticTrustRoots {
    by_aaguid: HashMap<Aaguid, Vec<Certificate>>,
    by_format: HashMap<AttestationFormat, Vec<Certificate>>,
}

impl StaticTrustRoots {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `root` for authenticators of model `aaguid`.
    #[must_use]
    pub fn with_aaguid_root(mut self, aaguid: Aaguid, root: Certificate) -> Self {
        self.by_aaguid.entry(aaguid).or_default().push(root);
        self
    }

    /// Trust `root` for every statement of `format`.
    #[must_use]
    pub fn with_format_root(mut self, format: AttestationFormat, root: Certificate) -> Self {
        self.by_format.entry(format).or_default().push(root);
        self
    }
}

impl TrustRootResolver for StaticTrustRoots {
    type Error = Infallible;

    async fn resolve(
        &self,
        aaguid: Option<&Aaguid>,
        format: &AttestationFormat,
    ) -> Result<Vec<Certificate>, Self::Error> {
        let by_aaguid = aaguid
            .and_then(|aaguid| self.by_aaguid.get(aaguid))
            .into_iter()
            .flatten();
        let by_format = self.by_format.get(format).into_iter().flatten();
        Ok(by_aaguid.chain(by_format).cloned().collect())
    }
}
