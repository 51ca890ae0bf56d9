//! Contract between the certifier and the ACME API.

use std::{collections::BTreeMap, future::Future};

use time::OffsetDateTime;

use crate::api;

/// Optional order fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderOptions {
    /// Requested `notBefore` of the certificate.
    pub not_before: Option<OffsetDateTime>,

    /// Requested `notAfter` of the certificate.
    pub not_after: Option<OffsetDateTime>,

    /// Certificate profile name offered by the CA.
    pub profile: Option<String>,

    /// ARI certificate identifier of the certificate being replaced.
    pub replaces_cert_id: Option<String>,
}

/// An order together with its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedOrder {
    /// The order URL, from the `Location` header.
    pub location: String,

    pub order: api::Order,
}

/// A certificate as returned by the CA, PEM encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCertificate {
    /// The leaf, followed by the issuer chain when bundled.
    pub cert: String,

    /// The issuer chain. Empty when the CA sent none and it could not be fetched.
    pub issuer: String,
}

/// An authorization of an order together with its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAuthorization {
    pub url: String,
    pub authorization: api::Authorization,
}

impl OrderAuthorization {
    /// The domain this authorization is about, `*.` prefixed for wildcards.
    pub fn domain(&self) -> String {
        self.authorization.targeted_domain()
    }
}

/// ACME API operations the certifier relies on.
///
/// Implemented by [`Account`](crate::Account). Errors are passed through the certifier unmodified.
pub trait AcmeClient: Send + Sync {
    /// Creates an order for the given identifiers.
    fn new_order(
        &self,
        domains: &[String],
        options: &OrderOptions,
    ) -> impl Future<Output = eyre::Result<ExtendedOrder>> + Send;

    /// Fetches an authorization (POST-as-GET).
    fn get_authorization(
        &self,
        url: &str,
    ) -> impl Future<Output = eyre::Result<api::Authorization>> + Send;

    /// Deactivates an authorization.
    fn deactivate_authorization(&self, url: &str) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Submits the DER encoded CSR, returning the order as answered by the CA.
    fn finalize_order(
        &self,
        finalize_url: &str,
        csr_der: &[u8],
    ) -> impl Future<Output = eyre::Result<api::Order>> + Send;

    /// Fetches an order (POST-as-GET).
    fn get_order(&self, location: &str) -> impl Future<Output = eyre::Result<api::Order>> + Send;

    /// Fetches the certificate at `url` and every alternate chain the CA links to, keyed by URL.
    fn get_all_certificates(
        &self,
        url: &str,
        bundle: bool,
    ) -> impl Future<Output = eyre::Result<BTreeMap<String, RawCertificate>>> + Send;

    /// Fetches the certificate at `url`.
    fn get_certificate(
        &self,
        url: &str,
        bundle: bool,
    ) -> impl Future<Output = eyre::Result<RawCertificate>> + Send;

    /// Asks the CA to revoke a certificate.
    fn revoke_certificate(
        &self,
        revocation: &api::Revocation,
    ) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Sets the ceiling of requests per second towards the CA.
    fn set_overall_request_limit(&self, _limit: usize) {}
}
