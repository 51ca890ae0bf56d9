use std::time::Duration;

use time::OffsetDateTime;
use x509_cert::request::CertReq;

use crate::{cert::KeyType, client::OrderOptions, limit::DEFAULT_OVERALL_REQUEST_LIMIT, PrivateKey};

/// Order timeout used when [`CertifierOptions::timeout`] is zero.
pub(crate) const DEFAULT_ORDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of a [`Certifier`](crate::Certifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertifierOptions {
    /// Type of the keys generated for certificates.
    pub key_type: KeyType,

    /// How long to wait for an order to become valid after finalizing it.
    ///
    /// Zero means 30 seconds.
    pub timeout: Duration,

    /// Ceiling of requests per second towards the CA. Zero means 18.
    pub overall_request_limit: usize,

    /// Leave the Common Name out of CSRs, putting every name in the SAN extension.
    pub disable_common_name: bool,
}

impl Default for CertifierOptions {
    fn default() -> Self {
        Self {
            key_type: KeyType::Ec256,
            timeout: DEFAULT_ORDER_TIMEOUT,
            overall_request_limit: DEFAULT_OVERALL_REQUEST_LIMIT,
            disable_common_name: false,
        }
    }
}

impl CertifierOptions {
    pub(crate) fn order_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_ORDER_TIMEOUT
        } else {
            self.timeout
        }
    }

    pub(crate) fn request_limit(&self) -> usize {
        if self.overall_request_limit == 0 {
            DEFAULT_OVERALL_REQUEST_LIMIT
        } else {
            self.overall_request_limit
        }
    }
}

/// Request for a certificate covering a list of domains.
///
/// The first domain becomes the Common Name when it fits (64 characters at most).
#[derive(Debug, Clone, Default)]
pub struct ObtainRequest {
    pub domains: Vec<String>,

    /// Key to issue the certificate for. Generated when absent.
    pub private_key: Option<PrivateKey>,

    /// Request the OCSP must-staple extension.
    pub must_staple: bool,

    /// Email addresses added to the CSR.
    pub email_addresses: Vec<String>,

    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,

    /// Append the issuer chain to the certificate.
    pub bundle: bool,

    /// Issuer Common Name of the top certificate of the chain to prefer.
    pub preferred_chain: Option<String>,

    /// Certificate profile offered by the CA.
    pub profile: Option<String>,

    /// ARI identifier of the certificate being replaced.
    pub replaces_cert_id: Option<String>,

    /// Deactivate the order's authorizations once done, valid ones included.
    pub always_deactivate_authorizations: bool,
}

impl ObtainRequest {
    pub(crate) fn order_options(&self) -> OrderOptions {
        OrderOptions {
            not_before: self.not_before,
            not_after: self.not_after,
            profile: self.profile.clone(),
            replaces_cert_id: self.replaces_cert_id.clone(),
        }
    }
}

/// Request for a certificate matching an existing CSR.
///
/// The names are taken from the CSR.
#[derive(Debug, Clone, Default)]
pub struct ObtainForCsrRequest {
    pub csr: Option<CertReq>,

    /// Key the CSR was signed with. Only copied to the resulting resource.
    pub private_key: Option<PrivateKey>,

    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,
    pub bundle: bool,
    pub preferred_chain: Option<String>,
    pub profile: Option<String>,
    pub replaces_cert_id: Option<String>,
    pub always_deactivate_authorizations: bool,
}

impl ObtainForCsrRequest {
    pub(crate) fn order_options(&self) -> OrderOptions {
        OrderOptions {
            not_before: self.not_before,
            not_after: self.not_after,
            profile: self.profile.clone(),
            replaces_cert_id: self.replaces_cert_id.clone(),
        }
    }
}

/// Options of [`Certifier::renew`](crate::Certifier::renew).
///
/// Names (or the CSR) and the key come from the resource being renewed.
#[derive(Debug, Clone, Default)]
pub struct RenewOptions {
    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,
    pub bundle: bool,
    pub preferred_chain: Option<String>,
    pub profile: Option<String>,
    pub replaces_cert_id: Option<String>,
    pub always_deactivate_authorizations: bool,

    /// Only used when renewing from names.
    pub must_staple: bool,

    /// Only used when renewing from names.
    pub email_addresses: Vec<String>,
}

impl RenewOptions {
    pub(crate) fn obtain_request(&self, domains: Vec<String>, key: Option<PrivateKey>) -> ObtainRequest {
        ObtainRequest {
            domains,
            private_key: key,
            must_staple: self.must_staple,
            email_addresses: self.email_addresses.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
            bundle: self.bundle,
            preferred_chain: self.preferred_chain.clone(),
            profile: self.profile.clone(),
            replaces_cert_id: self.replaces_cert_id.clone(),
            always_deactivate_authorizations: self.always_deactivate_authorizations,
        }
    }

    pub(crate) fn obtain_for_csr_request(&self, csr: CertReq) -> ObtainForCsrRequest {
        ObtainForCsrRequest {
            csr: Some(csr),
            private_key: None,
            not_before: self.not_before,
            not_after: self.not_after,
            bundle: self.bundle,
            preferred_chain: self.preferred_chain.clone(),
            profile: self.profile.clone(),
            replaces_cert_id: self.replaces_cert_id.clone(),
            always_deactivate_authorizations: self.always_deactivate_authorizations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_options_resolve_to_defaults() {
        let options = CertifierOptions {
            timeout: Duration::ZERO,
            overall_request_limit: 0,
            ..Default::default()
        };

        assert_eq!(options.order_timeout(), Duration::from_secs(30));
        assert_eq!(options.request_limit(), 18);

        let options = CertifierOptions {
            timeout: Duration::from_secs(90),
            overall_request_limit: 4,
            ..Default::default()
        };

        assert_eq!(options.order_timeout(), Duration::from_secs(90));
        assert_eq!(options.request_limit(), 4);
    }

    #[test]
    fn renew_options_carry_over() {
        let options = RenewOptions {
            bundle: true,
            must_staple: true,
            profile: Some("shortlived".to_owned()),
            ..Default::default()
        };

        let req = options.obtain_request(vec!["example.com".to_owned()], None);
        assert!(req.bundle);
        assert!(req.must_staple);
        assert_eq!(req.order_options().profile.as_deref(), Some("shortlived"));
    }
}
