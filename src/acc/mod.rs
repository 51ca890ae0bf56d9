use std::{collections::BTreeMap, sync::Arc};

use der::Enumerated;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use zeroize::Zeroizing;

use crate::{
    api, cert,
    client::{AcmeClient, ExtendedOrder, OrderOptions, RawCertificate},
    error::Error,
    ocsp,
    req::{req_expect_header, req_links, req_read_body_limited, MAX_BODY_SIZE},
    trans::Transport,
};

mod acme_key;
mod challenge;

pub(crate) use self::acme_key::AcmeKey;

#[derive(Debug)]
pub(crate) struct AccountInner {
    pub transport: Transport,
    pub api_account: api::Account,
    pub api_directory: api::Directory,
}

/// Account with an ACME provider.
///
/// Obtained from [`Directory::account()`] or [`Directory::load_existing_account()`]. Accounts are
/// not registered by this crate.
///
/// Implements [`AcmeClient`], so it can drive a [`Certifier`]. All clones share one nonce pool and
/// one request limiter.
///
/// [`Directory::account()`]: crate::Directory::account()
/// [`Directory::load_existing_account()`]: crate::Directory::load_existing_account()
/// [`Certifier`]: crate::Certifier
#[derive(Debug, Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
}

impl Account {
    pub(crate) fn new(
        transport: Transport,
        api_account: api::Account,
        api_directory: api::Directory,
    ) -> Self {
        Self {
            inner: Arc::new(AccountInner {
                transport,
                api_account,
                api_directory,
            }),
        }
    }

    /// Private key for this account.
    ///
    /// The key is an elliptic curve private key.
    pub fn acme_private_key_pem(&self) -> eyre::Result<Zeroizing<String>> {
        self.inner.transport.acme_key().to_pem()
    }

    /// Returns a reference to the account's API object.
    ///
    /// Empty when the account was created from a known key ID.
    pub fn api_account(&self) -> &api::Account {
        &self.inner.api_account
    }

    /// Returns a reference to the directory this account belongs to.
    pub fn api_directory(&self) -> &api::Directory {
        &self.inner.api_directory
    }

    async fn post_new_order(&self, order: &api::Order) -> eyre::Result<ExtendedOrder> {
        let url = &self.inner.api_directory.new_order;

        let res = self.inner.transport.call_kid(url, order).await?;
        let location = req_expect_header(&res, "location")?;
        let from_api = res.json::<api::Order>().await?;

        let mut order = order.clone();
        order.overwrite(from_api)?;

        Ok(ExtendedOrder { location, order })
    }

    /// Fetches one certificate chain and the alternate chain URLs the CA links to.
    async fn fetch_certificate(
        &self,
        url: &str,
        bundle: bool,
    ) -> eyre::Result<(RawCertificate, Vec<String>)> {
        let res = self.inner.transport.call_kid(url, &api::EmptyString).await?;

        let up = req_links(&res, "up");
        let alternates = req_links(&res, "alternate");

        let body = req_read_body_limited(res, MAX_BODY_SIZE).await?;
        let chain = cert::pem_bundle_der(std::str::from_utf8(&body)?)?;

        let leaf = cert::certificate_pem(&chain[0])?;

        let mut issuer = chain[1..]
            .iter()
            .map(|der| cert::certificate_pem(der))
            .collect::<eyre::Result<String>>()?;

        // the issuer may be linked instead of bundled
        // see https://datatracker.ietf.org/doc/html/rfc8555#section-7.4.2
        if issuer.is_empty() {
            if let Some(up) = up.first() {
                match self.fetch_issuer(up).await {
                    Ok(pem) => issuer = pem,
                    Err(err) => {
                        log::warn!("acme: Could not bundle issuer certificate [{url}]: {err:#}")
                    }
                }
            }
        }

        let cert = if bundle {
            format!("{leaf}{issuer}")
        } else {
            leaf
        };

        Ok((RawCertificate { cert, issuer }, alternates))
    }

    async fn fetch_issuer(&self, url: &str) -> eyre::Result<String> {
        let res = self.inner.transport.call_kid(url, &api::EmptyString).await?;
        let body = req_read_body_limited(res, MAX_BODY_SIZE).await?;

        let issuer = ocsp::parse_der_or_pem(&body)?;
        cert::certificate_pem(&der::Encode::to_der(&issuer)?)
    }
}

impl AcmeClient for Account {
    /// Creates an order, see [RFC 8555 §7.4].
    ///
    /// `replaces` is only sent when the directory advertises `renewalInfo`. If the CA answers that
    /// the certificate was already replaced, the order is retried once without it.
    ///
    /// [RFC 8555 §7.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.4
    async fn new_order(
        &self,
        domains: &[String],
        options: &OrderOptions,
    ) -> eyre::Result<ExtendedOrder> {
        let identifiers = domains
            .iter()
            .map(|domain| api::Identifier::for_name(domain))
            .collect();

        let mut order = api::Order::from_identifiers(identifiers);
        order.not_before = options.not_before.map(rfc3339).transpose()?;
        order.not_after = options.not_after.map(rfc3339).transpose()?;
        order.profile = options.profile.clone();

        if self.inner.api_directory.supports_renewal_info() {
            order.replaces = options.replaces_cert_id.clone();
        }

        match self.post_new_order(&order).await {
            Err(err) if order.replaces.is_some() && is_already_replaced(&err) => {
                log::warn!("acme: certificate already replaced, creating order without replaces");
                order.replaces = None;
                self.post_new_order(&order).await
            }
            res => res,
        }
    }

    async fn get_authorization(&self, url: &str) -> eyre::Result<api::Authorization> {
        let res = self.inner.transport.call_kid(url, &api::EmptyString).await?;
        Ok(res.json::<api::Authorization>().await?)
    }

    async fn deactivate_authorization(&self, url: &str) -> eyre::Result<()> {
        self.inner
            .transport
            .call_kid(url, &api::Deactivation::new())
            .await?;

        Ok(())
    }

    async fn finalize_order(&self, finalize_url: &str, csr_der: &[u8]) -> eyre::Result<api::Order> {
        let finalize = api::Finalize::from_der(csr_der);

        let res = self.inner.transport.call_kid(finalize_url, &finalize).await?;
        let order = res.json::<api::Order>().await?;

        if order.status == Some(api::OrderStatus::Invalid) {
            return Err(Error::InvalidOrder { problem: order.error }.into());
        }

        Ok(order)
    }

    async fn get_order(&self, location: &str) -> eyre::Result<api::Order> {
        let res = self
            .inner
            .transport
            .call_kid(location, &api::EmptyString)
            .await?;

        Ok(res.json::<api::Order>().await?)
    }

    async fn get_all_certificates(
        &self,
        url: &str,
        bundle: bool,
    ) -> eyre::Result<BTreeMap<String, RawCertificate>> {
        let (cert, alternates) = self.fetch_certificate(url, bundle).await?;

        let mut certs = BTreeMap::new();
        certs.insert(url.to_owned(), cert);

        for alt in alternates {
            let (cert, _) = self.fetch_certificate(&alt, bundle).await?;
            certs.insert(alt, cert);
        }

        Ok(certs)
    }

    async fn get_certificate(&self, url: &str, bundle: bool) -> eyre::Result<RawCertificate> {
        let (cert, _) = self.fetch_certificate(url, bundle).await?;
        Ok(cert)
    }

    async fn revoke_certificate(&self, revocation: &api::Revocation) -> eyre::Result<()> {
        let url = &self.inner.api_directory.revoke_cert;
        self.inner.transport.call_kid(url, revocation).await?;
        Ok(())
    }

    fn set_overall_request_limit(&self, limit: usize) {
        self.inner.transport.limiter().set_limit(limit);
    }
}

fn rfc3339(time: OffsetDateTime) -> eyre::Result<String> {
    Ok(time.format(&Rfc3339)?)
}

fn is_already_replaced(err: &eyre::Report) -> bool {
    err.downcast_ref::<api::Problem>()
        .is_some_and(api::Problem::is_already_replaced)
}

/// Enumeration of reasons for revocation.
///
/// The reason codes are taken from [RFC 5280 §5.3.1].
///
/// [RFC 5280 §5.3.1]: https://tools.ietf.org/html/rfc5280#section-5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enumerated)]
#[repr(u32)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CACompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    // value 7 is not used
    RemoveFromCRL = 8,
    PrivilegeWithdrawn = 9,
    AACompromise = 10,
}
