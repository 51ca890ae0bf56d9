//! Obtaining, renewing and revoking certificates.

use std::sync::Arc;

use der::{Decode as _, Encode as _};
use eyre::{eyre, WrapErr as _};
use time::OffsetDateTime;
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::{
    api,
    cert::{self, create_csr, CsrOptions, PrivateKey},
    client::{AcmeClient, ExtendedOrder, OrderAuthorization, RawCertificate},
    domain::sanitize_domains,
    error::{Error, ObtainFailures},
    ocsp::{self, OcspResponse},
    req,
    resolver::Resolver,
    wait::wait_for,
    Resource, RevocationReason,
};

mod chain;
mod poll;
mod request;

pub use self::request::{CertifierOptions, ObtainForCsrRequest, ObtainRequest, RenewOptions};

/// Longest Common Name a certificate may carry ([RFC 5280] `ub-common-name`).
///
/// [RFC 5280]: https://datatracker.ietf.org/doc/html/rfc5280#appendix-A.1
const MAX_COMMON_NAME_LEN: usize = 64;

/// A failure after the authorizations were validated, with whatever resource existed by then.
struct IssueFailure {
    err: eyre::Report,
    partial: Option<Resource>,
}

impl From<eyre::Report> for IssueFailure {
    fn from(err: eyre::Report) -> Self {
        Self { err, partial: None }
    }
}

/// Drives orders from creation to an issued certificate.
///
/// Authorizations are handed to the [`Resolver`]; every ACME request goes through the
/// [`AcmeClient`].
#[derive(Debug)]
pub struct Certifier<C, R> {
    client: C,
    resolver: R,
    options: CertifierOptions,
    http: reqwest::Client,
}

impl<C: AcmeClient, R: Resolver> Certifier<C, R> {
    /// Creates a certifier, passing the request ceiling on to `client`.
    pub fn new(client: C, resolver: R, options: CertifierOptions) -> Self {
        client.set_overall_request_limit(options.request_limit());

        Self {
            client,
            resolver,
            options,
            http: req::http_client().clone(),
        }
    }

    /// Uses `http` for requests outside the ACME API (OCSP responders, issuer certificates).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn options(&self) -> &CertifierOptions {
        &self.options
    }

    /// Obtains a certificate for the requested domains.
    ///
    /// Every domain must pass validation, otherwise no certificate is requested. Failures after
    /// validation are reported as an [`ObtainError`](crate::ObtainError) naming each domain.
    pub async fn obtain(&self, request: ObtainRequest) -> eyre::Result<Resource> {
        if request.domains.is_empty() {
            return Err(Error::NoDomains.into());
        }

        let domains = sanitize_domains(&request.domains);
        if domains.is_empty() {
            return Err(Error::NoDomains.into());
        }

        let tag = domains.join(", ");

        if request.bundle {
            log::info!("[{tag}] acme: Obtaining bundled SAN certificate");
        } else {
            log::info!("[{tag}] acme: Obtaining SAN certificate");
        }

        let order = self
            .client
            .new_order(&domains, &request.order_options())
            .await?;

        let authz = self
            .validate(&order, request.always_deactivate_authorizations)
            .await?;

        log::info!("[{tag}] acme: Validations succeeded; requesting certificates");

        let res = self.get_for_order(&domains, &order, &request).await;

        self.conclude(&order, &authz, request.always_deactivate_authorizations, res)
            .await
    }

    /// Obtains a certificate for the names of an existing CSR.
    ///
    /// The CSR is sent as is and stored on the returned resource.
    pub async fn obtain_for_csr(&self, request: ObtainForCsrRequest) -> eyre::Result<Resource> {
        let csr = request.csr.as_ref().ok_or(Error::MissingCsr)?;

        let domains = sanitize_domains(&cert::csr_names(csr)?);
        if domains.is_empty() {
            return Err(Error::NoDomains.into());
        }

        let csr_der = csr.to_der().wrap_err("encode CSR")?;
        let csr_pem = cert::csr_to_pem(csr)?;
        let private_key = request
            .private_key
            .as_ref()
            .map(PrivateKey::to_pem)
            .transpose()?;

        let tag = domains.join(", ");

        if request.bundle {
            log::info!("[{tag}] acme: Obtaining bundled SAN certificate given a CSR");
        } else {
            log::info!("[{tag}] acme: Obtaining SAN certificate given a CSR");
        }

        let order = self
            .client
            .new_order(&domains, &request.order_options())
            .await?;

        let authz = self
            .validate(&order, request.always_deactivate_authorizations)
            .await?;

        log::info!("[{tag}] acme: Validations succeeded; requesting certificates");

        let res = self
            .get_for_csr(
                &domains[0],
                &order,
                &csr_der,
                private_key,
                request.bundle,
                request.preferred_chain.as_deref(),
            )
            .await;

        let stamp = |res: Resource| Resource {
            csr: Some(csr_pem.clone()),
            ..res
        };

        let res = match res {
            Ok(res) => Ok(stamp(res)),
            Err(IssueFailure { err, partial }) => Err(IssueFailure {
                err,
                partial: partial.map(stamp),
            }),
        };

        self.conclude(&order, &authz, request.always_deactivate_authorizations, res)
            .await
    }

    /// Obtains a new certificate in place of the one held by `resource`.
    ///
    /// Renews from the stored CSR when there is one, otherwise from the certificate's names. The
    /// stored private key is reused either way.
    pub async fn renew(&self, resource: &Resource, options: &RenewOptions) -> eyre::Result<Resource> {
        let pem = resource
            .certificate
            .as_deref()
            .ok_or_else(|| eyre!("[{}] resource holds no certificate", resource.domain))?;

        let leaf = first_certificate(pem)?;

        if cert::is_ca(&leaf)? {
            return Err(Error::CaCertificate)
                .wrap_err_with(|| format!("[{}] cannot renew", resource.domain));
        }

        let not_after = OffsetDateTime::UNIX_EPOCH
            + leaf.tbs_certificate.validity.not_after.to_unix_duration();
        let hours = (not_after - OffsetDateTime::now_utc()).whole_hours();
        log::info!(
            "[{}] acme: Trying renewal with {hours} hours remaining",
            resource.domain
        );

        if let Some(csr) = &resource.csr {
            let csr = cert::csr_from_pem(csr)?;

            let mut res = self
                .obtain_for_csr(options.obtain_for_csr_request(csr))
                .await?;

            res.private_key = resource.private_key.clone();
            return Ok(res);
        }

        let key = resource
            .private_key
            .as_deref()
            .map(|pem| PrivateKey::from_pem(pem))
            .transpose()?;

        let domains = cert::certificate_names(&leaf)?;

        self.obtain(options.obtain_request(domains, key)).await
    }

    /// Revokes the first certificate of a PEM bundle without giving a reason.
    pub async fn revoke(&self, cert_pem: &str) -> eyre::Result<()> {
        self.revoke_with_reason(cert_pem, None).await
    }

    /// Revokes the first certificate of a PEM bundle.
    ///
    /// CA certificates are refused before contacting the CA.
    pub async fn revoke_with_reason(
        &self,
        cert_pem: &str,
        reason: Option<RevocationReason>,
    ) -> eyre::Result<()> {
        let chain = cert::pem_bundle_der(cert_pem)?;
        let leaf = Certificate::from_der(&chain[0]).wrap_err("parse certificate")?;

        if cert::is_ca(&leaf)? {
            return Err(Error::CaCertificate.into());
        }

        let revocation = api::Revocation::new(&chain[0], reason);
        self.client.revoke_certificate(&revocation).await
    }

    /// Fetches an issued certificate.
    ///
    /// The resource holds neither key nor CSR.
    pub async fn get(&self, url: &str, bundle: bool) -> eyre::Result<Resource> {
        let raw = self.client.get_certificate(url, bundle).await?;

        let leaf = first_certificate(&raw.cert)?;
        let domain = cert::main_domain(&leaf)?;

        Ok(Resource {
            domain,
            cert_url: url.to_owned(),
            cert_stable_url: url.to_owned(),
            certificate: Some(raw.cert),
            issuer_certificate: non_empty(raw.issuer),
            ..Default::default()
        })
    }

    /// Requests the OCSP status of the first certificate of a PEM bundle.
    ///
    /// Returns the raw DER response along with its parsed form. The issuer is the second
    /// certificate of the bundle, or downloaded when the bundle holds the leaf only.
    pub async fn get_ocsp(&self, bundle: &str) -> eyre::Result<(Vec<u8>, OcspResponse)> {
        ocsp::fetch(&self.http, bundle).await
    }

    /// Collects the order's authorizations and has the resolver solve them.
    ///
    /// Cleans up the authorizations when either fails.
    async fn validate(
        &self,
        order: &ExtendedOrder,
        always_deactivate: bool,
    ) -> eyre::Result<Vec<OrderAuthorization>> {
        let authz = match self.get_authorizations(order).await {
            Ok(authz) => authz,
            Err(err) => {
                self.deactivate_authorizations(order, always_deactivate)
                    .await;
                return Err(err);
            }
        };

        if let Err(err) = self.resolver.solve(&authz).await {
            self.deactivate_authorizations(order, always_deactivate)
                .await;
            return Err(err);
        }

        Ok(authz)
    }

    async fn get_authorizations(
        &self,
        order: &ExtendedOrder,
    ) -> eyre::Result<Vec<OrderAuthorization>> {
        let mut authz = Vec::new();
        let mut failures = ObtainFailures::new();

        for url in order.order.authorizations.iter().flatten() {
            match self.client.get_authorization(url).await {
                Ok(authorization) => authz.push(OrderAuthorization {
                    url: url.clone(),
                    authorization,
                }),
                Err(err) => failures.add(url.clone(), Arc::new(err)),
            }
        }

        for auth in &authz {
            log::info!("[{}] AuthURL: {}", auth.domain(), auth.url);
        }

        failures.join(None)?;

        Ok(authz)
    }

    /// Deactivates the order's authorizations, valid ones only when `force` is set.
    ///
    /// Failures are logged only.
    async fn deactivate_authorizations(&self, order: &ExtendedOrder, force: bool) {
        for url in order.order.authorizations.iter().flatten() {
            let auth = match self.client.get_authorization(url).await {
                Ok(auth) => auth,
                Err(err) => {
                    log::info!("Unable to get the authorization for {url}: {err:#}");
                    continue;
                }
            };

            if auth.status == api::AuthorizationStatus::Valid && !force {
                continue;
            }

            log::info!(
                "[{}] acme: Deactivating auth: {url}",
                auth.targeted_domain()
            );

            if let Err(err) = self.client.deactivate_authorization(url).await {
                log::warn!("Unable to deactivate the authorization {url}: {err:#}");
            }
        }
    }

    async fn get_for_order(
        &self,
        domains: &[String],
        order: &ExtendedOrder,
        request: &ObtainRequest,
    ) -> Result<Resource, IssueFailure> {
        let private_key = match &request.private_key {
            Some(key) => key.clone(),
            None => PrivateKey::generate(self.options.key_type)?,
        };

        let common_name = match domains.first() {
            Some(first) if first.len() <= MAX_COMMON_NAME_LEN && !self.options.disable_common_name => {
                first.clone()
            }
            _ => String::new(),
        };

        let mut san = Vec::new();
        if !common_name.is_empty() {
            san.push(common_name.clone());
        }
        san.extend(
            order
                .order
                .domains()
                .into_iter()
                .filter(|domain| *domain != common_name)
                .map(ToOwned::to_owned),
        );

        let csr = create_csr(
            &private_key,
            &CsrOptions {
                common_name,
                san,
                must_staple: request.must_staple,
                email_addresses: request.email_addresses.clone(),
            },
        )?;
        let csr_der = csr.to_der().wrap_err("encode CSR")?;

        self.get_for_csr(
            &domains[0],
            order,
            &csr_der,
            Some(private_key.to_pem()?),
            request.bundle,
            request.preferred_chain.as_deref(),
        )
        .await
    }

    async fn get_for_csr(
        &self,
        domain: &str,
        order: &ExtendedOrder,
        csr_der: &[u8],
        private_key: Option<Zeroizing<String>>,
        bundle: bool,
        preferred_chain: Option<&str>,
    ) -> Result<Resource, IssueFailure> {
        let partial = Resource {
            domain: domain.to_owned(),
            private_key,
            ..Default::default()
        };

        match self.finalize(order, csr_der, bundle, preferred_chain).await {
            Ok((url, raw)) => {
                log::info!("[{domain}] Server responded with a certificate.");

                Ok(Resource {
                    cert_url: url.clone(),
                    cert_stable_url: url,
                    certificate: Some(raw.cert),
                    issuer_certificate: non_empty(raw.issuer),
                    ..partial
                })
            }

            Err(err) => Err(IssueFailure {
                err,
                partial: Some(partial),
            }),
        }
    }

    /// Finalizes the order, waits for it to become valid and fetches the chosen chain.
    async fn finalize(
        &self,
        order: &ExtendedOrder,
        csr_der: &[u8],
        bundle: bool,
        preferred_chain: Option<&str>,
    ) -> eyre::Result<(String, RawCertificate)> {
        let finalized = self
            .client
            .finalize_order(&order.order.finalize, csr_der)
            .await?;

        let valid = match poll::progress(finalized.status) {
            poll::Progress::Done => finalized,

            poll::Progress::Failed => {
                return Err(Error::InvalidOrder {
                    problem: finalized.error,
                }
                .into())
            }

            poll::Progress::Waiting => {
                let timeout = self.options.order_timeout();
                let client = &self.client;
                let location = order.location.as_str();

                wait_for("certificate", timeout, timeout / 60, || {
                    poll::sample(client, location)
                })
                .await?
            }
        };

        let url = valid
            .certificate
            .ok_or_else(|| eyre!("order {} is valid without a certificate URL", order.location))?;

        let certs = self.client.get_all_certificates(&url, bundle).await?;
        let (url, raw) = chain::select(certs, &url, preferred_chain)?;

        if cert::is_ca(&first_certificate(&raw.cert)?)? {
            return Err(Error::CaCertificate.into());
        }

        Ok((url, raw))
    }

    /// Attributes a failure after validation to every authorized domain.
    async fn conclude(
        &self,
        order: &ExtendedOrder,
        authz: &[OrderAuthorization],
        always_deactivate: bool,
        res: Result<Resource, IssueFailure>,
    ) -> eyre::Result<Resource> {
        if always_deactivate {
            self.deactivate_authorizations(order, true).await;
        }

        let IssueFailure { err, partial } = match res {
            Ok(res) => return Ok(res),
            Err(failure) => failure,
        };

        let cause = Arc::new(err);
        let mut failures = ObtainFailures::new();

        for auth in authz {
            failures.add(auth.domain(), Arc::clone(&cause));
        }

        failures.join(partial)?;

        // no authorization to attribute the failure to
        Err(Arc::try_unwrap(cause).unwrap_or_else(|cause| eyre!("{cause:#}")))
    }
}

fn first_certificate(pem: &str) -> eyre::Result<Certificate> {
    let chain = cert::pem_bundle_der(pem)?;
    Certificate::from_der(&chain[0]).wrap_err("parse certificate")
}

fn non_empty(pem: String) -> Option<String> {
    (!pem.is_empty()).then_some(pem)
}
