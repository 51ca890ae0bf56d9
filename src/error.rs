use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use crate::{api::Problem, ocsp::OcspResponseStatus, Resource};

/// Failures callers may want to tell apart.
///
/// Returned inside an [`eyre::Report`]; use [`eyre::Report::downcast_ref`] to inspect.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request listed no (usable) domains.
    #[error("no domains to obtain a certificate for")]
    NoDomains,

    /// A CSR request was made without a CSR.
    #[error("cannot obtain resource for CSR: CSR is missing")]
    MissingCsr,

    /// The CA moved the order to `invalid`.
    #[error("invalid order: {}", problem_or_unknown(.problem))]
    InvalidOrder { problem: Option<Problem> },

    /// The order did not become `valid` in time.
    ///
    /// `last_error` holds the most recent failure to fetch the order, if polling ran into any.
    #[error("time limit exceeded waiting for {what} ({timeout:?}){}", last_error_suffix(.last_error))]
    Timeout {
        what: String,
        timeout: Duration,
        last_error: Option<Arc<eyre::Report>>,
    },

    /// The first certificate of a bundle is a CA certificate, so it is not the issued leaf.
    #[error("certificate bundle starts with a CA certificate")]
    CaCertificate,

    /// The leaf certificate has no OCSP responder URL.
    #[error("no OCSP server specified in cert")]
    NoOcspServer,

    /// The leaf certificate has no URL to fetch its issuer from.
    #[error("no issuing certificate URL")]
    NoIssuingCertificateUrl,

    /// The OCSP responder did not answer with `successful`.
    #[error("OCSP responder returned status {0:?}")]
    OcspResponse(OcspResponseStatus),

    /// A response body exceeded the size we are willing to read.
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

fn problem_or_unknown(problem: &Option<Problem>) -> String {
    match problem {
        Some(problem) => problem.to_string(),
        None => "no problem details provided".to_owned(),
    }
}

fn last_error_suffix(last_error: &Option<Arc<eyre::Report>>) -> String {
    match last_error {
        Some(err) => format!(": last error: {err:#}"),
        None => String::new(),
    }
}

/// Per-domain failures collected after the authorizations were validated.
///
/// The same cause is often shared by every domain of an order, hence the `Arc`.
#[derive(Debug, Default)]
pub(crate) struct ObtainFailures {
    failures: BTreeMap<String, Arc<eyre::Report>>,
}

impl ObtainFailures {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, domain: impl Into<String>, err: Arc<eyre::Report>) {
        self.failures.insert(domain.into(), err);
    }

    /// Zero failures join to `Ok`, anything else to a single [`ObtainError`].
    pub(crate) fn join(self, resource: Option<Resource>) -> Result<(), ObtainError> {
        if self.failures.is_empty() {
            return Ok(());
        }

        Err(ObtainError {
            failures: self.failures,
            resource: resource.map(Box::new),
        })
    }
}

/// One or more domains had a problem after their authorizations were validated.
///
/// Carries the partially filled [`Resource`] when one was created, which never holds certificate
/// bytes.
#[derive(Debug)]
pub struct ObtainError {
    failures: BTreeMap<String, Arc<eyre::Report>>,
    resource: Option<Box<Resource>>,
}

impl ObtainError {
    /// Affected domains (or authorization URLs) and their cause, sorted by domain.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &eyre::Report)> {
        self.failures
            .iter()
            .map(|(domain, err)| (domain.as_str(), err.as_ref()))
    }

    /// Returns true if the given domain is among the failures.
    pub fn contains(&self, domain: &str) -> bool {
        self.failures.contains_key(domain)
    }

    /// The partially filled resource, useful for diagnostics.
    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_deref()
    }
}

impl fmt::Display for ObtainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: one or more domains had a problem:")?;

        for (domain, err) in &self.failures {
            write!(f, "\n[{domain}] {err:#}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ObtainError {}
