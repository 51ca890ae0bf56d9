//! Obtaining, renewing and revoking certificates from ACME (Automatic Certificate Management
//! Environment) providers such as [Let's Encrypt](https://letsencrypt.org/).
//!
//! It implements the client side of [RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555),
//! using ACME v2 to issue/renew certificates.
//!
//! # Usage
//!
//! Fetch a [`Directory`], load an existing [`Account`] from it and hand that account to a
//! [`Certifier`] together with a [`Resolver`]. The certifier then drives each order: it creates
//! the order, collects its authorizations, has the resolver solve them, submits a CSR and waits
//! for the certificate.
//!
//! Results come back as a [`Resource`] holding the certificate, its issuer and private key as PEM.
//! Keep it around; [`Certifier::renew`] takes it as input.
//!
//! # Domain Ownership
//!
//! Most website TLS certificates tries to prove ownership/control over the domain they are issued
//! for. For ACME, this means proving you control either:
//!
//! - a server answering TLS or HTTP requests for that domain;
//! - the DNS server answering name lookups against the domain.
//!
//! That is the job of the [`Resolver`]. [`Account`] provides the key authorizations and proofs
//! for the `http-01`, `dns-01` and `tls-alpn-01` challenges, and can trigger and wait for their
//! validation.
//!
//! ## Multiple Domains
//!
//! An order may list several domains (and IP addresses), all of which end up in the certificate.
//! The ACME API requires you to prove ownership of each of them. When anything fails after that,
//! the [`ObtainError`] names every affected domain.
//!
//! # Rate Limits
//!
//! The ACME API provider Let's Encrypt uses [rate limits] to ensure the API is not being abused.
//! Requests made through one [`Directory`] are held to [`DEFAULT_OVERALL_REQUEST_LIMIT`] per
//! second unless [`CertifierOptions::overall_request_limit`] says otherwise.
//!
//! ## Use Staging For Development!
//!
//! Especially take care to use the Let's Encrypt staging environment for development where the rate
//! limits are more relaxed. See [`DirectoryUrl::LetsEncryptStaging`].
//!
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acc;
mod certifier;
mod client;
mod dir;
mod domain;
mod error;
mod jws;
mod limit;
mod req;
mod resolver;
mod resource;
mod trans;
mod wait;

pub mod api;
pub mod cert;
pub mod ocsp;


pub use crate::{
    acc::{Account, RevocationReason},
    cert::{KeyType, PrivateKey},
    certifier::{Certifier, CertifierOptions, ObtainForCsrRequest, ObtainRequest, RenewOptions},
    client::{AcmeClient, ExtendedOrder, OrderAuthorization, OrderOptions, RawCertificate},
    dir::{Directory, DirectoryUrl},
    domain::sanitize_domains,
    error::{Error, ObtainError},
    limit::DEFAULT_OVERALL_REQUEST_LIMIT,
    ocsp::{OcspResponse, OcspResponseStatus, OcspStatus},
    resolver::Resolver,
    resource::Resource,
};
