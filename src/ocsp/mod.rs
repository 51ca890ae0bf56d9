//! OCSP status retrieval ([RFC 6960]).
//!
//! [RFC 6960]: https://datatracker.ietf.org/doc/html/rfc6960

use der::{
    asn1::{Any, GeneralizedTime, ObjectIdentifier, OctetString},
    oid::AssociatedOid as _,
    Decode as _, Encode as _, Tag,
};
use ecdsa::signature::{hazmat::PrehashVerifier as _, Verifier as _};
use eyre::{eyre, WrapErr as _};
use reqwest::header::CONTENT_TYPE;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use time::OffsetDateTime;
use x509_cert::{
    serial_number::SerialNumber,
    spki::{AlgorithmIdentifierOwned, DecodePublicKey as _, SubjectPublicKeyInfoOwned},
    Certificate,
};

use crate::{
    cert::{self, AD_CA_ISSUERS, AD_OCSP},
    error::Error,
    req::{req_read_body_limited, MAX_BODY_SIZE},
    RevocationReason,
};

pub(crate) mod asn1;

pub use self::asn1::OcspResponseStatus;

pub(crate) const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Revocation status of a certificate, as vouched for by the OCSP responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspStatus {
    Good,

    Revoked {
        revoked_at: OffsetDateTime,
        reason: Option<RevocationReason>,
    },

    Unknown,
}

/// Parsed and verified OCSP response for one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    pub status: OcspStatus,

    /// When the responder signed the response.
    pub produced_at: OffsetDateTime,

    /// When the status was known to be correct.
    pub this_update: OffsetDateTime,

    /// When newer status information will be available, if the responder says so.
    pub next_update: Option<OffsetDateTime>,
}

/// Requests the OCSP status of the first certificate in a PEM bundle.
///
/// The issuer is the second certificate of the bundle, or fetched from the leaf's first CA Issuers
/// URL when the bundle holds a single certificate.
pub(crate) async fn fetch(
    http: &reqwest::Client,
    bundle: &str,
) -> eyre::Result<(Vec<u8>, OcspResponse)> {
    let mut certs = cert::parse_pem_bundle(bundle)?.into_iter();

    let leaf = certs
        .next()
        .ok_or_else(|| eyre!("no certificates were found while parsing the bundle"))?;

    let Some(server) = cert::authority_info_access(&leaf, AD_OCSP)?.into_iter().next() else {
        return Err(Error::NoOcspServer.into());
    };

    let issuer = match certs.next() {
        Some(issuer) => issuer,
        None => fetch_issuer(http, &leaf).await?,
    };

    let request = asn1::OcspRequest {
        tbs_request: asn1::TbsRequest {
            request_list: vec![asn1::Request {
                req_cert: cert_id(&leaf.tbs_certificate.serial_number, &issuer)?,
            }],
        },
    };

    log::debug!("Requesting OCSP status from {server}");

    let res = http
        .post(&server)
        .header(CONTENT_TYPE, "application/ocsp-request")
        .body(request.to_der()?)
        .send()
        .await?
        .error_for_status()?;

    let raw = req_read_body_limited(res, MAX_BODY_SIZE).await?;
    let parsed = parse_response(&raw, &leaf, &issuer)?;

    Ok((raw, parsed))
}

async fn fetch_issuer(http: &reqwest::Client, leaf: &Certificate) -> eyre::Result<Certificate> {
    let Some(url) = cert::authority_info_access(leaf, AD_CA_ISSUERS)?.into_iter().next() else {
        return Err(Error::NoIssuingCertificateUrl.into());
    };

    log::debug!("Fetching issuer certificate from {url}");

    let res = http.get(&url).send().await?.error_for_status()?;
    let body = req_read_body_limited(res, MAX_BODY_SIZE).await?;

    parse_der_or_pem(&body).wrap_err_with(|| format!("parse issuer certificate from {url}"))
}

/// Certificates fetched over plain HTTP are usually DER but some CAs serve PEM.
pub(crate) fn parse_der_or_pem(body: &[u8]) -> eyre::Result<Certificate> {
    match std::str::from_utf8(body) {
        Ok(pem) if pem.trim_start().starts_with("-----BEGIN") => cert::parse_pem_bundle(pem)?
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("empty certificate bundle")),
        _ => Ok(Certificate::from_der(body)?),
    }
}

pub(crate) fn cert_id(
    serial_number: &SerialNumber,
    issuer: &Certificate,
) -> eyre::Result<asn1::CertId> {
    let name_hash = Sha1::digest(issuer.tbs_certificate.subject.to_der()?);
    let key_hash = Sha1::digest(
        issuer
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes(),
    );

    Ok(asn1::CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: Sha1::OID,
            parameters: Some(Any::new(Tag::Null, Vec::<u8>::new())?),
        },
        issuer_name_hash: OctetString::new(name_hash.to_vec())?,
        issuer_key_hash: OctetString::new(key_hash.to_vec())?,
        serial_number: serial_number.clone(),
    })
}

/// Parses a DER encoded OCSP response about `leaf` and checks its signature.
///
/// The response must be signed by `issuer`, or by a responder certificate embedded in the response
/// which `issuer` signed.
pub(crate) fn parse_response(
    raw: &[u8],
    leaf: &Certificate,
    issuer: &Certificate,
) -> eyre::Result<OcspResponse> {
    let res = asn1::OcspResponse::from_der(raw).wrap_err("parse OCSP response")?;

    if res.response_status != OcspResponseStatus::Successful {
        return Err(Error::OcspResponse(res.response_status).into());
    }

    let bytes = res
        .response_bytes
        .ok_or_else(|| eyre!("OCSP response has no response bytes"))?;

    if bytes.response_type != asn1::ID_PKIX_OCSP_BASIC {
        return Err(eyre!(
            "unsupported OCSP response type {}",
            bytes.response_type
        ));
    }

    let basic = asn1::BasicOcspResponse::from_der(bytes.response.as_bytes())?;
    let tbs = basic.tbs_response_data.to_der()?;

    let signature = basic
        .signature
        .as_bytes()
        .ok_or_else(|| eyre!("OCSP signature has unused bits"))?;

    let signer = match basic.certs.as_deref().and_then(<[_]>::first) {
        Some(responder) => {
            let responder_signature = responder
                .signature
                .as_bytes()
                .ok_or_else(|| eyre!("responder certificate signature has unused bits"))?;

            verify_signature(
                &issuer.tbs_certificate.subject_public_key_info,
                &responder.signature_algorithm.oid,
                &responder.tbs_certificate.to_der()?,
                responder_signature,
            )
            .wrap_err("OCSP responder certificate is not signed by the issuer")?;

            responder
        }

        None => issuer,
    };

    verify_signature(
        &signer.tbs_certificate.subject_public_key_info,
        &basic.signature_algorithm.oid,
        &tbs,
        signature,
    )
    .wrap_err("bad OCSP signature")?;

    let data = asn1::ResponseData::from_der(&tbs)?;

    let single = match data.responses.as_slice() {
        [single] => single,
        responses => responses
            .iter()
            .find(|res| res.cert_id.serial_number == leaf.tbs_certificate.serial_number)
            .ok_or_else(|| eyre!("no OCSP response for the certificate serial number"))?,
    };

    let status = match &single.cert_status {
        asn1::CertStatus::Good(_) => OcspStatus::Good,
        asn1::CertStatus::Unknown(_) => OcspStatus::Unknown,
        asn1::CertStatus::Revoked(info) => OcspStatus::Revoked {
            revoked_at: to_offset_date_time(info.revocation_time),
            reason: info.revocation_reason,
        },
    };

    Ok(OcspResponse {
        status,
        produced_at: to_offset_date_time(data.produced_at),
        this_update: to_offset_date_time(single.this_update),
        next_update: single.next_update.map(to_offset_date_time),
    })
}

fn to_offset_date_time(time: GeneralizedTime) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + time.to_unix_duration()
}

fn verify_signature(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm: &ObjectIdentifier,
    msg: &[u8],
    signature: &[u8],
) -> eyre::Result<()> {
    let spki = spki.to_der()?;

    if *algorithm == ECDSA_WITH_SHA256 {
        verify_ecdsa(&spki, &Sha256::digest(msg), signature)
    } else if *algorithm == ECDSA_WITH_SHA384 {
        verify_ecdsa(&spki, &Sha384::digest(msg), signature)
    } else if *algorithm == SHA256_WITH_RSA {
        verify_rsa::<Sha256>(&spki, msg, signature)
    } else if *algorithm == SHA384_WITH_RSA {
        verify_rsa::<Sha384>(&spki, msg, signature)
    } else if *algorithm == SHA512_WITH_RSA {
        verify_rsa::<Sha512>(&spki, msg, signature)
    } else {
        Err(eyre!("unsupported signature algorithm {algorithm}"))
    }
}

fn verify_ecdsa(spki: &[u8], prehash: &[u8], signature: &[u8]) -> eyre::Result<()> {
    if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(spki) {
        let signature = p256::ecdsa::Signature::from_der(signature)
            .map_err(|_| eyre!("malformed ECDSA signature"))?;
        return key
            .verify_prehash(prehash, &signature)
            .map_err(|_| eyre!("signature mismatch"));
    }

    let key = p384::ecdsa::VerifyingKey::from_public_key_der(spki)
        .map_err(|err| eyre!("unsupported ECDSA key: {err}"))?;
    let signature = p384::ecdsa::Signature::from_der(signature)
        .map_err(|_| eyre!("malformed ECDSA signature"))?;

    key.verify_prehash(prehash, &signature)
        .map_err(|_| eyre!("signature mismatch"))
}

fn verify_rsa<D>(spki: &[u8], msg: &[u8], signature: &[u8]) -> eyre::Result<()>
where
    D: Digest + der::oid::AssociatedOid,
{
    let key = rsa::RsaPublicKey::from_public_key_der(spki)
        .map_err(|err| eyre!("unsupported public key: {err}"))?;
    let key = rsa::pkcs1v15::VerifyingKey::<D>::new(key);
    let signature = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|_| eyre!("malformed RSA signature"))?;

    key.verify(msg, &signature)
        .map_err(|_| eyre!("signature mismatch"))
}
