//! Certificate, CSR and key helpers.

use std::{
    io::{BufReader, Cursor},
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use der::{
    asn1::{Any, ObjectIdentifier},
    oid::AssociatedOid as _,
    Decode as _, DecodePem as _, EncodePem as _, Tag, Tagged as _,
};
use eyre::{eyre, WrapErr as _};
use x509_cert::{
    ext::{
        pkix::{name::GeneralName, AuthorityInfoAccessSyntax, BasicConstraints, SubjectAltName},
        Extension,
    },
    name::Name,
    request::CertReq,
    Certificate,
};

mod csr;
mod key;

pub use self::{
    csr::{create_csr, CsrOptions},
    key::{KeyType, PrivateKey},
};

const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const EXTENSION_REQUEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");
pub(crate) const AD_OCSP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1");
pub(crate) const AD_CA_ISSUERS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.2");

/// Splits a PEM bundle into its DER encoded certificates, in bundle order.
///
/// Fails when the bundle holds no certificate at all.
pub fn pem_bundle_der(pem: &str) -> eyre::Result<Vec<Vec<u8>>> {
    let mut rdr = BufReader::new(Cursor::new(pem));

    let certs = rustls_pemfile::certs(&mut rdr)
        .map(|res| res.map(|cert| cert.to_vec()))
        .collect::<Result<Vec<_>, _>>()?;

    if certs.is_empty() {
        return Err(eyre!("no certificates were found while parsing the bundle"));
    }

    Ok(certs)
}

/// Parses every certificate of a PEM bundle.
pub fn parse_pem_bundle(pem: &str) -> eyre::Result<Vec<Certificate>> {
    pem_bundle_der(pem)?
        .iter()
        .map(|der| Certificate::from_der(der).wrap_err("parse certificate"))
        .collect()
}

/// Returns true if the certificate carries a basic constraints extension with `cA` set.
pub fn is_ca(cert: &Certificate) -> eyre::Result<bool> {
    let Some(ext) = find_extension(cert.tbs_certificate.extensions.as_deref(), BasicConstraints::OID)
    else {
        return Ok(false);
    };

    let constraints = BasicConstraints::from_der(ext.extn_value.as_bytes())?;
    Ok(constraints.ca)
}

/// Names a certificate was issued for: the Common Name first, then SAN DNS names and IP
/// addresses, without repeating the Common Name.
pub fn certificate_names(cert: &Certificate) -> eyre::Result<Vec<String>> {
    let san = subject_alt_name(cert.tbs_certificate.extensions.as_deref())?;
    Ok(merge_names(common_name(&cert.tbs_certificate.subject), san))
}

/// Names a CSR asks for, in the same order as [`certificate_names`].
pub fn csr_names(csr: &CertReq) -> eyre::Result<Vec<String>> {
    let extensions = csr_extensions(csr)?;
    let san = subject_alt_name(Some(&extensions))?;
    Ok(merge_names(common_name(&csr.info.subject), san))
}

/// The name a certificate is primarily about: its Common Name, or else its first SAN DNS name.
pub fn main_domain(cert: &Certificate) -> eyre::Result<String> {
    if let Some(cn) = common_name(&cert.tbs_certificate.subject) {
        return Ok(cn);
    }

    subject_alt_name(cert.tbs_certificate.extensions.as_deref())?
        .into_iter()
        .flat_map(|san| san.0)
        .find_map(|name| match name {
            GeneralName::DnsName(dns) => Some(dns.to_string()),
            _ => None,
        })
        .ok_or_else(|| eyre!("missing domain"))
}

/// URLs listed in the Authority Information Access extension for the given access method.
pub(crate) fn authority_info_access(
    cert: &Certificate,
    method: ObjectIdentifier,
) -> eyre::Result<Vec<String>> {
    let Some(ext) = find_extension(
        cert.tbs_certificate.extensions.as_deref(),
        AuthorityInfoAccessSyntax::OID,
    ) else {
        return Ok(Vec::new());
    };

    let aia = AuthorityInfoAccessSyntax::from_der(ext.extn_value.as_bytes())?;

    Ok(aia
        .0
        .into_iter()
        .filter(|desc| desc.access_method == method)
        .filter_map(|desc| match desc.access_location {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
            _ => None,
        })
        .collect())
}

/// Extensions requested by a CSR (the PKCS#9 `extensionRequest` attribute).
pub(crate) fn csr_extensions(csr: &CertReq) -> eyre::Result<Vec<Extension>> {
    let Some(attr) = csr
        .info
        .attributes
        .iter()
        .find(|attr| attr.oid == EXTENSION_REQUEST)
    else {
        return Ok(Vec::new());
    };

    let mut extensions = Vec::new();

    for value in attr.values.iter() {
        let der = der::Encode::to_der(value)?;
        extensions.extend(Vec::<Extension>::from_der(&der)?);
    }

    Ok(extensions)
}

/// Reads a PEM encoded CSR.
pub fn csr_from_pem(pem: &str) -> eyre::Result<CertReq> {
    CertReq::from_pem(pem).wrap_err("parse CSR")
}

/// Encodes a CSR as PEM.
pub fn csr_to_pem(csr: &CertReq) -> eyre::Result<String> {
    csr.to_pem(pem::LineEnding::LF).wrap_err("encode CSR")
}

/// Encodes a DER certificate as a PEM `CERTIFICATE` block.
pub(crate) fn certificate_pem(der: &[u8]) -> eyre::Result<String> {
    pem::encode_string("CERTIFICATE", pem::LineEnding::LF, der).wrap_err("encode certificate")
}

fn find_extension(extensions: Option<&[Extension]>, oid: ObjectIdentifier) -> Option<&Extension> {
    extensions?.iter().find(|ext| ext.extn_id == oid)
}

fn subject_alt_name(extensions: Option<&[Extension]>) -> eyre::Result<Option<SubjectAltName>> {
    find_extension(extensions, SubjectAltName::OID)
        .map(|ext| SubjectAltName::from_der(ext.extn_value.as_bytes()))
        .transpose()
        .wrap_err("parse subject alternative names")
}

pub(crate) fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == COMMON_NAME)
        .and_then(|atv| directory_string(&atv.value))
        .filter(|cn| !cn.is_empty())
}

fn directory_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(value.value()).ok().map(str::to_owned)
        }
        _ => None,
    }
}

fn merge_names(cn: Option<String>, san: Option<SubjectAltName>) -> Vec<String> {
    let mut names = Vec::new();

    if let Some(cn) = &cn {
        names.push(cn.clone());
    }

    let mut dns_names = Vec::new();
    let mut ips = Vec::new();

    for name in san.into_iter().flat_map(|san| san.0) {
        match name {
            GeneralName::DnsName(dns) => dns_names.push(dns.to_string()),
            GeneralName::IpAddress(ip) => {
                if let Some(ip) = ip_from_octets(ip.as_bytes()) {
                    ips.push(ip.to_string());
                }
            }
            _ => {}
        }
    }

    for name in dns_names.into_iter().chain(ips) {
        if Some(&name) != cn.as_ref() && !names.contains(&name) {
            names.push(name);
        }
    }

    names
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => <[u8; 4]>::try_from(octets).ok().map(|o| Ipv4Addr::from(o).into()),
        16 => <[u8; 16]>::try_from(octets).ok().map(|o| Ipv6Addr::from(o).into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestPki;

    #[test]
    fn bundle_parsing() {
        let pki = TestPki::new("Test Root X1");
        let leaf = pki.leaf(&["example.com", "www.example.com"]);

        let bundle = format!("{}{}", leaf.pem, pki.intermediate_pem);
        let certs = parse_pem_bundle(&bundle).unwrap();
        assert_eq!(certs.len(), 2);

        assert!(!is_ca(&certs[0]).unwrap());
        assert!(is_ca(&certs[1]).unwrap());

        assert!(parse_pem_bundle("no certificates here").is_err());
    }

    #[test]
    fn names_from_certificate() {
        let pki = TestPki::new("Test Root X1");
        let leaf = pki.leaf(&["example.com", "www.example.com", "192.0.2.10"]);
        let cert = &parse_pem_bundle(&leaf.pem).unwrap()[0];

        assert_eq!(
            certificate_names(cert).unwrap(),
            ["example.com", "www.example.com", "192.0.2.10"]
        );
        assert_eq!(main_domain(cert).unwrap(), "example.com");
    }

    #[test]
    fn csr_pem_round_trip() {
        let key = PrivateKey::generate(KeyType::Ec256).unwrap();
        let csr = create_csr(
            &key,
            &CsrOptions {
                common_name: "example.com".to_owned(),
                san: vec!["example.com".to_owned(), "www.example.com".to_owned()],
                ..Default::default()
            },
        )
        .unwrap();

        let pem = csr_to_pem(&csr).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert_eq!(csr_from_pem(&pem).unwrap(), csr);
    }
}
