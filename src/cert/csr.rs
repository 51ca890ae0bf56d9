use std::net::IpAddr;

use der::{
    asn1::{Ia5String, OctetString},
    oid::{AssociatedOid, ObjectIdentifier},
    EncodeValue, FixedTag, Length, Tag, Writer,
};
use ecdsa::signature::Keypair;
use eyre::WrapErr as _;
use x509_cert::{
    builder::{Builder, RequestBuilder},
    ext::{
        pkix::{name::GeneralName, SubjectAltName},
        AsExtension, Extension,
    },
    name::Name,
    request::CertReq,
    spki::{DynSignatureAlgorithmIdentifier, EncodePublicKey},
};

use super::PrivateKey;

/// Inputs of [`create_csr`].
#[derive(Debug, Clone, Default)]
pub struct CsrOptions {
    /// Subject Common Name. Left out of the subject when empty.
    pub common_name: String,

    /// Subject Alternative Names. IP literals become `iPAddress` entries.
    pub san: Vec<String>,

    /// Request the OCSP must-staple TLS feature ([RFC 7633]).
    ///
    /// [RFC 7633]: https://datatracker.ietf.org/doc/html/rfc7633
    pub must_staple: bool,

    /// Email addresses added as `rfc822Name` SAN entries.
    pub email_addresses: Vec<String>,
}

/// Creates a CSR described by `options` and signs it with `key`.
pub fn create_csr(key: &PrivateKey, options: &CsrOptions) -> eyre::Result<CertReq> {
    let subject = if options.common_name.is_empty() {
        Name::default()
    } else {
        format!("CN={}", options.common_name)
            .parse::<Name>()
            .wrap_err("build CSR subject")?
    };

    let san = subject_alt_names(options)?;

    match key {
        PrivateKey::P256(signer) => {
            let mut csr = RequestBuilder::new(subject, signer)?;
            add_extensions(&mut csr, san, options.must_staple)?;
            csr.build::<p256::ecdsa::DerSignature>()
        }

        PrivateKey::P384(signer) => {
            let mut csr = RequestBuilder::new(subject, signer)?;
            add_extensions(&mut csr, san, options.must_staple)?;
            csr.build::<p384::ecdsa::DerSignature>()
        }

        PrivateKey::Rsa(key) => {
            let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(key.clone());
            let mut csr = RequestBuilder::new(subject, &signer)?;
            add_extensions(&mut csr, san, options.must_staple)?;
            csr.build::<rsa::pkcs1v15::Signature>()
        }
    }
    .wrap_err("build csr")
}

fn subject_alt_names(options: &CsrOptions) -> eyre::Result<Vec<GeneralName>> {
    let mut names = Vec::with_capacity(options.san.len() + options.email_addresses.len());

    for name in &options.san {
        let name = match name.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets().to_vec())?),
            Ok(IpAddr::V6(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets().to_vec())?),
            Err(_) => GeneralName::DnsName(
                Ia5String::new(name).wrap_err_with(|| format!("invalid SAN: {name}"))?,
            ),
        };

        names.push(name);
    }

    for email in &options.email_addresses {
        names.push(GeneralName::Rfc822Name(
            Ia5String::new(email).wrap_err_with(|| format!("invalid email address: {email}"))?,
        ));
    }

    Ok(names)
}

fn add_extensions<S>(
    csr: &mut RequestBuilder<'_, S>,
    san: Vec<GeneralName>,
    must_staple: bool,
) -> Result<(), x509_cert::builder::Error>
where
    S: Keypair + DynSignatureAlgorithmIdentifier,
    S::VerifyingKey: EncodePublicKey,
{
    if !san.is_empty() {
        csr.add_extension(&SubjectAltName(san))?;
    }

    if must_staple {
        csr.add_extension(&TlsFeature::status_request())?;
    }

    Ok(())
}

/// TLS Feature extension ([RFC 7633 §6]), `SEQUENCE OF INTEGER`.
///
/// [RFC 7633 §6]: https://datatracker.ietf.org/doc/html/rfc7633#section-6
#[derive(Debug, Clone, PartialEq, Eq)]
struct TlsFeature(Vec<u32>);

impl TlsFeature {
    /// `status_request` (5), a.k.a. OCSP must-staple.
    fn status_request() -> Self {
        Self(vec![5])
    }
}

impl AssociatedOid for TlsFeature {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.1.24");
}

impl FixedTag for TlsFeature {
    const TAG: Tag = Tag::Sequence;
}

impl EncodeValue for TlsFeature {
    fn value_len(&self) -> der::Result<Length> {
        self.0.value_len()
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.0.encode_value(writer)
    }
}

impl AsExtension for TlsFeature {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use der::{Decode as _, Encode as _};

    use super::*;
    use crate::cert::{csr_names, KeyType};

    fn options(common_name: &str, san: &[&str]) -> CsrOptions {
        CsrOptions {
            common_name: common_name.to_owned(),
            san: san.iter().map(|s| (*s).to_owned()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn common_name_and_san() {
        let key = PrivateKey::generate(KeyType::Ec256).unwrap();
        let csr = create_csr(&key, &options("example.com", &["example.com", "www.example.com"]))
            .unwrap();

        assert_eq!(csr_names(&csr).unwrap(), ["example.com", "www.example.com"]);
    }

    #[test]
    fn san_only() {
        let key = PrivateKey::generate(KeyType::Ec384).unwrap();
        let csr = create_csr(&key, &options("", &["a.example", "192.0.2.1"])).unwrap();

        assert!(csr.info.subject.0.is_empty());
        assert_eq!(csr_names(&csr).unwrap(), ["a.example", "192.0.2.1"]);
    }

    #[test]
    fn must_staple_extension() {
        let key = PrivateKey::generate(KeyType::Ec256).unwrap();
        let mut opts = options("example.com", &["example.com"]);
        opts.must_staple = true;
        opts.email_addresses = vec!["admin@example.com".to_owned()];

        let csr = create_csr(&key, &opts).unwrap();
        let exts = crate::cert::csr_extensions(&csr).unwrap();

        let feature = exts
            .iter()
            .find(|ext| ext.extn_id == TlsFeature::OID)
            .expect("TLS feature extension");
        assert_eq!(feature.extn_value.as_bytes(), [0x30, 0x03, 0x02, 0x01, 0x05]);

        let san = exts
            .iter()
            .find(|ext| ext.extn_id == SubjectAltName::OID)
            .unwrap();
        let san = SubjectAltName::from_der(san.extn_value.as_bytes()).unwrap();
        let has_email = san.0.iter().any(|name| {
            matches!(name, GeneralName::Rfc822Name(email) if email.to_string() == "admin@example.com")
        });
        assert!(has_email);

        // survives a DER round trip
        let der = csr.to_der().unwrap();
        assert_eq!(CertReq::from_der(&der).unwrap(), csr);
    }
}
