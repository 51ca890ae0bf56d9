use der::Decode as _;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::cert;

/// An issued certificate together with everything needed to renew it.
///
/// Only the domain and the URLs are (de)serialized. Key, certificates and CSR are meant to be
/// stored as separate PEM files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// The main domain of the certificate.
    pub domain: String,

    /// URL the certificate was fetched from.
    pub cert_url: String,

    pub cert_stable_url: String,

    /// PEM encoded private key, absent when issuance was driven by a CSR without key.
    #[serde(skip)]
    pub private_key: Option<Zeroizing<String>>,

    /// PEM encoded certificate, with the issuer chain appended when bundled.
    ///
    /// The first entry is never a CA certificate.
    #[serde(skip)]
    pub certificate: Option<String>,

    /// PEM encoded issuer chain.
    #[serde(skip)]
    pub issuer_certificate: Option<String>,

    /// PEM encoded CSR the certificate was issued for, when known.
    #[serde(skip)]
    pub csr: Option<String>,
}

impl Resource {
    /// DER encoded certificates of [`certificate`](Self::certificate), leaf first.
    pub fn certificate_chain(&self) -> eyre::Result<Vec<Vec<u8>>> {
        let pem = self
            .certificate
            .as_deref()
            .ok_or_else(|| eyre::eyre!("[{}] resource holds no certificate", self.domain))?;

        cert::pem_bundle_der(pem)
    }

    /// Whole days until the leaf certificate expires, negative once it has.
    pub fn valid_days_left(&self) -> eyre::Result<i64> {
        let chain = self.certificate_chain()?;
        let leaf = x509_cert::Certificate::from_der(&chain[0])?;

        let not_after = leaf.tbs_certificate.validity.not_after.to_unix_duration();
        let not_after = OffsetDateTime::UNIX_EPOCH + not_after;

        Ok((not_after - OffsetDateTime::now_utc()).whole_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestPki;

    #[test]
    fn only_urls_are_serialized() {
        let res = Resource {
            domain: "example.com".to_owned(),
            cert_url: "https://ca.example/cert/1".to_owned(),
            cert_stable_url: "https://ca.example/cert/1".to_owned(),
            private_key: Some(Zeroizing::new("KEY".to_owned())),
            certificate: Some("CERT".to_owned()),
            issuer_certificate: Some("ISSUER".to_owned()),
            csr: Some("CSR".to_owned()),
        };

        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "domain": "example.com",
                "certUrl": "https://ca.example/cert/1",
                "certStableUrl": "https://ca.example/cert/1",
            })
        );

        let back = serde_json::from_value::<Resource>(json).unwrap();
        assert!(back.private_key.is_none());
        assert!(back.certificate.is_none());
    }

    #[test]
    fn days_left() {
        let pki = TestPki::new("Test Root X1");
        let leaf = pki.leaf(&["example.com"]);

        let res = Resource {
            certificate: Some(leaf.pem),
            ..Default::default()
        };

        // test leaves are valid for 90 days
        let days = res.valid_days_left().unwrap();
        assert!((88..=90).contains(&days), "{days}");

        assert!(Resource::default().valid_days_left().is_err());
    }
}
