use std::collections::BTreeMap;

use eyre::{eyre, WrapErr as _};

use crate::{cert, client::RawCertificate};

/// Picks one chain out of the candidates returned by the CA.
///
/// Without preference, or when no candidate's topmost issuer certificate was issued by
/// `preferred`, the chain at `default_url` is returned. Candidates are checked in URL order.
pub(crate) fn select(
    mut certs: BTreeMap<String, RawCertificate>,
    default_url: &str,
    preferred: Option<&str>,
) -> eyre::Result<(String, RawCertificate)> {
    if let Some(preferred) = preferred {
        for (url, raw) in &certs {
            if has_preferred_issuer(raw, preferred).wrap_err_with(|| format!("chain {url}"))? {
                let url = url.clone();
                return remove(&mut certs, &url);
            }
        }

        log::info!("acme: No chain issued by {preferred:?}, using the default chain");
    }

    remove(&mut certs, default_url)
}

fn has_preferred_issuer(raw: &RawCertificate, preferred: &str) -> eyre::Result<bool> {
    let issuers = cert::parse_pem_bundle(&raw.issuer)?;

    let Some(top) = issuers.last() else {
        return Ok(false);
    };

    Ok(cert::common_name(&top.tbs_certificate.issuer).as_deref() == Some(preferred))
}

fn remove(
    certs: &mut BTreeMap<String, RawCertificate>,
    url: &str,
) -> eyre::Result<(String, RawCertificate)> {
    certs
        .remove_entry(url)
        .ok_or_else(|| eyre!("no certificate was returned for {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestPki;

    fn candidates() -> BTreeMap<String, RawCertificate> {
        let default = TestPki::new("Test Root X1");
        let alternate = TestPki::new("Alt Root X2");

        BTreeMap::from([
            (
                "https://ca.example/cert/1".to_owned(),
                RawCertificate {
                    cert: default.leaf(&["example.com"]).pem,
                    issuer: default.intermediate_pem.clone(),
                },
            ),
            (
                "https://ca.example/cert/1/1".to_owned(),
                RawCertificate {
                    cert: alternate.leaf(&["example.com"]).pem,
                    issuer: alternate.intermediate_pem.clone(),
                },
            ),
        ])
    }

    #[test]
    fn default_without_preference() {
        let (url, _) = select(candidates(), "https://ca.example/cert/1", None).unwrap();
        assert_eq!(url, "https://ca.example/cert/1");
    }

    #[test]
    fn preferred_issuer_wins() {
        let (url, raw) =
            select(candidates(), "https://ca.example/cert/1", Some("Alt Root X2")).unwrap();

        assert_eq!(url, "https://ca.example/cert/1/1");
        assert!(!raw.issuer.is_empty());
    }

    #[test]
    fn no_match_falls_back_to_default() {
        let (url, _) =
            select(candidates(), "https://ca.example/cert/1", Some("Unknown Root")).unwrap();
        assert_eq!(url, "https://ca.example/cert/1");
    }

    #[test]
    fn missing_default_fails() {
        assert!(select(candidates(), "https://ca.example/cert/2", None).is_err());
    }
}
