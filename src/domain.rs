//! Domain name sanitizing.
//!
//! Identifiers must be encoded the way they appear in a certificate ([RFC 8555 §7.1.4]), which for
//! internationalized names means their ASCII-compatible (punycode) form ([RFC 5280 §7]).
//!
//! [RFC 8555 §7.1.4]: https://www.rfc-editor.org/rfc/rfc8555.html#section-7.1.4
//! [RFC 5280 §7]: https://www.rfc-editor.org/rfc/rfc5280.html#section-7

use std::net::IpAddr;

use idna::uts46::{AsciiDenyList, DnsLength, Hyphens, Uts46};

/// Converts each domain to its ASCII form, keeping input order.
///
/// Domains that cannot be converted are logged and skipped, so the result may be shorter than the
/// input (or empty).
pub fn sanitize_domains<S: AsRef<str>>(domains: &[S]) -> Vec<String> {
    domains
        .iter()
        .filter_map(|domain| {
            let domain = domain.as_ref();

            match to_ascii(domain) {
                Ok(sanitized) => Some(sanitized),
                Err(err) => {
                    log::info!("skip domain {domain:?}: unable to sanitize (punycode): {err}");
                    None
                }
            }
        })
        .collect()
}

/// Host names only: STD3 rules reject spaces and other non-LDH ASCII, and the DNS length limits
/// apply.
fn to_ascii(domain: &str) -> Result<String, idna::Errors> {
    if domain.parse::<IpAddr>().is_ok() {
        return Ok(domain.to_owned());
    }

    let (prefix, name) = match domain.strip_prefix("*.") {
        Some(base) => ("*.", base),
        None => ("", domain),
    };

    let ascii = Uts46::new().to_ascii(
        name.as_bytes(),
        AsciiDenyList::STD3,
        Hyphens::Allow,
        DnsLength::Verify,
    )?;

    Ok(format!("{prefix}{ascii}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_punycode() {
        let domains = sanitize_domains(&["example.com", "bücher.example", "*.münchen.de"]);
        assert_eq!(
            domains,
            ["example.com", "xn--bcher-kva.example", "*.xn--mnchen-3ya.de"]
        );
    }

    #[test]
    fn drops_failures_and_keeps_order() {
        let input = ["a.example", "bad domain.example", "b.example", "192.0.2.7", "c.example"];
        let domains = sanitize_domains(&input);

        assert_eq!(domains, ["a.example", "b.example", "192.0.2.7", "c.example"]);
        assert!(domains.len() <= input.len());
    }

    #[test]
    fn rejects_non_hostnames() {
        let too_long = format!("{}.example", "a".repeat(64));
        let domains = sanitize_domains(&[
            "under_score.example",
            "semi;colon.example",
            "trailing.dot.example.",
            too_long.as_str(),
            "*.bad name.example",
            "ok.example",
        ]);

        assert_eq!(domains, ["ok.example"]);
    }

    #[test]
    fn may_be_empty() {
        assert!(sanitize_domains(&["bad domain.example"]).is_empty());
        assert!(sanitize_domains::<&str>(&[]).is_empty());
    }
}
