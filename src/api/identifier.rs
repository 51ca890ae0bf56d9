use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// An identifier the order or authorization is about.
///
/// `dns` identifiers are defined by [RFC 8555 §9.7.7], `ip` identifiers by [RFC 8738].
///
/// [RFC 8555 §9.7.7]: https://datatracker.ietf.org/doc/html/rfc8555#section-9.7.7
/// [RFC 8738]: https://datatracker.ietf.org/doc/html/rfc8738
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub _type: String,
    pub value: String,
}

impl Identifier {
    pub(crate) fn dns(value: &str) -> Self {
        Self {
            _type: "dns".to_owned(),
            value: value.to_owned(),
        }
    }

    pub(crate) fn ip(value: &str) -> Self {
        Self {
            _type: "ip".to_owned(),
            value: value.to_owned(),
        }
    }

    /// Picks `ip` for IP literals and `dns` for everything else.
    pub(crate) fn for_name(name: &str) -> Self {
        if name.parse::<IpAddr>().is_ok() {
            Self::ip(name)
        } else {
            Self::dns(name)
        }
    }

    pub fn is_type_dns(&self) -> bool {
        self._type == "dns"
    }

    pub fn is_type_ip(&self) -> bool {
        self._type == "ip"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_type_from_name() {
        assert!(Identifier::for_name("example.com").is_type_dns());
        assert!(Identifier::for_name("*.example.com").is_type_dns());
        assert!(Identifier::for_name("192.0.2.1").is_type_ip());
        assert!(Identifier::for_name("2001:db8::1").is_type_ip());
    }
}
