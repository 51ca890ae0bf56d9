use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Directory object for ACME client self-configuration, see [RFC 8555 §7.1.1].
///
/// Only the resources used by this crate are kept. For example:
///
/// ```json
/// {
///   "newNonce": "https://example.com/acme/new-nonce",
///   "newAccount": "https://example.com/acme/new-account",
///   "newOrder": "https://example.com/acme/new-order",
///   "revokeCert": "https://example.com/acme/revoke-cert",
///   "renewalInfo": "https://example.com/acme/renewal-info",
///   "meta": {
///     "profiles": { "classic": "90 day certificates" }
///   }
/// }
/// ```
///
/// [RFC 8555 §7.1.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub new_nonce: String,

    /// Used to look up existing accounts.
    pub new_account: String,

    pub new_order: String,

    pub revoke_cert: String,

    /// ACME Renewal Information endpoint ([RFC 9773]).
    ///
    /// Orders only name the certificate they replace when the CA advertises this.
    ///
    /// [RFC 9773]: https://www.rfc-editor.org/rfc/rfc9773.html
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_info: Option<String>,

    #[serde(default)]
    pub meta: DirectoryMeta,
}

impl Directory {
    pub fn supports_renewal_info(&self) -> bool {
        self.renewal_info.is_some()
    }
}

/// <https://datatracker.ietf.org/doc/html/rfc8555#section-9.7.6>
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,

    /// Certificate profiles offered by the CA, name to description.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_resources_are_ignored() {
        let dir = serde_json::from_str::<Directory>(
            r#"{
                "newNonce": "https://ca.example/nonce",
                "newAccount": "https://ca.example/acct",
                "newOrder": "https://ca.example/order",
                "newAuthz": "https://ca.example/authz",
                "revokeCert": "https://ca.example/revoke",
                "keyChange": "https://ca.example/key-change"
            }"#,
        )
        .unwrap();

        assert!(!dir.supports_renewal_info());
        assert!(dir.meta.profiles.is_empty());
    }
}
