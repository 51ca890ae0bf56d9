use serde::{Deserialize, Serialize};

/// An ACME account resource, see [RFC 8555 §7.1.2].
///
/// Only sent to look up the account of a key. This crate does not register accounts.
///
/// [RFC 8555 §7.1.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.2
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_return_existing: Option<bool>,

    /// URL of the account's order list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

impl Account {
    pub(crate) fn lookup() -> Self {
        Self {
            only_return_existing: Some(true),
            ..Default::default()
        }
    }

    /// True unless the CA reported the account as deactivated or revoked.
    pub fn is_usable(&self) -> bool {
        matches!(self.status, None | Some(AccountStatus::Valid))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Valid,
    Deactivated,
    Revoked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_body() {
        let json = serde_json::to_value(Account::lookup()).unwrap();
        assert_eq!(json, serde_json::json!({ "onlyReturnExisting": true }));
    }

    #[test]
    fn revoked_account_is_unusable() {
        let acc = serde_json::from_str::<Account>(r#"{ "status": "revoked" }"#).unwrap();
        assert_eq!(acc.status, Some(AccountStatus::Revoked));
        assert!(!acc.is_usable());

        assert!(Account::default().is_usable());
    }
}
