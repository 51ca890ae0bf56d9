use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Order`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

/// A request for one certificate, tracked from creation to issuance ([RFC 8555 §7.1.3]).
///
/// The same type is sent as the `newOrder` payload, which only carries the identifiers and the
/// optional fields below.
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    pub identifiers: Vec<api::Identifier>,

    /// RFC 3339 timestamps requested for the certificate validity window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,

    /// Certificate profile name, see [draft-aaron-acme-profiles].
    ///
    /// [draft-aaron-acme-profiles]: https://www.ietf.org/id/draft-aaron-acme-profiles-00.html#section-4
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// ARI certificate identifier of the certificate this order replaces, see [RFC 9773 §5].
    ///
    /// [RFC 9773 §5]: https://www.rfc-editor.org/rfc/rfc9773.html#section-5
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub finalize: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl Order {
    pub(crate) fn from_identifiers(identifiers: Vec<api::Identifier>) -> Self {
        Self {
            identifiers,
            ..Default::default()
        }
    }

    /// Identifier values in request order.
    pub fn domains(&self) -> Vec<&str> {
        self.identifiers.iter().map(|id| id.value.as_str()).collect()
    }

    /// Takes over the CA's view of the order, keeping the identifiers in the order they were
    /// requested. CAs may reorder them, which would swap the common name with a SAN.
    pub(crate) fn overwrite(&mut self, mut from_api: Self) -> eyre::Result<()> {
        let same_set = from_api.identifiers.len() == self.identifiers.len()
            && from_api.identifiers.iter().all(|id| self.identifiers.contains(id));

        if !same_set {
            eyre::bail!(
                "CA returned identifiers {:?} for an order of {:?}",
                from_api.identifiers,
                self.identifiers,
            );
        }

        from_api.identifiers = std::mem::take(&mut self.identifiers);
        *self = from_api;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_payload_omits_empty_fields() {
        let mut order = Order::from_identifiers(vec![api::Identifier::dns("example.com")]);
        order.profile = Some("tlsserver".to_owned());

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "identifiers": [{ "type": "dns", "value": "example.com" }],
                "profile": "tlsserver"
            })
        );
    }

    #[test]
    fn overwrite_keeps_requested_order() {
        let mut order = Order::from_identifiers(vec![
            api::Identifier::dns("example.com"),
            api::Identifier::dns("www.example.com"),
        ]);

        let from_api = Order {
            status: Some(OrderStatus::Pending),
            identifiers: vec![
                api::Identifier::dns("www.example.com"),
                api::Identifier::dns("example.com"),
            ],
            finalize: "https://ca.test/finalize/1".to_owned(),
            ..Default::default()
        };

        order.overwrite(from_api).unwrap();
        assert_eq!(order.domains(), ["example.com", "www.example.com"]);
        assert_eq!(order.status, Some(OrderStatus::Pending));
        assert_eq!(order.finalize, "https://ca.test/finalize/1");

        let mismatched = Order::from_identifiers(vec![api::Identifier::dns("other.com")]);
        assert!(order.overwrite(mismatched).is_err());
    }
}
