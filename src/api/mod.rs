//! JSON API payloads.
//!
//! Not intended to be used directly. Provided to aid debugging and for implementing
//! [`AcmeClient`](crate::AcmeClient) / [`Resolver`](crate::Resolver).

use std::fmt;

use serde::{
    ser::{SerializeMap as _, Serializer},
    Deserialize, Serialize,
};

mod account;
mod authorization;
mod challenge;
mod directory;
mod finalize;
mod identifier;
mod order;
mod revocation;

pub use self::{
    account::{Account, AccountStatus},
    authorization::{Authorization, AuthorizationStatus, Deactivation},
    challenge::{Challenge, ChallengeStatus, ChallengeType},
    directory::{Directory, DirectoryMeta},
    finalize::Finalize,
    identifier::Identifier,
    order::{Order, OrderStatus},
    revocation::Revocation,
};

/// Serializes to `""`.
pub struct EmptyString;

impl Serialize for EmptyString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

/// Serializes to `{}`.
pub struct EmptyObject;

impl Serialize for EmptyObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}

/// Problem document returned by the ACME API.
///
/// See [RFC 8555 §6.7] and [RFC 7807].
///
/// [RFC 8555 §6.7]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.7
/// [RFC 7807]: https://datatracker.ietf.org/doc/html/rfc7807
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub _type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subproblems: Option<Vec<Subproblem>>,
}

impl Problem {
    /// Error name with the ACME namespace stripped, e.g. `badNonce`.
    fn kind(&self) -> &str {
        self._type
            .strip_prefix("urn:ietf:params:acme:error:")
            .or_else(|| self._type.strip_prefix("urn:acme:error:"))
            .unwrap_or(&self._type)
    }

    /// The nonce was stale or unknown; the request may be retried with a fresh one.
    pub fn is_bad_nonce(&self) -> bool {
        self.kind() == "badNonce"
    }

    /// The CA could not verify the request signature.
    pub fn is_jws_verification_error(&self) -> bool {
        self.kind() == "malformed" && self.detail.as_deref() == Some("JWS verification error")
    }

    /// The certificate named in `replaces` already has a successor order ([RFC 9773 §5]).
    ///
    /// [RFC 9773 §5]: https://www.rfc-editor.org/rfc/rfc9773.html#section-5
    pub fn is_already_replaced(&self) -> bool {
        self.kind() == "alreadyReplaced"
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self._type)?,
            _ => write!(f, "{}", self._type)?,
        }

        if let Some(subproblems) = &self.subproblems {
            for sub in subproblems {
                write!(f, "; {sub}")?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for Problem {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subproblem {
    #[serde(rename = "type")]
    pub _type: String,
    pub detail: Option<String>,
    pub identifier: Option<identifier::Identifier>,
}

impl fmt::Display for Subproblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.identifier {
            write!(f, "[{}] ", id.value)?;
        }

        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self._type),
            _ => write!(f, "{}", self._type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payloads() {
        assert_eq!(serde_json::to_string(&EmptyString).unwrap(), r#""""#);
        assert_eq!(serde_json::to_string(&EmptyObject).unwrap(), "{}");
    }

    #[test]
    fn problem_display_includes_subproblems() {
        let problem: Problem = serde_json::from_str(
            r#"{
                "type": "urn:ietf:params:acme:error:rejectedIdentifier",
                "detail": "Some identifiers were rejected",
                "status": 400,
                "subproblems": [
                    {
                        "type": "urn:ietf:params:acme:error:rejectedIdentifier",
                        "detail": "This CA will not issue for \"example.net\"",
                        "identifier": { "type": "dns", "value": "example.net" }
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(problem.status, Some(400));

        let msg = problem.to_string();
        assert!(msg.starts_with("urn:ietf:params:acme:error:rejectedIdentifier: Some identifiers"));
        assert!(msg.contains("[example.net]"));
    }

    #[test]
    fn problem_kinds() {
        let problem = Problem {
            _type: "urn:ietf:params:acme:error:badNonce".to_owned(),
            ..Default::default()
        };
        assert!(problem.is_bad_nonce());
        assert!(!problem.is_already_replaced());

        let problem = Problem {
            _type: "urn:ietf:params:acme:error:alreadyReplaced".to_owned(),
            ..Default::default()
        };
        assert!(problem.is_already_replaced());

        let problem = Problem {
            _type: "urn:acme:error:malformed".to_owned(),
            detail: Some("JWS verification error".to_owned()),
            ..Default::default()
        };
        assert!(problem.is_jws_verification_error());
        assert!(!problem.is_bad_nonce());
    }
}
