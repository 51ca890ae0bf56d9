use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Authorization`].
///
/// See [RFC 8555 §7.1.4].
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

/// Represents a server's authorization for an account to represent an identifier, see
/// [RFC 8555 §7.1.4].
///
/// A failed challenge carries the reason in its `error` problem document.
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Base domain for wildcard orders, see [`targeted_domain`](Self::targeted_domain).
    pub identifier: api::Identifier,

    pub status: AuthorizationStatus,

    /// RFC 3339 timestamp.
    pub expires: Option<String>,

    /// Challenges that may be answered while pending; once valid or invalid, the one attempted.
    pub challenges: Vec<api::Challenge>,

    pub wildcard: Option<bool>,
}

impl Authorization {
    /// Returns the domain this authorization proves control over.
    ///
    /// Wildcard authorizations carry the base domain as identifier, so the `*.` label is put back.
    pub fn targeted_domain(&self) -> String {
        if self.wildcard == Some(true) {
            format!("*.{}", self.identifier.value)
        } else {
            self.identifier.value.clone()
        }
    }

    /// Returns the challenge of the given type, if the CA offers one.
    pub fn challenge(&self, kind: api::ChallengeType) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c.is(kind))
    }
}

/// Request body deactivating an authorization ([RFC 8555 §7.5.2]).
///
/// [RFC 8555 §7.5.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.5.2
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deactivation {
    status: AuthorizationStatus,
}

impl Deactivation {
    pub(crate) fn new() -> Self {
        Self {
            status: AuthorizationStatus::Deactivated,
        }
    }
}
