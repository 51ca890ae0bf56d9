use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Challenge`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

/// Challenge types a [`Resolver`](crate::Resolver) can answer with the helpers on
/// [`Account`](crate::Account).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeType {
    /// [RFC 8555 §8.3](https://datatracker.ietf.org/doc/html/rfc8555#section-8.3)
    Http01,
    /// [RFC 8555 §8.4](https://datatracker.ietf.org/doc/html/rfc8555#section-8.4)
    Dns01,
    /// [RFC 8737](https://datatracker.ietf.org/doc/html/rfc8737)
    TlsAlpn01,
}

impl ChallengeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeType::Http01 => "http-01",
            ChallengeType::Dns01 => "dns-01",
            ChallengeType::TlsAlpn01 => "tls-alpn-01",
        }
    }
}

/// An ACME challenge object.
///
/// See [RFC 8555 §7.1.5].
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Challenge type, e.g. `http-01`, `dns-01` or `tls-alpn-01`.
    #[serde(rename = "type")]
    pub _type: String,

    /// URL to which a response can be posted.
    pub url: String,

    pub status: ChallengeStatus,

    /// Time at which the server validated this challenge, RFC 3339.
    pub validated: Option<String>,

    /// Error that occurred while the server was validating the challenge, if any.
    pub error: Option<api::Problem>,

    pub token: String,
}

impl Challenge {
    pub fn is(&self, kind: ChallengeType) -> bool {
        self._type == kind.as_str()
    }

    /// Returns true if the CA still waits for this challenge to be answered.
    ///
    /// It might already have been validated in a previous order for the same account.
    pub fn needs_validation(&self) -> bool {
        matches!(self.status, ChallengeStatus::Pending)
    }
}
