use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::RevocationReason;

/// Certificate revocation request.
///
/// See [RFC 8555 §7.6].
///
/// [RFC 8555 §7.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// The certificate to be revoked, in the base64url-encoded version of the DER format.
    ///
    /// Note: not PEM, since headers are omitted.
    pub certificate: String,

    /// One of the revocation reasonCodes defined in [RFC 5280 §5.3.1].
    ///
    /// [RFC 5280 §5.3.1]: https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<u32>,
}

impl Revocation {
    /// Builds the revocation message for a DER encoded certificate.
    pub fn new(certificate_der: &[u8], reason: Option<RevocationReason>) -> Self {
        let reason = match reason {
            // > the reason code CRL entry extension SHOULD be absent instead of
            // > using the unspecified (0) reasonCode value
            // see <https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1>
            None | Some(RevocationReason::Unspecified) => None,
            Some(reason) => Some(reason as u32),
        };

        Self {
            certificate: BASE64_URL_SAFE_NO_PAD.encode(certificate_der),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes() {
        let msg = Revocation::new(b"\x30\x03\x02\x01\x05", Some(RevocationReason::KeyCompromise));
        assert_eq!(msg.certificate, "MAMCAQU");
        assert_eq!(msg.reason, Some(1));

        let msg = Revocation::new(b"\x30\x00", Some(RevocationReason::Unspecified));
        assert_eq!(msg.reason, None);
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"certificate":"MAA"}"#);
    }
}
