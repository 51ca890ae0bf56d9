//! Flattened JWS requests, see [RFC 8555 §6.2].
//!
//! Every request is signed with the account key using `ES256`. The protected header carries the
//! full public key for account lookups and the account URL (`kid`) for everything else.
//!
//! [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2

use base64::prelude::*;
use ecdsa::signature::Signer as _;
use serde::Serialize;
use sha2::{Digest as _, Sha256};

use crate::acc::AcmeKey;

const ALG: &str = "ES256";

/// How the protected header identifies the signing key. Exactly one of `jwk` and `kid` is sent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum KeyRef<'a> {
    Jwk(Jwk),
    Kid(&'a str),
}

#[derive(Debug, Serialize)]
pub(crate) struct Protected<'a> {
    alg: &'static str,
    nonce: &'a str,
    url: &'a str,
    #[serde(flatten)]
    key: KeyRef<'a>,
}

impl<'a> Protected<'a> {
    /// Header embedding the public key, for requests made before the account URL is known.
    pub(crate) fn with_jwk(key: &AcmeKey, url: &'a str, nonce: &'a str) -> eyre::Result<Self> {
        Ok(Self {
            alg: ALG,
            nonce,
            url,
            key: KeyRef::Jwk(Jwk::new(key)?),
        })
    }

    pub(crate) fn with_kid(key: &'a AcmeKey, url: &'a str, nonce: &'a str) -> eyre::Result<Self> {
        Ok(Self {
            alg: ALG,
            nonce,
            url,
            key: KeyRef::Kid(key.key_id()?),
        })
    }
}

/// Public part of the account key ([RFC 7517]).
///
/// [RFC 7517]: https://datatracker.ietf.org/doc/html/rfc7517
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Jwk {
    alg: &'static str,
    crv: &'static str,
    kty: &'static str,
    #[serde(rename = "use")]
    usage: &'static str,
    x: String,
    y: String,
}

impl Jwk {
    pub(crate) fn new(key: &AcmeKey) -> eyre::Result<Self> {
        let point = key.signing_key().verifying_key().to_encoded_point(false);

        let (Some(x), Some(y)) = (point.x(), point.y()) else {
            return Err(eyre::eyre!("account public key is the identity point"));
        };

        Ok(Self {
            alg: ALG,
            crv: "P-256",
            kty: "EC",
            usage: "sig",
            x: BASE64_URL_SAFE_NO_PAD.encode(x),
            y: BASE64_URL_SAFE_NO_PAD.encode(y),
        })
    }

    /// Base64url encoded SHA-256 thumbprint ([RFC 7638 §3]).
    ///
    /// Only the required members are hashed, in lexicographic order and without whitespace.
    ///
    /// [RFC 7638 §3]: https://datatracker.ietf.org/doc/html/rfc7638#section-3
    pub(crate) fn thumbprint(&self) -> String {
        let json = format!(
            r#"{{"crv":"{}","kty":"{}","x":"{}","y":"{}"}}"#,
            self.crv, self.kty, self.x, self.y,
        );

        BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(json))
    }
}

/// <https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2>
#[derive(Debug, Serialize)]
struct FlattenedJws {
    protected: String,
    payload: String,
    signature: String,
}

/// Signs `payload` and returns the flattened JWS JSON.
///
/// A payload serializing to `""` (POST-as-GET) is sent as an empty payload.
pub(crate) fn sign<T>(protected: &Protected<'_>, key: &AcmeKey, payload: &T) -> eyre::Result<String>
where
    T: Serialize + ?Sized,
{
    let protected = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_string(protected)?);

    let payload = match serde_json::to_string(payload)?.as_str() {
        r#""""# => String::new(),
        json => BASE64_URL_SAFE_NO_PAD.encode(json),
    };

    let signature: p256::ecdsa::Signature = key
        .signing_key()
        .try_sign(format!("{protected}.{payload}").as_bytes())?;

    let jws = FlattenedJws {
        protected,
        payload,
        signature: BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes()),
    };

    Ok(serde_json::to_string(&jws)?)
}
