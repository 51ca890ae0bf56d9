use eyre::{eyre, WrapErr as _};
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use zeroize::Zeroizing;

/// Account key, always ECDSA P-256 (JWS `ES256`).
#[derive(Clone, Debug)]
pub(crate) struct AcmeKey {
    signing_key: p256::ecdsa::SigningKey,

    /// Account URL, known after the account lookup.
    key_id: Option<String>,
}

impl AcmeKey {
    #[cfg(test)]
    pub(crate) fn new() -> AcmeKey {
        Self::from_key(p256::ecdsa::SigningKey::random(&mut rand::thread_rng()))
    }

    pub(crate) fn from_pem(pem: &str) -> eyre::Result<AcmeKey> {
        p256::ecdsa::SigningKey::from_pkcs8_pem(pem)
            .map(Self::from_key)
            .wrap_err("account key is not a PKCS#8 P-256 key")
    }

    fn from_key(signing_key: p256::ecdsa::SigningKey) -> AcmeKey {
        AcmeKey {
            signing_key,
            key_id: None,
        }
    }

    pub(crate) fn to_pem(&self) -> eyre::Result<Zeroizing<String>> {
        self.signing_key
            .to_pkcs8_pem(pem::LineEnding::LF)
            .wrap_err("failed to encode account key")
    }

    pub(crate) fn signing_key(&self) -> &p256::ecdsa::SigningKey {
        &self.signing_key
    }

    pub(crate) fn key_id(&self) -> eyre::Result<&str> {
        self.key_id
            .as_deref()
            .ok_or_else(|| eyre!("account key ID is not known yet"))
    }

    pub(crate) fn set_key_id(&mut self, kid: String) {
        self.key_id = Some(kid)
    }
}
