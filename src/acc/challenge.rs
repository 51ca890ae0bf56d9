//! Helpers for writing a [`Resolver`](crate::Resolver).

use std::time::Duration;

use base64::prelude::*;
use sha2::{Digest as _, Sha256};

use super::{Account, AccountInner, AcmeKey};
use crate::{api, jws::Jwk};

impl Account {
    /// Key authorization for a challenge token, see [RFC 8555 §8.1].
    ///
    /// [RFC 8555 §8.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.1
    pub fn key_authorization(&self, token: &str) -> eyre::Result<String> {
        key_authorization(token, self.inner.transport.acme_key())
    }

    /// Contents of the file served under
    /// `http://<domain>/.well-known/acme-challenge/<token>`, see [RFC 8555 §8.3].
    ///
    /// [RFC 8555 §8.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.3
    pub fn http01_proof(&self, challenge: &api::Challenge) -> eyre::Result<String> {
        self.key_authorization(&challenge.token)
    }

    /// Value of the `_acme-challenge.<domain>.` TXT record, see [RFC 8555 §8.4].
    ///
    /// [RFC 8555 §8.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.4
    pub fn dns01_proof(&self, challenge: &api::Challenge) -> eyre::Result<String> {
        let digest = Sha256::digest(self.key_authorization(&challenge.token)?);
        Ok(BASE64_URL_SAFE_NO_PAD.encode(digest))
    }

    /// SHA-256 digest of the key authorization, placed in the `acmeIdentifier` extension of the
    /// validation certificate, see [RFC 8737 §3].
    ///
    /// [RFC 8737 §3]: https://datatracker.ietf.org/doc/html/rfc8737#section-3
    pub fn tls_alpn01_proof(&self, challenge: &api::Challenge) -> eyre::Result<[u8; 32]> {
        Ok(Sha256::digest(self.key_authorization(&challenge.token)?).into())
    }

    /// Tells the CA to validate `challenge` and waits until its authorization leaves `pending`.
    ///
    /// The proof must be in place before calling this.
    pub async fn validate_challenge(
        &self,
        challenge: &api::Challenge,
        authz_url: &str,
        delay: Duration,
    ) -> eyre::Result<()> {
        self.inner
            .transport
            .call_kid(&challenge.url, &api::EmptyObject)
            .await?
            .json::<api::Challenge>()
            .await?;

        let authz = settled_authorization(&self.inner, authz_url, delay).await?;

        if authz.status == api::AuthorizationStatus::Valid {
            return Ok(());
        }

        let domain = authz.targeted_domain();
        match authz.challenges.iter().find_map(|c| c.error.as_ref()) {
            Some(problem) => eyre::bail!("[{domain}] validation failed: {problem}"),
            None => eyre::bail!("[{domain}] authorization is {:?}", authz.status),
        }
    }
}

fn key_authorization(token: &str, key: &AcmeKey) -> eyre::Result<String> {
    Ok(format!("{token}.{}", Jwk::new(key)?.thumbprint()))
}

/// Re-reads the authorization every `delay` until it is no longer pending.
async fn settled_authorization(
    acc: &AccountInner,
    authz_url: &str,
    delay: Duration,
) -> eyre::Result<api::Authorization> {
    loop {
        let authz = acc
            .transport
            .call_kid(authz_url, &api::EmptyString)
            .await?
            .json::<api::Authorization>()
            .await?;

        if authz.status != api::AuthorizationStatus::Pending {
            return Ok(authz);
        }

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::with_directory_server, AcmeClient as _, Directory, DirectoryUrl};

    #[tokio::test]
    async fn proofs() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();
        let acc = dir
            .account(&server.account_key_pem, &format!("{}/acme/acct/1", server.url))
            .unwrap();

        let authz = acc
            .get_authorization(&format!("{}/acme/authz/1", server.url))
            .await
            .unwrap();

        let http = authz.challenge(api::ChallengeType::Http01).unwrap();
        let proof = acc.http01_proof(http).unwrap();
        assert!(proof.starts_with(&format!("{}.", http.token)));
        assert_eq!(proof, acc.key_authorization(&http.token).unwrap());

        let dns = authz.challenge(api::ChallengeType::Dns01).unwrap();
        let dns_proof = acc.dns01_proof(dns).unwrap();
        assert_eq!(dns_proof.len(), 43);
        assert_ne!(dns_proof, acc.key_authorization(&dns.token).unwrap());

        let alpn = authz.challenge(api::ChallengeType::TlsAlpn01).unwrap();
        let digest = acc.tls_alpn01_proof(alpn).unwrap();
        let key_auth = acc.key_authorization(&alpn.token).unwrap();
        assert_eq!(digest, <[u8; 32]>::from(Sha256::digest(key_auth)));
    }

    #[tokio::test]
    async fn validate() {
        let server = with_directory_server();
        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();
        let acc = dir.load_existing_account(&server.account_key_pem).await.unwrap();

        let authz_url = format!("{}/acme/authz/1", server.url);
        let authz = acc.get_authorization(&authz_url).await.unwrap();
        let http = authz.challenge(api::ChallengeType::Http01).unwrap();

        acc.validate_challenge(http, &authz_url, Duration::from_millis(10))
            .await
            .unwrap();
    }
}
