use std::sync::Arc;

use crate::{
    acc::AcmeKey,
    api,
    limit::RequestLimiter,
    req::{req_expect_header, req_get, req_handle_error},
    trans::{NoncePool, Transport},
    Account,
};

const LETSENCRYPT_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Where to fetch the ACME directory from.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// Let's Encrypt production. Issues publicly trusted certificates under strict rate limits.
    LetsEncrypt,

    /// Let's Encrypt staging. Certificates chain to an untrusted root.
    LetsEncryptStaging,

    /// Any other CA, e.g. a local Pebble instance.
    Other(&'a str),
}

impl DirectoryUrl<'_> {
    fn as_str(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT_URL,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING_URL,
            DirectoryUrl::Other(url) => url,
        }
    }
}

/// A fetched ACME directory, from which accounts are loaded.
///
/// Accounts created from the same directory share its nonce pool and request limiter.
#[derive(Debug, Clone)]
pub struct Directory {
    nonce_pool: Arc<NoncePool>,
    limiter: Arc<RequestLimiter>,
    api_directory: api::Directory,
}

impl Directory {
    /// Downloads the directory and prepares a nonce pool for its `newNonce` resource.
    pub async fn fetch(url: DirectoryUrl<'_>) -> eyre::Result<Directory> {
        let res = req_handle_error(req_get(url.as_str()).await?).await?;
        let api_directory = res.json::<api::Directory>().await?;
        let nonce_pool = Arc::new(NoncePool::new(&api_directory.new_nonce));

        Ok(Directory {
            nonce_pool,
            limiter: Arc::new(RequestLimiter::default()),
            api_directory,
        })
    }

    /// Uses an account whose key ID (account URL) is already known.
    ///
    /// Makes no requests.
    pub fn account(&self, private_key_pem: &str, key_id: &str) -> eyre::Result<Account> {
        let acme_key = AcmeKey::from_pem(private_key_pem)?;

        let mut transport = self.transport(acme_key);
        transport.set_key_id(key_id.to_owned());

        Ok(Account::new(
            transport,
            api::Account::default(),
            self.api_directory.clone(),
        ))
    }

    /// Looks up the account belonging to the private key.
    ///
    /// Fails if the CA has no usable account for this key. Accounts are never created.
    pub async fn load_existing_account(&self, private_key_pem: &str) -> eyre::Result<Account> {
        let acme_key = AcmeKey::from_pem(private_key_pem)?;
        let mut transport = self.transport(acme_key);

        let res = transport
            .call_jwk(&self.api_directory.new_account, &api::Account::lookup())
            .await?;

        let kid = req_expect_header(&res, "location")?;
        log::debug!("found account {kid}");
        let api_account = res.json::<api::Account>().await?;

        if !api_account.is_usable() {
            return Err(eyre::eyre!("account {kid} is {:?}", api_account.status));
        }

        transport.set_key_id(kid);

        Ok(Account::new(
            transport,
            api_account,
            self.api_directory.clone(),
        ))
    }

    fn transport(&self, acme_key: AcmeKey) -> Transport {
        Transport::new(
            Arc::clone(&self.nonce_pool),
            Arc::clone(&self.limiter),
            acme_key,
        )
    }

    /// Raw directory resource as served by the CA.
    pub fn api_directory(&self) -> &api::Directory {
        &self.api_directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_directory() {
        let server = crate::test::with_directory_server();

        let url = DirectoryUrl::Other(&server.dir_url);
        let dir = Directory::fetch(url).await.unwrap();

        let dir = dir.api_directory();
        assert_eq!(dir.new_order, format!("{}/acme/new-order", server.url));
        assert!(dir.supports_renewal_info());
        assert!(dir.meta.profiles.contains_key("classic"));
    }

    #[tokio::test]
    async fn load_existing_account() {
        let server = crate::test::with_directory_server();

        let url = DirectoryUrl::Other(&server.dir_url);
        let dir = Directory::fetch(url).await.unwrap();

        let acc = dir
            .load_existing_account(&server.account_key_pem)
            .await
            .unwrap();

        assert_eq!(acc.api_account().status, Some(api::AccountStatus::Valid));
    }

    #[tokio::test]
    async fn account_from_known_key_id() {
        let server = crate::test::with_directory_server();

        let url = DirectoryUrl::Other(&server.dir_url);
        let dir = Directory::fetch(url).await.unwrap();

        let acc = dir
            .account(&server.account_key_pem, &format!("{}/acme/acct/1", server.url))
            .unwrap();

        assert_eq!(acc.api_account(), &api::Account::default());
        assert!(dir.account("not a key", "kid").is_err());
    }
}
