use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    acc::AcmeKey,
    jws::{self, Protected},
    limit::RequestLimiter,
    req::{req_expect_header, req_handle_error, req_head, req_post},
};

/// Attempts made for one call while the API keeps rejecting our nonce or signature.
const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy)]
enum KeyRef {
    Jwk,
    Kid,
}

/// Signs and sends requests on behalf of one account key.
///
/// The account lookup is made with [`call_jwk`](Self::call_jwk); its `Location` header becomes the
/// key ID through [`set_key_id`](Self::set_key_id) and every later request goes through
/// [`call_kid`](Self::call_kid). Signed requests and nonce fetches pass the shared
/// [`RequestLimiter`].
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    acme_key: AcmeKey,
    nonce_pool: Arc<NoncePool>,
    limiter: Arc<RequestLimiter>,
}

impl Transport {
    pub fn new(nonce_pool: Arc<NoncePool>, limiter: Arc<RequestLimiter>, acme_key: AcmeKey) -> Self {
        Transport {
            acme_key,
            nonce_pool,
            limiter,
        }
    }

    /// Sets the account URL used as `kid`.
    pub fn set_key_id(&mut self, kid: String) {
        self.acme_key.set_key_id(kid);
    }

    pub fn acme_key(&self) -> &AcmeKey {
        &self.acme_key
    }

    /// The request limiter shared by every clone of this transport.
    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    /// Makes a call identifying the account by its public key.
    ///
    /// Only needed to look up the account URL.
    pub async fn call_jwk<T>(&self, url: &str, body: &T) -> eyre::Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, body, KeyRef::Jwk).await
    }

    /// Makes a call identifying the account by its URL (`kid`).
    pub async fn call_kid<T>(&self, url: &str, body: &T) -> eyre::Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, body, KeyRef::Kid).await
    }

    async fn do_call<T>(
        &self,
        url: &str,
        body: &T,
        key_ref: KeyRef,
    ) -> eyre::Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let nonce = self.nonce_pool.get_nonce(&self.limiter).await?;

            let protected = match key_ref {
                KeyRef::Jwk => Protected::with_jwk(&self.acme_key, url, &nonce)?,
                KeyRef::Kid => Protected::with_kid(&self.acme_key, url, &nonce)?,
            };
            let body = jws::sign(&protected, &self.acme_key, body)?;

            self.limiter.acquire().await;

            log::debug!("POST {url} (attempt {attempt})");

            let response = req_post(url, body).await?;

            // error responses carry fresh nonces too
            self.nonce_pool.extract_nonce(&response);

            match req_handle_error(response).await {
                Err(problem)
                    if attempt < MAX_ATTEMPTS
                        && (problem.is_bad_nonce() || problem.is_jws_verification_error()) =>
                {
                    log::debug!("retrying {url}: {problem}");
                }
                result => return Ok(result?),
            }
        }
    }
}

/// Nonces collected from responses, handed out oldest first.
#[derive(Default, Debug)]
pub(crate) struct NoncePool {
    nonce_url: String,
    pool: Mutex<VecDeque<String>>,
}

impl NoncePool {
    pub fn new(nonce_url: &str) -> Self {
        NoncePool {
            nonce_url: nonce_url.to_owned(),
            ..Default::default()
        }
    }

    fn extract_nonce(&self, res: &reqwest::Response) {
        let Some(nonce) = res.headers().get("replay-nonce") else {
            return;
        };

        // see https://datatracker.ietf.org/doc/html/rfc8555#section-6.5.1
        let Some(nonce) = nonce.to_str().ok().filter(|nonce| is_valid_nonce(nonce)) else {
            log::debug!("Ignoring malformed replay-nonce");
            return;
        };

        let mut pool = self.pool.lock();
        pool.push_back(nonce.to_owned());

        if pool.len() > 10 {
            pool.pop_front();
        }
    }

    async fn get_nonce(&self, limiter: &RequestLimiter) -> eyre::Result<String> {
        if let Some(nonce) = self.pool.lock().pop_front() {
            log::trace!("reusing pooled nonce");
            return Ok(nonce);
        }

        limiter.acquire().await;

        log::debug!("pool empty, fetching nonce");
        let res = req_handle_error(req_head(&self.nonce_url).await?).await?;

        Ok(req_expect_header(&res, "replay-nonce")?)
    }
}

fn is_valid_nonce(nonce: &str) -> bool {
    !nonce.is_empty()
        && nonce
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_validation() {
        assert!(is_valid_nonce("8_uBBV3N2DBRJczhoiB46ugJKUkUHxGzVe6xIMpjHFM"));
        assert!(!is_valid_nonce(""));
        assert!(!is_valid_nonce("abc=="));
        assert!(!is_valid_nonce("a b"));
    }
}
