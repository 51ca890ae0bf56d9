use std::{fmt, num::NonZeroU32, sync::Arc};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::RwLock;

/// Default ceiling of requests per second towards the ACME API.
pub const DEFAULT_OVERALL_REQUEST_LIMIT: usize = 18;

/// Shared ceiling on the number of requests per second towards the ACME API.
///
/// A token bucket refilled at `limit` cells per second, allowing bursts of `limit`. Changing the
/// ceiling replaces the bucket; requests already waiting finish against the old one.
#[derive(Debug)]
pub(crate) struct RequestLimiter {
    inner: RwLock<Bucket>,
}

struct Bucket {
    limit: usize,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket").field("limit", &self.limit).finish_non_exhaustive()
    }
}

impl Bucket {
    fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let per_second = u32::try_from(limit)
            .ok()
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MAX);

        Self {
            limit,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }
}

impl RequestLimiter {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            inner: RwLock::new(Bucket::new(limit)),
        }
    }

    pub(crate) fn set_limit(&self, limit: usize) {
        let mut inner = self.inner.write();

        if inner.limit != limit.max(1) {
            *inner = Bucket::new(limit);
        }
    }

    pub(crate) fn limit(&self) -> usize {
        self.inner.read().limit
    }

    /// Waits until the bucket has a cell for one more request.
    pub(crate) async fn acquire(&self) {
        let limiter = Arc::clone(&self.inner.read().limiter);

        if limiter.check().is_err() {
            log::trace!("request limit reached, waiting");
            limiter.until_ready().await;
        }
    }
}

impl Default for RequestLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_OVERALL_REQUEST_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[tokio::test]
    async fn bucket_throttles_bursts() {
        let limiter = RequestLimiter::new(4);
        let start = Instant::now();

        for _ in 0..4 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));

        // one cell every 250ms once the burst is spent
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn raising_the_limit_takes_effect() {
        let limiter = RequestLimiter::new(1);
        limiter.acquire().await;

        limiter.set_limit(50);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn limit_is_at_least_one() {
        let limiter = RequestLimiter::default();
        assert_eq!(limiter.limit(), DEFAULT_OVERALL_REQUEST_LIMIT);

        limiter.set_limit(0);
        assert_eq!(limiter.limit(), 1);
    }
}
