use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::Instant;

use crate::error::Error;

/// Outcome of one sample taken by [`wait_for`].
#[derive(Debug)]
pub(crate) enum Sample<T> {
    Ready(T),
    NotYet,
    /// Sampling failed but may succeed later; kept as the cause should time run out.
    Retry(eyre::Report),
}

/// Repeatedly samples `f` until it yields a value or `timeout` runs out.
///
/// [`Sample::NotYet`] and [`Sample::Retry`] are retried after `interval`. Errors end the wait
/// immediately. Running out of time yields [`Error::Timeout`] carrying the last retried error.
pub(crate) async fn wait_for<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut f: F,
) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = eyre::Result<Sample<T>>>,
{
    log::info!("Wait for {what} [timeout: {timeout:?}, interval: {interval:?}]");

    let deadline = Instant::now() + timeout;
    let mut last_error = None;

    loop {
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                what: what.to_owned(),
                timeout,
                last_error,
            }
            .into());
        }

        match f().await? {
            Sample::Ready(val) => return Ok(val),
            Sample::NotYet => {}
            Sample::Retry(err) => last_error = Some(Arc::new(err)),
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn yields_first_value() {
        let mut samples = [None, None, Some(3)].into_iter();

        let val = wait_for("value", Duration::from_secs(1), Duration::from_millis(10), || {
            let sample = match samples.next().flatten() {
                Some(val) => Sample::Ready(val),
                None => Sample::NotYet,
            };
            async move { Ok(sample) }
        })
        .await
        .unwrap();

        assert_eq!(val, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_end_the_wait() {
        let mut calls = 0;

        let err = wait_for::<(), _, _>("value", Duration::from_secs(1), Duration::from_millis(10), || {
            calls += 1;
            async { Err(eyre::eyre!("boom")) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let err = wait_for::<(), _, _>("value", Duration::from_secs(1), Duration::from_millis(100), || async {
            Ok(Sample::NotYet)
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Timeout { last_error: None, .. })
        ));
        assert_eq!(err.to_string(), "time limit exceeded waiting for value (1s)");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_last_retried_error() {
        let mut calls = 0;

        let err = wait_for::<(), _, _>("value", Duration::from_secs(1), Duration::from_millis(100), || {
            calls += 1;
            let err = eyre::eyre!("attempt {calls} failed");
            async move { Ok(Sample::Retry(err)) }
        })
        .await
        .unwrap_err();

        assert!(calls > 1);
        assert_eq!(
            err.to_string(),
            format!("time limit exceeded waiting for value (1s): last error: attempt {calls} failed")
        );
    }
}
