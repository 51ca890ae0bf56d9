use crate::{api, client::AcmeClient, error::Error, wait::Sample};

/// Where an order stands as far as waiting for it is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Done,
    Failed,
    Waiting,
}

pub(crate) fn progress(status: Option<api::OrderStatus>) -> Progress {
    match status {
        Some(api::OrderStatus::Valid) => Progress::Done,
        Some(api::OrderStatus::Invalid) => Progress::Failed,
        Some(api::OrderStatus::Pending | api::OrderStatus::Ready | api::OrderStatus::Processing)
        | None => Progress::Waiting,
    }
}

/// Fetches the order once.
///
/// A failed fetch is retried by the caller and reported should the wait time out.
pub(crate) async fn sample<C: AcmeClient>(
    client: &C,
    location: &str,
) -> eyre::Result<Sample<api::Order>> {
    let order = match client.get_order(location).await {
        Ok(order) => order,
        Err(err) => {
            log::warn!("acme: Error while polling order {location}: {err:#}");
            return Ok(Sample::Retry(err));
        }
    };

    match progress(order.status) {
        Progress::Done => Ok(Sample::Ready(order)),
        Progress::Failed => Err(Error::InvalidOrder {
            problem: order.error,
        }
        .into()),
        Progress::Waiting => Ok(Sample::NotYet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OrderStatus;

    #[test]
    fn status_mapping() {
        assert_eq!(progress(Some(OrderStatus::Valid)), Progress::Done);
        assert_eq!(progress(Some(OrderStatus::Invalid)), Progress::Failed);
        assert_eq!(progress(Some(OrderStatus::Pending)), Progress::Waiting);
        assert_eq!(progress(Some(OrderStatus::Ready)), Progress::Waiting);
        assert_eq!(progress(Some(OrderStatus::Processing)), Progress::Waiting);
        assert_eq!(progress(None), Progress::Waiting);
    }
}
