use std::future::Future;

use crate::OrderAuthorization;

/// Solves the challenges of an order.
///
/// Called once per order with every authorization, already valid ones included. Must return once
/// all of them are valid, or with the first failure. The certifier does not retry.
pub trait Resolver: Send + Sync {
    fn solve(
        &self,
        authorizations: &[OrderAuthorization],
    ) -> impl Future<Output = eyre::Result<()>> + Send;
}
