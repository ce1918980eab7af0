//! Cancellation-aware futures for long-running analysis jobs.
//!
//! A job future races against two stop conditions: its `CancellationToken`
//! and an optional wall-clock deadline. Whichever fires first decides the
//! outcome reported back to the job registry.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a raced future did not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelErr {
    /// The token was cancelled.
    Cancelled,
    /// The deadline elapsed first.
    TimedOut(Duration),
}

/// Extension trait for making futures cancellable.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Race this future against the cancellation token.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;

    /// Race this future against the token and, when `limit` is set, a deadline.
    ///
    /// Cancellation wins over the deadline when both are ready.
    async fn or_cancel_within(
        self,
        token: &CancellationToken,
        limit: Option<Duration>,
    ) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }

    async fn or_cancel_within(
        self,
        token: &CancellationToken,
        limit: Option<Duration>,
    ) -> Result<Self::Output, CancelErr> {
        let Some(limit) = limit else {
            return self.or_cancel(token).await;
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            _ = tokio::time::sleep(limit) => Err(CancelErr::TimedOut(limit)),
            res = self => Ok(res),
        }
    }
}
