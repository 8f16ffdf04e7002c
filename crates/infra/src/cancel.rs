//! Cancellation plumbing shared by every service operation.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use warden_core::{ServiceError, ServiceResult};

/// Drive `fut` until it completes or `cancel` fires.
///
/// Cancellation wins ties: a result that becomes ready in the same poll as
/// the cancellation is discarded.
pub async fn cancellable<T, E, F>(cancel: &CancellationToken, fut: F) -> ServiceResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ServiceError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServiceError::RequestCancelled),
        res = fut => res.map_err(Into::into),
    }
}

/// A cancellation token that trips on its own after a deadline.
///
/// The timer task is aborted when the scope is dropped.
#[derive(Debug)]
pub struct CancelScope {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl CancelScope {
    pub fn start(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let trip = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "request deadline reached");
            trip.cancel();
        });
        Self { token, timer }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CancelScope {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_not_cancelled() {
        let cancel = CancellationToken::new();
        let out: ServiceResult<u32> = cancellable(&cancel, async { Ok::<_, ServiceError>(7) }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test]
    async fn already_cancelled_discards_ready_result() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out: ServiceResult<u32> = cancellable(&cancel, async { Ok::<_, ServiceError>(7) }).await;
        assert_eq!(out, Err(ServiceError::RequestCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn scope_trips_after_deadline() {
        let scope = CancelScope::start(Duration::from_millis(50));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ServiceError>(())
        };
        let out = cancellable(scope.token(), slow).await;
        assert_eq!(out, Err(ServiceError::RequestCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_scope_never_trips() {
        let token = {
            let scope = CancelScope::start(Duration::from_millis(10));
            scope.token().clone()
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!token.is_cancelled());
    }
}
