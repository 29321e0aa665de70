//! Cancellation and deadline enforcement for a single run.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::EngineError;

/// Bounds every generator call and retry wait of one run.
///
/// Cancellation wins over an expired deadline, which wins over the
/// guarded future completing in the same poll.
#[derive(Debug, Clone)]
pub struct RunGuard {
    cancel: CancellationToken,
    run_deadline: Option<Instant>,
    call_timeout: Option<Duration>,
}

impl RunGuard {
    /// Start the run clock now.
    pub fn new(
        cancel: CancellationToken,
        run_timeout: Option<Duration>,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            cancel,
            run_deadline: run_timeout.map(|t| Instant::now() + t),
            call_timeout,
        }
    }

    /// Guard with no deadlines that only observes `cancel`.
    pub fn unbounded(cancel: CancellationToken) -> Self {
        Self::new(cancel, None, None)
    }

    /// Fail fast if the run is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if self.run_deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(EngineError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run one generator call under the run deadline and the per-call timeout.
    pub async fn call<F: Future>(&self, fut: F) -> Result<F::Output, EngineError> {
        let call_deadline = self.call_timeout.map(|t| Instant::now() + t);
        let deadline = match (self.run_deadline, call_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.race(fut, deadline).await
    }

    /// Sleep for `delay`, waking early on cancellation or run deadline.
    pub async fn sleep(&self, delay: Duration) -> Result<(), EngineError> {
        self.race(tokio::time::sleep(delay), self.run_deadline).await
    }

    async fn race<F: Future>(
        &self,
        fut: F,
        deadline: Option<Instant>,
    ) -> Result<F::Output, EngineError> {
        self.check()?;

        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            _ = expiry => Err(EngineError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}
