use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CancelledSnafu, Result};

/// Bounded attempts with a fixed delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted.
    ///
    /// `op` receives the attempt number, starting at 1. The last error is
    /// returned on exhaustion. There is no delay after the last attempt.
    /// Cancellation is observed before every attempt and during the delay.
    pub async fn run<T, F, Fut>(
        &self,
        ct: &CancellationToken,
        operation: &'static str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            if ct.is_cancelled() {
                return CancelledSnafu { operation }.fail();
            }

            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.kind().is_retryable() {
                debug!(operation, attempt, %error, "operation failed, not retrying");
                return Err(error);
            }

            if attempt >= self.max_attempts {
                warn!(operation, attempt, %error, "operation failed, attempts exhausted");
                return Err(error);
            }

            warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                interval = ?self.interval,
                %error,
                "operation failed, retrying"
            );

            tokio::select! {
                _ = ct.cancelled() => {
                    return CancelledSnafu { operation }.fail();
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            attempt += 1;
        }
    }
}
