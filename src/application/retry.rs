use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::domain::error::IngestionError;

/// Fixed-delay retry for storage calls.
///
/// Transient errors are retried up to `max_retries` times, rolling back
/// before every retry. Any other error rolls back and is returned as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub async fn call<T, Op, Fut>(&self, operation: &str, op: Op) -> Result<T, IngestionError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IngestionError>>,
    {
        self.call_with_rollback(operation, op, || async { Ok(()) }).await
    }

    pub async fn call_with_rollback<T, Op, Fut, Rb, RbFut>(
        &self,
        operation: &str,
        mut op: Op,
        mut rollback: Rb,
    ) -> Result<T, IngestionError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IngestionError>>,
        Rb: FnMut() -> RbFut,
        RbFut: Future<Output = Result<(), IngestionError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("'{}' succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if let Err(rb) = rollback().await {
                        warn!("Rollback after failed '{}' also failed: {}", operation, rb);
                    }
                    if attempt > self.max_retries {
                        error!("'{}' failed after {} attempts: {}", operation, attempt, e);
                        return Err(IngestionError::RetriesExhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(
                        "'{}' hit a transient error: {}. Retrying {}/{} after {:?}",
                        operation, e, attempt, self.max_retries, self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    error!("'{}' failed: {}. Rolling back", operation, e);
                    if let Err(rb) = rollback().await {
                        warn!("Rollback after failed '{}' also failed: {}", operation, rb);
                    }
                    return Err(e);
                }
            }
        }
    }
}
