//! Bounded fixed-delay retry for transient upstream failures.
//!
//! Only [`SourceError::TransientNetwork`] is retried. Every call to [`retry`] starts
//! with a fresh attempt counter, so a success resets the budget for the next page.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use storefront_indexer_shared::{Document, ImportCursor};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{DocumentSource, Result, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or the
/// policy is exhausted. Both the attempt and the delay race against `cancel`.
pub async fn retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SourceError::Cancelled),
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(value) => {
                if attempts > 1 {
                    info!(
                        operation = operation_name,
                        attempts, "Operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if attempts >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(SourceError::Infrastructure {
                        attempts,
                        message: err.to_string(),
                    });
                }

                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    max_attempts,
                    error = %err,
                    delay_ms = policy.delay.as_millis() as u64,
                    "Transient failure, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(SourceError::Cancelled),
                    _ = sleep(policy.delay) => {}
                }
            }
        }
    }
}

/// Wraps any source so that each page fetch gets the retry policy.
pub struct RetryingSource<S> {
    inner: S,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<S: DocumentSource> RetryingSource<S> {
    pub fn new(inner: S, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            inner,
            policy,
            cancel,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: DocumentSource> DocumentSource for RetryingSource<S> {
    async fn get_documents(&self, cursor: &ImportCursor) -> Result<Vec<Document>> {
        let operation = format!("{} {} page {}", self.inner.name(), cursor.entity_type, cursor.page);
        retry(&operation, &self.policy, &self.cancel, || {
            self.inner.get_documents(cursor)
        })
        .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockDocumentSource;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_try() {
        let result = retry("test_op", &fast(), &CancellationToken::new(), || async {
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = retry("test_op", &fast(), &CancellationToken::new(), || {
            let counter = counter.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if count < 3 {
                    Err(SourceError::TransientNetwork(format!("timeout {}", count)))
                } else {
                    Ok(count)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_is_infrastructure() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = retry("test_op", &fast(), &CancellationToken::new(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::TransientNetwork("dns error".into()))
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(SourceError::Infrastructure { attempts: 3, .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_status_error_is_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = retry("test_op", &fast(), &CancellationToken::new(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::Status {
                    code: 500,
                    message: "boom".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(SourceError::Status { code: 500, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let trigger = cancel.clone();

        let handle = tokio::spawn(async move {
            retry("test_op", &policy, &cancel, || async {
                Err::<(), _>(SourceError::TransientNetwork("connect".into()))
            })
            .await
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();

        assert!(matches!(handle.await.unwrap(), Err(SourceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_attempt_counter_is_fresh_per_call() {
        let mock = MockDocumentSource::new();
        mock.register_page("category", 0, vec![json!({ "id": 1 }).as_object().unwrap().clone()]);
        // Two failures before each page: within budget each time.
        mock.fail_next(SourceError::TransientNetwork("timeout".into()));
        mock.fail_next(SourceError::TransientNetwork("timeout".into()));

        let source = RetryingSource::new(mock, fast(), CancellationToken::new());
        let cursor = ImportCursor::new("category", 0, 25);
        assert_eq!(source.get_documents(&cursor).await.unwrap().len(), 1);

        source
            .inner()
            .fail_next(SourceError::TransientNetwork("timeout".into()));
        source
            .inner()
            .fail_next(SourceError::TransientNetwork("timeout".into()));
        assert_eq!(source.get_documents(&cursor).await.unwrap().len(), 1);
        assert_eq!(source.inner().call_count(), 6);
    }
}
