//! Utility functions for the storefront indexer repository.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::errors::SearchIndexError;
use crate::types::Acknowledgment;

/// Race an engine call against `cancel`.
///
/// # Arguments
///
/// * `cancel` - Token shared by every service of one run
/// * `operation` - The engine call to await
///
/// # Returns
///
/// * The operation's own result if it settles first
/// * `Err(SearchIndexError::Cancelled)` if the token fires first
pub async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, SearchIndexError>
where
    F: Future<Output = Result<T, SearchIndexError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SearchIndexError::Cancelled),
        result = operation => result,
    }
}

/// Turn `acknowledged: false` into an `AcknowledgmentError`.
pub fn ensure_acknowledged(
    ack: Acknowledgment,
    operation: &str,
    target: &str,
) -> Result<(), SearchIndexError> {
    if ack.acknowledged {
        Ok(())
    } else {
        Err(SearchIndexError::not_acknowledged(operation, target))
    }
}
