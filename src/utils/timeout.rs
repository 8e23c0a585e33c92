//! Optional-deadline wrappers for async operations.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Await `operation`, bounded by `limit` when one is set.
///
/// `None` means no deadline at all: the operation may block its task
/// until the peer acts or the connection is forced closed.
pub async fn with_timeout<T, F>(operation: F, limit: Option<Duration>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => operation.await,
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| ProtocolError::Timeout)?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_limit_passes_through() {
        let value = with_timeout(async { Ok(7) }, None).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn elapsed_becomes_timeout_error() {
        let result: Result<()> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            Some(Duration::from_millis(10)),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }

    #[tokio::test]
    async fn inner_error_wins_over_deadline() {
        let result: Result<()> = with_timeout(
            async { Err(ProtocolError::ConnectionClosed) },
            Some(Duration::from_secs(5)),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }
}
