//! Deadlines for profile operations so a slow database can't pin a task.

use std::{future::Future, time::Duration};
use tokio::time::timeout;

use super::errors::{ProfileError, ProfileResult};

/// Default deadline for a single profile query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `future`, turning an elapsed deadline into [`ProfileError::Timeout`].
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> ProfileResult<T>
where
    F: Future<Output = ProfileResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProfileError::Timeout(duration)),
    }
}

pub async fn with_default_timeout<F, T>(future: F) -> ProfileResult<T>
where
    F: Future<Output = ProfileResult<T>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_results() {
        let ok = with_default_timeout(async { Ok::<_, ProfileError>(7) }).await;
        assert_eq!(ok.ok(), Some(7));
    }

    #[tokio::test]
    async fn slow_future_times_out() {
        let result = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, ProfileError>(())
        })
        .await;
        assert!(matches!(result, Err(ProfileError::Timeout(d)) if d == Duration::from_millis(50)));
    }
}
