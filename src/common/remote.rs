//! Bounded remote calls.

use std::future::Future;
use std::time::Duration;

use crate::common::error::{RelayError, RelayResult};

/// Run a remote call with an upper bound on its duration.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> RelayResult<T>
where
    F: Future<Output = RelayResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::Timeout {
            operation,
            seconds: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded("noop", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: RelayResult<()> = bounded("slow call", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        match result {
            Err(RelayError::Timeout { operation, seconds }) => {
                assert_eq!(operation, "slow call");
                assert_eq!(seconds, 2);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
