//! Service configuration and bounded storage calls.

use std::future::Future;
use std::time::Duration;

use crate::error::MarketError;

/// Settings shared by the cart, purchase and sales services.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Upper bound for a single storage call, and for the whole
    /// transactional section of a purchase.
    pub store_timeout: Duration,
}

impl ServiceConfig {
    pub fn with_store_timeout(store_timeout: Duration) -> Self {
        Self { store_timeout }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs a storage future, failing with [`MarketError::Timeout`] if it does not
/// finish in time.
///
/// The inner future is dropped on timeout, which rolls back any transaction it
/// owns.
pub(crate) async fn bounded<T, E, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, MarketError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<MarketError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            tracing::error!(operation, ?timeout, "storage call timed out");
            Err(MarketError::Timeout { operation })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::StoreError;

    #[test]
    fn default_timeout_is_five_seconds() {
        assert_eq!(ServiceConfig::default().store_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn passes_through_results() {
        let ok = bounded(Duration::from_secs(1), "op", async {
            Ok::<_, StoreError>(7)
        })
        .await
        .unwrap();
        assert_eq!(ok, 7);

        let err = bounded(Duration::from_secs(1), "op", async {
            Err::<(), _>(StoreError::Unavailable("down".to_string()))
        })
        .await;
        assert!(matches!(err, Err(MarketError::Store(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let result = bounded(Duration::from_millis(10), "slow_op", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, StoreError>(())
        })
        .await;

        assert!(matches!(
            result,
            Err(MarketError::Timeout {
                operation: "slow_op"
            })
        ));
    }
}
