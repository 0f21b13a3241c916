//! Throttle-aware retry for Admin GraphQL calls.
//!
//! Shopify signals cost throttling either with HTTP 429 or with a 200 whose
//! `errors` carry `THROTTLED`; both surface as [`ShopifyError::Throttled`].

use std::future::Future;
use std::time::Duration;

use crate::error::ShopifyError;

const MAX_DELAY_MS: u64 = 8_000;

/// Throttling, network failures and 5xx are retried. Other GraphQL errors,
/// 4xx and malformed payloads are returned as-is.
pub(crate) fn is_retriable(err: &ShopifyError) -> bool {
    match err {
        ShopifyError::Throttled => true,
        ShopifyError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ShopifyError::UnexpectedStatus { status, .. } => *status >= 500,
        ShopifyError::GraphQl(_)
        | ShopifyError::Deserialize { .. }
        | ShopifyError::PaginationLimit { .. } => false,
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
/// plus up to 200 ms of jitter, capped at 8 s.
pub(crate) fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let exp = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter = rand::random_range(0..200u64);
    exp.saturating_add(jitter).min(MAX_DELAY_MS)
}

/// Runs `operation` up to `max_attempts` times in total.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    base_ms: u64,
    mut operation: F,
) -> Result<T, ShopifyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ShopifyError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_attempts {
                    return Err(err);
                }
                let delay_ms = backoff_delay_ms(base_ms, attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "Shopify transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        for _ in 0..20 {
            let first = backoff_delay_ms(300, 1);
            assert!((300..500).contains(&first));
            let third = backoff_delay_ms(300, 3);
            assert!((1_200..1_400).contains(&third));
            assert_eq!(backoff_delay_ms(300, 10), MAX_DELAY_MS);
        }
    }

    #[test]
    fn graphql_errors_are_not_retriable() {
        assert!(!is_retriable(&ShopifyError::GraphQl("bad field".into())));
        assert!(is_retriable(&ShopifyError::Throttled));
        assert!(is_retriable(&ShopifyError::UnexpectedStatus {
            status: 502,
            body: String::new()
        }));
        assert!(!is_retriable(&ShopifyError::UnexpectedStatus {
            status: 401,
            body: String::new()
        }));
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(3, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ShopifyError::Throttled) }
        })
        .await;
        assert!(matches!(result, Err(ShopifyError::Throttled)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retriable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(5, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ShopifyError::GraphQl("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
