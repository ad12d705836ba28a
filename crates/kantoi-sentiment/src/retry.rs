//! Exponential back-off with jitter around oracle requests.
//!
//! Only transport-level failures and overloaded/5xx responses are retried.
//! A reply that arrives but cannot be parsed is never retried here; the
//! scoring pipeline counts it against the source record instead.

use std::future::Future;
use std::time::Duration;

use crate::error::SentimentError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// Retriable: timeouts, connection failures, HTTP 5xx and 429.
/// Everything else (4xx, empty or malformed replies, store errors) is final.
pub(crate) fn is_retriable(err: &SentimentError) -> bool {
    match err {
        SentimentError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
        }
        SentimentError::Oracle { status, .. } => *status == 429 || *status >= 500,
        SentimentError::EmptyReply
        | SentimentError::MalformedOracleOutput(_)
        | SentimentError::InvalidDump(_)
        | SentimentError::Store(_) => false,
    }
}

/// Delay before retry number `attempt` (1-based), before jitter.
fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    backoff_base_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(10))
        .min(MAX_DELAY_MS)
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors. Delay doubles per attempt from `backoff_base_ms`,
/// gets ±25 % jitter and is capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SentimentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SentimentError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = backoff_delay_ms(backoff_base_ms, attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "oracle transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn rate_limited_and_server_errors_are_retriable() {
        assert!(is_retriable(&SentimentError::Oracle {
            status: 429,
            message: "slow down".to_owned(),
        }));
        assert!(is_retriable(&SentimentError::Oracle {
            status: 503,
            message: "overloaded".to_owned(),
        }));
    }

    #[test]
    fn client_errors_and_bad_replies_are_final() {
        assert!(!is_retriable(&SentimentError::Oracle {
            status: 400,
            message: "bad request".to_owned(),
        }));
        assert!(!is_retriable(&SentimentError::EmptyReply));
        assert!(!is_retriable(&SentimentError::MalformedOracleOutput(
            "not json".to_owned()
        )));
    }

    #[test]
    fn delay_doubles_and_caps() {
        assert_eq!(backoff_delay_ms(1_000, 1), 1_000);
        assert_eq!(backoff_delay_ms(1_000, 2), 2_000);
        assert_eq!(backoff_delay_ms(1_000, 3), 4_000);
        assert_eq!(backoff_delay_ms(1_000, 30), MAX_DELAY_MS);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(SentimentError::Oracle {
                        status: 500,
                        message: "boom".to_owned(),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SentimentError::Oracle {
                    status: 502,
                    message: "bad gateway".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(SentimentError::Oracle { status: 502, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "one try plus two retries");
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SentimentError::Oracle {
                    status: 401,
                    message: "bad key".to_owned(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
