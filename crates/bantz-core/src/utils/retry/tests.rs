use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[test]
fn test_default_schedule_is_one_two_four() {
    let config = RetryConfig::default();
    assert_eq!(config.max_attempts, 4);
    assert_eq!(config.delay_for(1), Duration::from_secs(1));
    assert_eq!(config.delay_for(2), Duration::from_secs(2));
    assert_eq!(config.delay_for(3), Duration::from_secs(4));
    assert_eq!(config.delay_for(9), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_retries_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let result: Result<&str, RetryError<String>> = retry_with_backoff(
        &RetryConfig::default(),
        || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("token refresh failed".to_string())
                } else {
                    Ok("fresh")
                }
            }
        },
        |_| true,
    )
    .await;

    assert_eq!(result.unwrap(), "fresh");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let err = retry_with_backoff(
        &RetryConfig::default(),
        || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("down".to_string())
            }
        },
        |_| true,
    )
    .await
    .unwrap_err();

    assert_eq!(err.attempts, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(err.to_string().contains("4 attempts"));
}

#[tokio::test]
async fn test_non_retryable_returns_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let err = retry_with_backoff(
        &RetryConfig::default(),
        || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("invalid input".to_string())
            }
        },
        |_| false,
    )
    .await
    .unwrap_err();

    assert_eq!(err.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
