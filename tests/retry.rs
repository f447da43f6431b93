use std::cell::Cell;
use std::time::Duration;
use termsift::error::AiError;
use termsift::retry::RetryPolicy;
use termsift::stats::StageStats;

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
    }
}

#[test]
fn delay_doubles_per_attempt_and_is_capped() {
    let policy = fast_policy(5);
    assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(10));
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(20));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(40));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(40));
    assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(40));
}

#[tokio::test]
async fn rate_limit_is_retried_until_exhaustion() {
    let policy = fast_policy(2);
    let mut stats = StageStats::new();
    let attempts = Cell::new(0u32);

    let result: Result<(), AiError> = policy
        .run(&mut stats, || {
            attempts.set(attempts.get() + 1);
            async { Err(AiError::RateLimited("rate limit exceeded".into())) }
        })
        .await;

    assert!(matches!(result, Err(AiError::RateLimited(_))));
    assert_eq!(attempts.get(), 3);
    assert_eq!(stats.errors.rate_limit, 3);
    // Two waits happened: 10ms then 20ms.
    assert!((stats.total_wait_time - 0.03).abs() < 1e-9);
}

#[tokio::test]
async fn transient_failure_then_success() {
    let policy = fast_policy(5);
    let mut stats = StageStats::new();
    let attempts = Cell::new(0u32);

    let result = policy
        .run(&mut stats, || {
            attempts.set(attempts.get() + 1);
            let n = attempts.get();
            async move {
                if n < 3 {
                    Err(AiError::Network("connection timed out".into()))
                } else {
                    Ok("done".to_string())
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(attempts.get(), 3);
    assert_eq!(stats.errors.network, 2);
}

#[tokio::test]
async fn unexpected_failure_is_not_retried() {
    let policy = fast_policy(5);
    let mut stats = StageStats::new();
    let attempts = Cell::new(0u32);

    let result: Result<(), AiError> = policy
        .run(&mut stats, || {
            attempts.set(attempts.get() + 1);
            async { Err(AiError::Unexpected("malformed response".into())) }
        })
        .await;

    assert!(matches!(result, Err(AiError::Unexpected(_))));
    assert_eq!(attempts.get(), 1);
    assert_eq!(stats.errors.parsing, 1);
    assert_eq!(stats.total_wait_time, 0.0);
}

#[tokio::test]
async fn zero_retries_means_exactly_one_attempt() {
    let policy = fast_policy(0);
    let mut stats = StageStats::new();
    let attempts = Cell::new(0u32);

    let result: Result<(), AiError> = policy
        .run(&mut stats, || {
            attempts.set(attempts.get() + 1);
            async { Err(AiError::RateLimited("rate limit exceeded".into())) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.get(), 1);
    assert_eq!(stats.total_wait_time, 0.0);
}
