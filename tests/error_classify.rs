use termsift::error::{AiError, ErrorKind};

#[test]
fn status_429_is_rate_limited() {
    let err = AiError::classify(Some(429), "HTTP 429: too many requests");
    assert_eq!(err.kind(), ErrorKind::RateLimited);
}

#[test]
fn rate_limit_wording_is_rate_limited() {
    let err = AiError::classify(None, "Rate limit reached for gpt-4o-mini");
    assert_eq!(err.kind(), ErrorKind::RateLimited);
}

#[test]
fn status_401_is_auth() {
    let err = AiError::classify(Some(401), "HTTP 401: unauthorized");
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[test]
fn authentication_wording_is_auth() {
    let err = AiError::classify(None, "Authentication failed for key");
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[test]
fn timeout_and_network_wording_are_network() {
    assert_eq!(
        AiError::classify(None, "request timed out").kind(),
        ErrorKind::Network
    );
    assert_eq!(
        AiError::classify(None, "network unreachable").kind(),
        ErrorKind::Network
    );
}

#[test]
fn anything_else_is_unexpected_and_not_retryable() {
    let err = AiError::classify(Some(500), "HTTP 500: internal server error");
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert!(!err.kind().is_retryable());
}

#[test]
fn transient_kinds_are_retryable() {
    assert!(ErrorKind::RateLimited.is_retryable());
    assert!(ErrorKind::Auth.is_retryable());
    assert!(ErrorKind::Network.is_retryable());
    assert!(!ErrorKind::FileSystem.is_retryable());
}
