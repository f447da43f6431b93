//! Failure taxonomy for the completion endpoint and the result stores.
//!
//! Rate-limit, auth and network failures are transient and worth waiting out;
//! everything else either gets absorbed into sentinel records (unexpected
//! provider failures) or aborts the stage (file-system failures, because a
//! lost partial-result write breaks resumability).

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Auth,
    Network,
    Unexpected,
    FileSystem,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Auth | ErrorKind::Network
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::RateLimited => "rate_limit",
            ErrorKind::Auth => "auth",
            ErrorKind::Network => "network",
            ErrorKind::Unexpected => "parsing",
            ErrorKind::FileSystem => "file_system",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected completion failure: {0}")]
    Unexpected(String),
    #[error("file system error: {0}")]
    FileSystem(String),
}

impl AiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AiError::RateLimited(_) => ErrorKind::RateLimited,
            AiError::Auth(_) => ErrorKind::Auth,
            AiError::Network(_) => ErrorKind::Network,
            AiError::Unexpected(_) => ErrorKind::Unexpected,
            AiError::FileSystem(_) => ErrorKind::FileSystem,
        }
    }

    /// Classify a provider failure by its status code and message text.
    ///
    /// The provider does not expose a structured error taxonomy, so this
    /// inspects the signals the original endpoint is known to emit: HTTP 429
    /// or "rate limit" wording, HTTP 401 or "authentication" wording, and
    /// timeout/connectivity wording. Anything unrecognized is `Unexpected`
    /// and is never retried.
    pub fn classify(status: Option<u16>, message: &str) -> AiError {
        let lower = message.to_ascii_lowercase();
        if status == Some(429) || lower.contains("rate limit") {
            AiError::RateLimited(message.to_string())
        } else if status == Some(401) || lower.contains("authentication") {
            AiError::Auth(message.to_string())
        } else if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("network")
        {
            AiError::Network(message.to_string())
        } else {
            AiError::Unexpected(message.to_string())
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return AiError::Network(err.to_string());
        }
        AiError::classify(err.status().map(|s| s.as_u16()), &err.to_string())
    }
}
