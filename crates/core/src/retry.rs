//! Error type for the translation seam and the backoff policy around it.

use std::time::Duration;
use thiserror::Error;

/// Longest wait between two attempts, in seconds.
pub const MAX_BACKOFF_SECS: u64 = 60;

/// Errors a [`crate::translate::Translator`] may return.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("server error {status}")]
    Server { status: u16 },

    #[error("authentication failed, check the API key")]
    Auth,

    #[error("API responded with {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("translator panicked")]
    Panicked,
}

impl TranslateError {
    /// Rate limits, timeouts, dropped connections and 5xx are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslateError::RateLimited(_)
                | TranslateError::Timeout
                | TranslateError::Connection(_)
                | TranslateError::Server { .. }
        )
    }
}

impl From<reqwest::Error> for TranslateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranslateError::Timeout
        } else if err.is_connect() || err.is_request() {
            TranslateError::Connection(err.to_string())
        } else if err.is_decode() {
            TranslateError::Malformed(err.to_string())
        } else {
            match err.status() {
                Some(status) => TranslateError::Api {
                    status: status.as_u16(),
                    message: err.to_string(),
                },
                None => TranslateError::Connection(err.to_string()),
            }
        }
    }
}

/// Exponential backoff: 1, 2, 4, 8 ... capped at [`MAX_BACKOFF_SECS`] seconds.
pub fn retry_delay(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt)
        .filter(|s| *s <= MAX_BACKOFF_SECS)
        .unwrap_or(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_then_cap() {
        let delays: Vec<u64> = (0..4).map(|a| retry_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8]);
        assert_eq!(retry_delay(6).as_secs(), 60);
        assert_eq!(retry_delay(200).as_secs(), 60);
    }

    #[test]
    fn classifies_transient_errors() {
        assert!(TranslateError::RateLimited("429".into()).is_retryable());
        assert!(TranslateError::Timeout.is_retryable());
        assert!(TranslateError::Server { status: 503 }.is_retryable());
        assert!(!TranslateError::Auth.is_retryable());
        assert!(!TranslateError::Malformed("no content".into()).is_retryable());
        assert!(!TranslateError::Panicked.is_retryable());
        assert!(!TranslateError::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
    }
}
