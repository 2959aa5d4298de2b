//! Analysis error types.

use thiserror::Error;

use crate::retry::{RetryClass, RetryError};

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Rate limited by analysis service: {message}")]
    RateLimited { message: String },

    #[error("Maximum retries reached after {attempts} rate-limited attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Analysis service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    pub fn service(status: u16, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is the service's rate-limit signal.
    ///
    /// This is the single classification point the retry controller relies
    /// on; everything that is not a rate limit is treated as fatal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AnalysisError::RateLimited { .. })
    }
}

impl RetryClass for AnalysisError {
    fn is_rate_limited(&self) -> bool {
        AnalysisError::is_rate_limited(self)
    }
}

impl From<RetryError<AnalysisError>> for AnalysisError {
    fn from(e: RetryError<AnalysisError>) -> Self {
        match e {
            RetryError::Exhausted { attempts, .. } => AnalysisError::RetriesExhausted { attempts },
            RetryError::Fatal(inner) => inner,
        }
    }
}
