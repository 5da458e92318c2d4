//! Error types for the proxy-pool-manager crate.

use std::time::Duration;

use thiserror::Error;

use crate::executor::WorkAttempt;

/// Error returned when a string cannot be turned into a [`ProxyEndpoint`](crate::ProxyEndpoint).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid proxy endpoint {input:?}: {reason}")]
pub struct InvalidEndpoint {
    pub input: String,
    pub reason: String,
}

impl InvalidEndpoint {
    pub(crate) fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single proxy-list source could not deliver candidates.
///
/// These never leave the fetcher: the source simply contributes nothing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed payload from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("source {name} did not answer within {deadline:?}")]
    Timeout { name: String, deadline: Duration },
}

/// Terminal failure of [`RetryingExecutor::execute`](crate::RetryingExecutor::execute).
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Every proxied attempt and the direct fallback failed.
    #[error("all {attempts} attempts failed, last error: {last_error}")]
    Exhausted {
        attempts: usize,
        last_error: String,
        history: Vec<WorkAttempt>,
    },
}

impl ExecuteError {
    /// The error text of the final attempt.
    pub fn last_error(&self) -> &str {
        match self {
            ExecuteError::Exhausted { last_error, .. } => last_error,
        }
    }

    /// Number of attempts performed, the direct one included.
    pub fn attempts(&self) -> usize {
        match self {
            ExecuteError::Exhausted { attempts, .. } => *attempts,
        }
    }
}
