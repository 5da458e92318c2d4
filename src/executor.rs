//! Retry policy drawing a fresh proxy per attempt, ending with a direct attempt.

use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use log::{info, warn};

use crate::error::ExecuteError;
use crate::pool::{ProxyPool, ProxySupplier};
use crate::proxy::ProxyEndpoint;

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure(String),
}

/// Record of one attempt at the wrapped work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkAttempt {
    /// 1-based attempt number.
    pub number: usize,
    /// Proxy used, `None` for a direct connection.
    pub proxy: Option<ProxyEndpoint>,
    pub outcome: AttemptOutcome,
}

/// Runs a unit of work through proxies from a [`ProxySupplier`].
///
/// Up to `max_retries` attempts each draw a fresh proxy; if all of them fail,
/// one final attempt is made without any proxy.
pub struct RetryingExecutor {
    supplier: Arc<dyn ProxySupplier>,
    max_retries: usize,
    limiter: DefaultKeyedRateLimiter<ProxyEndpoint>,
}

impl RetryingExecutor {
    /// Create an executor; `max_rps` paces requests sent through any single proxy.
    pub fn new(supplier: Arc<dyn ProxySupplier>, max_retries: usize, max_rps: f64) -> Self {
        let per_second = NonZeroU32::new(max_rps.ceil() as u32).unwrap_or(NonZeroU32::MIN);
        Self {
            supplier,
            max_retries,
            limiter: RateLimiter::keyed(Quota::per_second(per_second)),
        }
    }

    /// Create an executor using the pool's retry and rate settings.
    pub fn from_pool(pool: Arc<ProxyPool>) -> Self {
        let max_retries = pool.config.retry_count;
        let max_rps = pool.config.max_requests_per_second;
        Self::new(pool, max_retries, max_rps)
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Run `work` until it succeeds or every attempt has failed.
    ///
    /// `work` receives the proxy to use, or `None` for a direct connection.
    /// On terminal failure the error carries the last error text and the
    /// full attempt history.
    pub async fn execute<T, E, F, Fut>(&self, work: F) -> Result<T, ExecuteError>
    where
        F: FnMut(Option<ProxyEndpoint>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let result = self.attempt_all(work).await;
        // pool entries rotate on every refresh, drop rate state nobody is limited by
        self.limiter.retain_recent();
        result
    }

    /// Number of proxies currently holding rate-limit state.
    pub fn tracked_proxies(&self) -> usize {
        self.limiter.len()
    }

    async fn attempt_all<T, E, F, Fut>(&self, mut work: F) -> Result<T, ExecuteError>
    where
        F: FnMut(Option<ProxyEndpoint>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut history = Vec::with_capacity(self.max_retries + 1);

        for number in 1..=self.max_retries + 1 {
            let direct = number > self.max_retries;
            let proxy = if direct {
                info!("All proxy attempts failed, trying direct connection");
                None
            } else {
                self.supplier.get_proxy().await
            };

            if let Some(endpoint) = &proxy {
                self.limiter.until_key_ready(endpoint).await;
                info!("Using proxy: {} (attempt {})", endpoint, number);
            }

            match work(proxy.clone()).await {
                Ok(value) => {
                    if number > 1 {
                        info!("Attempt {} succeeded after {} failures", number, history.len());
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let detail = e.to_string();
                    warn!(
                        "Attempt {} failed with proxy {}: {}",
                        number,
                        proxy.as_ref().map_or("none", ProxyEndpoint::as_str),
                        detail
                    );
                    history.push(WorkAttempt {
                        number,
                        proxy,
                        outcome: AttemptOutcome::Failure(detail),
                    });
                }
            }
        }

        let last_error = match history.last() {
            Some(WorkAttempt {
                outcome: AttemptOutcome::Failure(detail),
                ..
            }) => detail.clone(),
            _ => String::from("no attempt was made"),
        };
        Err(ExecuteError::Exhausted {
            attempts: history.len(),
            last_error,
            history,
        })
    }
}
