//! Middleware implementation for reqwest.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use reqwest_middleware::{Error, Middleware, Next, Result};

use crate::config::ProxyPoolConfig;
use crate::executor::RetryingExecutor;
use crate::pool::ProxyPool;
use crate::proxy::ProxyEndpoint;

/// Middleware sending each request through pooled proxies, retrying with a
/// fresh proxy on failure and finally connecting directly.
///
/// Every attempt is sent on its own client, so the request never reaches the
/// rest of the chain. Register this middleware last; settings of the wrapped
/// client other than the request itself are not applied.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    pool: Arc<ProxyPool>,
    executor: Arc<RetryingExecutor>,
    request_timeout: Duration,
}

impl ProxyPoolMiddleware {
    /// Create a new proxy pool middleware with the given configuration.
    ///
    /// The pool is filled lazily on the first request.
    pub fn new(config: ProxyPoolConfig) -> std::result::Result<Self, reqwest::Error> {
        Ok(Self::from_pool(ProxyPool::new(config)?))
    }

    /// Wrap an existing pool, so it can be shared with other consumers.
    pub fn from_pool(pool: Arc<ProxyPool>) -> Self {
        let request_timeout = pool.config.request_timeout;
        let executor = Arc::new(RetryingExecutor::from_pool(Arc::clone(&pool)));
        Self {
            pool,
            executor,
            request_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }
}

/// Build the client for one attempt. Certificates are always verified here.
fn client_for(
    proxy: Option<&ProxyEndpoint>,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    let builder = Client::builder().timeout(timeout);
    let builder = match proxy {
        Some(endpoint) => builder.proxy(endpoint.to_reqwest_proxy()?),
        None => builder.no_proxy(),
    };
    builder.build()
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        if req.try_clone().is_none() {
            return Err(Error::Middleware(anyhow!(
                "Request object is not cloneable. Are you passing a streaming body?"
            )));
        }

        let timeout = self.request_timeout;
        let outcome = self
            .executor
            .execute(move |proxy| {
                let attempt = req.try_clone();
                async move {
                    let request = attempt.ok_or_else(|| anyhow!("request could not be cloned"))?;
                    let client = client_for(proxy.as_ref(), timeout)?;
                    Ok::<_, anyhow::Error>(client.execute(request).await?)
                }
            })
            .await;

        outcome.map_err(|e| {
            warn!("Request failed on every route: {}", e);
            Error::Middleware(anyhow::Error::new(e))
        })
    }
}
