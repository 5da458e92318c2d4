//! # proxy-pool-manager
//!
//! A self-refreshing pool of verified outbound proxies for reqwest.
//!
//! Candidates are gathered from several untrusted proxy-list sources, probed
//! live through each candidate, and the survivors are served at random. When
//! nothing survives, a fixed fallback list takes over. Work is retried through
//! fresh proxies and finally attempted over a direct connection.
//!
//! ```no_run
//! use proxy_pool_manager::{ProxyPool, ProxyPoolConfig, RetryingExecutor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ProxyPool::new(ProxyPoolConfig::default())?;
//! let executor = RetryingExecutor::from_pool(pool);
//! let body = executor
//!     .execute(|proxy| async move {
//!         let builder = reqwest::Client::builder();
//!         let builder = match &proxy {
//!             Some(p) => builder.proxy(p.to_reqwest_proxy()?),
//!             None => builder.no_proxy(),
//!         };
//!         builder.build()?.get("https://httpbin.org/ip").send().await?.text().await
//!     })
//!     .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod pool;
pub mod probe;
pub mod proxy;
pub mod refresh;
pub mod source;
pub mod tasks;
mod utils;

pub use config::{ProbeTarget, ProxyPoolConfig, ProxyPoolConfigBuilder, SourceConfig, SourceFormat};
pub use error::{ExecuteError, InvalidEndpoint, SourceError};
pub use executor::{AttemptOutcome, RetryingExecutor, WorkAttempt};
pub use middleware::ProxyPoolMiddleware;
pub use pool::{PoolStats, ProxyPool, ProxySupplier};
pub use probe::{HttpProber, Probe, ProbeResult};
pub use proxy::ProxyEndpoint;
pub use refresh::{PoolGeneration, PoolRefresher, RefreshReport};
pub use source::{FetchReport, HttpSource, ProxySource, SourceFetcher, StaticSource};
pub use tasks::{TaskId, TaskTracker};
