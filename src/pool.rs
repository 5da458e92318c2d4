//! Core proxy pool implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::ProxyPoolConfig;
use crate::probe::{HttpProber, Probe};
use crate::proxy::{parse_endpoints, ProxyEndpoint};
use crate::refresh::{PoolGeneration, PoolRefresher, RefreshReport};
use crate::source::{ProxySource, SourceFetcher, StaticSource};

/// Anything that can hand out a proxy for the next attempt.
///
/// `None` means "go direct".
#[async_trait]
pub trait ProxySupplier: Send + Sync {
    async fn get_proxy(&self) -> Option<ProxyEndpoint>;
}

/// Snapshot of the pool for monitoring.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub entries: usize,
    pub generation: PoolGeneration,
    /// Time since the last completed refresh, `None` if never refreshed.
    pub age: Option<Duration>,
    /// Number of refresh pipelines run so far.
    pub refreshes: u64,
}

struct PoolState {
    entries: Vec<ProxyEndpoint>,
    last_refreshed: Option<Instant>,
    generation: PoolGeneration,
    refreshes: u64,
}

/// A lazily refreshed pool of verified proxies.
///
/// Every [`get_proxy`](ProxyPool::get_proxy) call checks staleness first; a
/// stale pool is refreshed at most once no matter how many callers notice.
pub struct ProxyPool {
    state: RwLock<PoolState>,
    /// Serializes refresh pipelines.
    refresh_lock: Mutex<()>,
    refresher: PoolRefresher,
    /// Configuration for the pool.
    pub config: ProxyPoolConfig,
}

impl ProxyPool {
    /// Create a pool fetching from the configured HTTP sources and probing with
    /// the configured targets. Nothing is fetched until the first access.
    pub fn new(config: ProxyPoolConfig) -> Result<Arc<Self>, reqwest::Error> {
        let fetcher = SourceFetcher::from_configs(
            StaticSource::from_strings(&config.static_proxies),
            &config.sources,
            config.fetch_deadline,
            config.max_candidates,
        )?;
        let prober = Arc::new(HttpProber::new(config.probe_targets.clone()));
        Ok(Self::from_fetcher(config, fetcher, prober))
    }

    /// Create a pool from explicit sources and prober, e.g. fakes in tests.
    ///
    /// The configured static proxies are still offered ahead of `sources`.
    pub fn with_sources(
        config: ProxyPoolConfig,
        sources: Vec<Arc<dyn ProxySource>>,
        prober: Arc<dyn Probe>,
    ) -> Arc<Self> {
        let fetcher = SourceFetcher::new(
            StaticSource::from_strings(&config.static_proxies),
            sources,
            config.fetch_deadline,
            config.max_candidates,
        );
        Self::from_fetcher(config, fetcher, prober)
    }

    fn from_fetcher(
        config: ProxyPoolConfig,
        fetcher: SourceFetcher,
        prober: Arc<dyn Probe>,
    ) -> Arc<Self> {
        let fallback = parse_endpoints(&config.fallback_proxies);
        let refresher = PoolRefresher::new(fetcher, prober, fallback)
            .with_probing(config.probe_concurrency, config.probe_deadline, config.target_working)
            .with_max_pool_size(config.max_pool_size);

        Arc::new(Self {
            state: RwLock::new(PoolState {
                entries: Vec::new(),
                last_refreshed: None,
                generation: PoolGeneration::Empty,
                refreshes: 0,
            }),
            refresh_lock: Mutex::new(()),
            refresher,
            config,
        })
    }

    /// Get a random proxy, refreshing the pool first if it is stale.
    ///
    /// Returns `None` only if the pool is empty even after refreshing; callers
    /// should then connect directly.
    pub async fn get_proxy(&self) -> Option<ProxyEndpoint> {
        self.refresh().await;

        let state = self.state.read();
        if state.entries.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..state.entries.len());
        Some(state.entries[idx].clone())
    }

    /// Refresh the pool if it is stale. Concurrent callers share one refresh.
    pub async fn refresh(&self) {
        if !self.is_stale() {
            return;
        }

        let _guard = self.refresh_lock.lock().await;
        // another caller may have refreshed while we waited
        if !self.is_stale() {
            debug!("Pool was refreshed while waiting, skipping");
            return;
        }
        self.run_refresh().await;
    }

    /// Refresh the pool regardless of staleness.
    pub async fn force_refresh(&self) {
        let _guard = self.refresh_lock.lock().await;
        self.run_refresh().await;
    }

    async fn run_refresh(&self) {
        info!("Refreshing proxy pool");
        let report = self.refresher.run().await;
        self.commit(report);
    }

    fn commit(&self, report: RefreshReport) {
        let mut state = self.state.write();
        state.entries = report.entries;
        state.last_refreshed = Some(Instant::now());
        state.generation = report.generation;
        state.refreshes += 1;
        info!(
            "Proxy pool status update: {} {:?} proxies \
             ({} candidates, {} probed, {} sources failed)",
            state.entries.len(),
            report.generation,
            report.candidates,
            report.probed,
            report.failed_sources
        );
    }

    /// Whether the next access will trigger a refresh.
    pub fn is_stale(&self) -> bool {
        match self.state.read().last_refreshed {
            None => true,
            Some(at) => at.elapsed() >= self.config.refresh_interval,
        }
    }

    /// The current pool content, without triggering a refresh.
    pub fn entries(&self) -> Vec<ProxyEndpoint> {
        self.state.read().entries.clone()
    }

    /// Get statistics about the proxy pool.
    pub fn get_stats(&self) -> PoolStats {
        let state = self.state.read();
        PoolStats {
            entries: state.entries.len(),
            generation: state.generation,
            age: state.last_refreshed.map(|at| at.elapsed()),
            refreshes: state.refreshes,
        }
    }
}

#[async_trait]
impl ProxySupplier for ProxyPool {
    async fn get_proxy(&self) -> Option<ProxyEndpoint> {
        ProxyPool::get_proxy(self).await
    }
}
