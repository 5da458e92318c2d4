//! Fetch-then-probe refresh pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::probe::{Probe, ProbeResult};
use crate::proxy::ProxyEndpoint;
use crate::source::SourceFetcher;

/// Where the content of a pool generation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolGeneration {
    /// Never refreshed.
    Empty,
    /// Candidates that passed probing.
    Live,
    /// The fixed fallback list, because nothing passed probing.
    Fallback,
}

/// Result of one refresh pipeline run.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub entries: Vec<ProxyEndpoint>,
    pub generation: PoolGeneration,
    pub candidates: usize,
    pub probed: usize,
    pub failed_sources: usize,
}

/// Runs the fetch-then-probe pipeline and decides the next pool content.
///
/// It never touches pool state itself; the caller commits the report.
pub struct PoolRefresher {
    fetcher: SourceFetcher,
    prober: Arc<dyn Probe>,
    fallback: Vec<ProxyEndpoint>,
    probe_concurrency: usize,
    probe_deadline: Duration,
    target_working: usize,
    max_pool_size: usize,
}

impl PoolRefresher {
    pub fn new(
        fetcher: SourceFetcher,
        prober: Arc<dyn Probe>,
        fallback: Vec<ProxyEndpoint>,
    ) -> Self {
        Self {
            fetcher,
            prober,
            fallback,
            probe_concurrency: 20,
            probe_deadline: Duration::from_secs(30),
            target_working: 10,
            max_pool_size: 10,
        }
    }

    /// Set the probing limits: concurrency, deadline and early-exit target.
    pub fn with_probing(
        mut self,
        concurrency: usize,
        deadline: Duration,
        target_working: usize,
    ) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self.probe_deadline = deadline;
        self.target_working = target_working.max(1);
        self
    }

    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size.max(1);
        self
    }

    /// Fetch candidates, probe them, and return the next pool content.
    pub async fn run(&self) -> RefreshReport {
        let fetched = self.fetcher.fetch_all().await;
        let candidates = fetched.candidates.len();

        let (mut working, probed) = self.probe_all(fetched.candidates).await;

        if working.is_empty() {
            warn!(
                "No working proxies among {} candidates, falling back to {} static entries",
                candidates,
                self.fallback.len()
            );
            let mut entries = self.fallback.clone();
            entries.truncate(self.max_pool_size);
            return RefreshReport {
                entries,
                generation: PoolGeneration::Fallback,
                candidates,
                probed,
                failed_sources: fetched.failed_sources,
            };
        }

        working.truncate(self.max_pool_size);
        info!(
            "Refresh found {} working proxies ({} candidates, {} probed)",
            working.len(),
            candidates,
            probed
        );
        RefreshReport {
            entries: working,
            generation: PoolGeneration::Live,
            candidates,
            probed,
            failed_sources: fetched.failed_sources,
        }
    }

    /// Probe candidates concurrently until the target is met or the deadline passes.
    ///
    /// Probes still in flight when either happens are dropped, and candidates
    /// not yet started are never probed.
    async fn probe_all(&self, candidates: Vec<ProxyEndpoint>) -> (Vec<ProxyEndpoint>, usize) {
        let mut working = Vec::new();
        let mut probed = 0;

        let prober = &self.prober;
        let probing = async {
            let mut results = stream::iter(candidates)
                .map(|candidate| async move {
                    let ok = prober.probe(&candidate).await;
                    ProbeResult { candidate, working: ok }
                })
                .buffer_unordered(self.probe_concurrency);

            while let Some(result) = results.next().await {
                probed += 1;
                if !result.working {
                    debug!("Dropping candidate {}", result.candidate);
                    continue;
                }
                working.push(result.candidate);
                if working.len() >= self.target_working {
                    break;
                }
            }
        };

        if tokio::time::timeout(self.probe_deadline, probing).await.is_err() {
            warn!(
                "Probing deadline of {:?} reached, abandoning in-flight probes",
                self.probe_deadline
            );
        }

        (working, probed)
    }
}
