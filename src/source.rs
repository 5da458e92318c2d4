//! Candidate proxy sources.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use log::{debug, info, warn};
use reqwest::Client;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::proxy::{parse_endpoints, ProxyEndpoint};
use crate::utils;

/// Something that can produce candidate proxies.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Fetch the current candidate list.
    async fn fetch(&self) -> Result<Vec<ProxyEndpoint>, SourceError>;
}

/// A hardcoded candidate list. Never fails.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    proxies: Vec<ProxyEndpoint>,
}

impl StaticSource {
    pub fn new(proxies: Vec<ProxyEndpoint>) -> Self {
        Self { proxies }
    }

    /// Build from address strings, skipping the invalid ones.
    pub fn from_strings<S: AsRef<str>>(proxies: &[S]) -> Self {
        Self::new(parse_endpoints(proxies))
    }

    pub fn proxies(&self) -> &[ProxyEndpoint] {
        &self.proxies
    }
}

#[async_trait]
impl ProxySource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<ProxyEndpoint>, SourceError> {
        Ok(self.proxies.clone())
    }
}

/// A proxy list fetched with an HTTP GET.
pub struct HttpSource {
    config: SourceConfig,
    client: Client,
}

impl HttpSource {
    pub fn new(config: SourceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(config, client))
    }

    /// Use an existing client, e.g. to share connection pools between sources.
    pub fn with_client(config: SourceConfig, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ProxySource for HttpSource {
    fn name(&self) -> &str {
        &self.config.url
    }

    async fn fetch(&self) -> Result<Vec<ProxyEndpoint>, SourceError> {
        let url = &self.config.url;
        let request_error = |source| SourceError::Request {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.clone(),
                status,
            });
        }

        let content = response.text().await.map_err(request_error)?;
        utils::parse_payload(&content, &self.config.format, &self.config.default_scheme)
            .map_err(|reason| SourceError::Malformed {
                url: url.clone(),
                reason,
            })
    }
}

/// Result of one fan-out over all sources.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Deduplicated candidates, static entries first.
    pub candidates: Vec<ProxyEndpoint>,
    /// Number of sources that failed and contributed nothing.
    pub failed_sources: usize,
}

/// Gathers candidates from every registered source concurrently.
pub struct SourceFetcher {
    static_source: StaticSource,
    sources: Vec<Arc<dyn ProxySource>>,
    deadline: Duration,
    max_candidates: usize,
}

impl SourceFetcher {
    pub fn new(
        static_source: StaticSource,
        sources: Vec<Arc<dyn ProxySource>>,
        deadline: Duration,
        max_candidates: usize,
    ) -> Self {
        Self {
            static_source,
            sources,
            deadline,
            max_candidates: max_candidates.max(1),
        }
    }

    /// Build HTTP sources for every configured source entry.
    pub fn from_configs(
        static_source: StaticSource,
        configs: &[SourceConfig],
        deadline: Duration,
        max_candidates: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        let sources = configs
            .iter()
            .map(|config| {
                let source = HttpSource::with_client(config.clone(), client.clone());
                Arc::new(source) as Arc<dyn ProxySource>
            })
            .collect();
        Ok(Self::new(static_source, sources, deadline, max_candidates))
    }

    /// Query all sources concurrently and union their results.
    ///
    /// Failing or slow sources contribute nothing. Static entries are always included.
    pub async fn fetch_all(&self) -> FetchReport {
        let deadline = self.deadline;
        let fetches = self.sources.iter().map(|source| async move {
            let result = match tokio::time::timeout(deadline, source.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout {
                    name: source.name().to_string(),
                    deadline,
                }),
            };
            (source.name(), result)
        });
        let results = future::join_all(fetches).await;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut failed_sources = 0;

        let mut add = |batch: Vec<ProxyEndpoint>| {
            for endpoint in batch {
                if seen.insert(endpoint.clone()) {
                    candidates.push(endpoint);
                }
            }
        };

        add(self.static_source.proxies().to_vec());

        for (name, result) in results {
            match result {
                Ok(batch) => {
                    debug!("Fetched {} proxies from {}", batch.len(), name);
                    add(batch);
                }
                Err(e) => {
                    warn!("Failed to fetch proxies from {}: {}", name, e);
                    failed_sources += 1;
                }
            }
        }

        candidates.truncate(self.max_candidates);
        info!(
            "Collected {} unique candidates ({} of {} sources failed)",
            candidates.len(),
            failed_sources,
            self.sources.len()
        );

        FetchReport {
            candidates,
            failed_sources,
        }
    }
}
