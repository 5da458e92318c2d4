//! Liveness probing of candidate proxies.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::config::ProbeTarget;
use crate::proxy::ProxyEndpoint;

/// Outcome of probing a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub candidate: ProxyEndpoint,
    pub working: bool,
}

/// Checks whether a candidate proxy is usable.
///
/// Implementations must not fail: anything that goes wrong is reported as `false`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, candidate: &ProxyEndpoint) -> bool;
}

/// Probes a candidate by sending sequential GETs through it.
///
/// A candidate passes only if every target answers with a 2xx status within
/// that target's timeout. Certificates are not verified on this client: it
/// only establishes liveness and is never used for real traffic.
#[derive(Debug, Clone)]
pub struct HttpProber {
    targets: Vec<ProbeTarget>,
}

impl HttpProber {
    pub fn new(targets: Vec<ProbeTarget>) -> Self {
        Self { targets }
    }

    fn client_for(&self, candidate: &ProxyEndpoint) -> Result<Client, reqwest::Error> {
        let overall = self
            .targets
            .iter()
            .map(|t| t.timeout)
            .max()
            .unwrap_or(Duration::from_secs(5));

        Client::builder()
            .proxy(candidate.to_reqwest_proxy()?)
            .danger_accept_invalid_certs(true)
            .timeout(overall)
            .pool_max_idle_per_host(0)
            .build()
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, candidate: &ProxyEndpoint) -> bool {
        let client = match self.client_for(candidate) {
            Ok(client) => client,
            Err(e) => {
                debug!("Cannot build probe client for {}: {}", candidate, e);
                return false;
            }
        };

        for target in &self.targets {
            match client.get(&target.url).timeout(target.timeout).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    debug!("Probe of {} via {} returned {}", target.url, candidate, resp.status());
                    return false;
                }
                Err(e) => {
                    debug!("Probe of {} via {} failed: {}", target.url, candidate, e);
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_proxy_fails_probe() {
        let prober = HttpProber::new(vec![ProbeTarget::new(
            "http://example.com/",
            Duration::from_secs(2),
        )]);
        let candidate = ProxyEndpoint::parse("http://127.0.0.1:1").unwrap();
        assert!(!prober.probe(&candidate).await);
    }
}
