//! Configuration for the proxy pool.

use std::time::Duration;

use crate::proxy::DEFAULT_SCHEME;

/// Proxies bundled with the crate, always offered as candidates.
pub const DEFAULT_STATIC_PROXIES: &[&str] = &["http://51.79.50.31:9300"];

/// Last-known-good proxies committed when no candidate survives probing.
pub const DEFAULT_FALLBACK_PROXIES: &[&str] = &[
    "http://51.79.50.31:9300",
    "http://45.77.56.114:3128",
    "http://185.199.229.156:7492",
    "http://185.199.228.220:7300",
];

/// Shape of the payload returned by a proxy-list source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    /// One `host:port` or full proxy URI per line. Blank lines and `#` comments are skipped.
    PlainText,
    /// A JSON array, optionally stored under the top-level key `root`.
    /// Elements are address strings, or objects keeping the address under `field`.
    Json {
        root: Option<String>,
        field: Option<String>,
    },
    /// A JSON array of objects with separate host and port keys.
    JsonHostPort {
        root: Option<String>,
        host: String,
        port: String,
    },
}

/// A remote proxy-list source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub url: String,
    pub format: SourceFormat,
    /// Scheme given to entries that do not carry one.
    pub default_scheme: String,
    /// Request timeout for this source.
    pub timeout: Duration,
}

impl SourceConfig {
    /// A plain-text source listing one proxy per line.
    pub fn text(url: impl Into<String>) -> Self {
        Self::new(url, SourceFormat::PlainText)
    }

    /// A JSON source; `field` names the address key when elements are objects.
    pub fn json(url: impl Into<String>, field: Option<&str>) -> Self {
        Self::new(
            url,
            SourceFormat::Json {
                root: None,
                field: field.map(str::to_string),
            },
        )
    }

    pub fn new(url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            url: url.into(),
            format,
            default_scheme: DEFAULT_SCHEME.to_string(),
            timeout: Duration::from_secs(8),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A URL probed through each candidate, and how long it may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub url: String,
    pub timeout: Duration,
}

impl ProbeTarget {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

/// The sources used when none are configured explicitly.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::text(
            "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/countries/US/data.txt",
        ),
        SourceConfig::text(
            "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt",
        ),
        SourceConfig::json(
            "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.json",
            Some("proxy"),
        ),
    ]
}

/// The probe targets used when none are configured explicitly: a fast generic
/// check followed by a check against the domain the client actually talks to.
pub fn default_probe_targets() -> Vec<ProbeTarget> {
    vec![
        ProbeTarget::new("http://www.gstatic.com/generate_204", Duration::from_secs(3)),
        ProbeTarget::new("https://www.youtube.com/robots.txt", Duration::from_secs(5)),
    ]
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Remote sources to fetch candidate lists from.
    pub sources: Vec<SourceConfig>,
    /// Candidates that are always offered, ahead of every remote source.
    pub static_proxies: Vec<String>,
    /// Pool content used when no candidate survives probing.
    pub fallback_proxies: Vec<String>,
    /// How long a refreshed pool stays fresh.
    pub refresh_interval: Duration,
    /// Upper bound on the number of pooled proxies.
    pub max_pool_size: usize,
    /// Upper bound on candidates passed to probing.
    pub max_candidates: usize,
    /// Deadline for fetching all sources.
    pub fetch_deadline: Duration,
    /// URLs that a candidate must reach to count as working.
    pub probe_targets: Vec<ProbeTarget>,
    /// Maximum number of probes in flight.
    pub probe_concurrency: usize,
    /// Deadline for the whole probing phase.
    pub probe_deadline: Duration,
    /// Probing stops once this many working proxies are found.
    pub target_working: usize,
    /// Number of proxied attempts before falling back to a direct connection.
    pub retry_count: usize,
    /// Maximum requests per second per proxy.
    pub max_requests_per_second: f64,
    /// Timeout applied to requests sent through the middleware.
    pub request_timeout: Duration,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    sources: Option<Vec<SourceConfig>>,
    static_proxies: Option<Vec<String>>,
    fallback_proxies: Option<Vec<String>>,
    refresh_interval: Option<Duration>,
    max_pool_size: Option<usize>,
    max_candidates: Option<usize>,
    fetch_deadline: Option<Duration>,
    probe_targets: Option<Vec<ProbeTarget>>,
    probe_concurrency: Option<usize>,
    probe_deadline: Option<Duration>,
    target_working: Option<usize>,
    retry_count: Option<usize>,
    max_requests_per_second: Option<f64>,
    request_timeout: Option<Duration>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            sources: None,
            static_proxies: None,
            fallback_proxies: None,
            refresh_interval: None,
            max_pool_size: None,
            max_candidates: None,
            fetch_deadline: None,
            probe_targets: None,
            probe_concurrency: None,
            probe_deadline: None,
            target_working: None,
            retry_count: None,
            max_requests_per_second: None,
            request_timeout: None,
        }
    }

    /// Set the remote sources to fetch proxy lists from.
    pub fn sources(mut self, sources: Vec<SourceConfig>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Set the candidates offered ahead of every remote source.
    pub fn static_proxies(mut self, proxies: Vec<impl Into<String>>) -> Self {
        self.static_proxies = Some(proxies.into_iter().map(Into::into).collect());
        self
    }

    /// Set the pool content used when nothing survives probing.
    pub fn fallback_proxies(mut self, proxies: Vec<impl Into<String>>) -> Self {
        self.fallback_proxies = Some(proxies.into_iter().map(Into::into).collect());
        self
    }

    /// Set how long a refreshed pool stays fresh.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Set the maximum number of pooled proxies.
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set the maximum number of candidates passed to probing.
    pub fn max_candidates(mut self, count: usize) -> Self {
        self.max_candidates = Some(count);
        self
    }

    /// Set the deadline for fetching all sources.
    pub fn fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = Some(deadline);
        self
    }

    /// Set the URLs probed through each candidate.
    pub fn probe_targets(mut self, targets: Vec<ProbeTarget>) -> Self {
        self.probe_targets = Some(targets);
        self
    }

    /// Set the maximum number of concurrent probes.
    pub fn probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = Some(concurrency);
        self
    }

    /// Set the deadline for the probing phase.
    pub fn probe_deadline(mut self, deadline: Duration) -> Self {
        self.probe_deadline = Some(deadline);
        self
    }

    /// Set the number of working proxies after which probing stops.
    pub fn target_working(mut self, count: usize) -> Self {
        self.target_working = Some(count);
        self
    }

    /// Set the number of proxied attempts before the direct fallback.
    pub fn retry_count(mut self, count: usize) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Set the maximum requests per second per proxy.
    pub fn max_requests_per_second(mut self, rps: f64) -> Self {
        self.max_requests_per_second = Some(rps);
        self
    }

    /// Set the timeout for requests sent through the middleware.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        ProxyPoolConfig {
            sources: self.sources.unwrap_or_else(default_sources),
            static_proxies: self.static_proxies.unwrap_or_else(|| owned(DEFAULT_STATIC_PROXIES)),
            fallback_proxies: self
                .fallback_proxies
                .unwrap_or_else(|| owned(DEFAULT_FALLBACK_PROXIES)),
            refresh_interval: self.refresh_interval.unwrap_or(Duration::from_secs(600)),
            max_pool_size: self.max_pool_size.unwrap_or(10).max(1),
            max_candidates: self.max_candidates.unwrap_or(50).max(1),
            fetch_deadline: self.fetch_deadline.unwrap_or(Duration::from_secs(10)),
            probe_targets: self.probe_targets.unwrap_or_else(default_probe_targets),
            probe_concurrency: self.probe_concurrency.unwrap_or(20).max(1),
            probe_deadline: self.probe_deadline.unwrap_or(Duration::from_secs(30)),
            target_working: self.target_working.unwrap_or(10).max(1),
            retry_count: self.retry_count.unwrap_or(3),
            max_requests_per_second: self.max_requests_per_second.unwrap_or(5.0),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
