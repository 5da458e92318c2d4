//! Proxy endpoint representation.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::InvalidEndpoint;

const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "socks4", "socks4a", "socks5", "socks5h"];

/// Scheme assumed for bare `host:port` entries.
pub const DEFAULT_SCHEME: &str = "http";

/// A normalized outbound proxy address of the form `scheme://host:port`.
///
/// Equality is structural on the normalized form, so `1.2.3.4:80`,
/// `HTTP://1.2.3.4` and `http://1.2.3.4:80` are the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyEndpoint {
    url: String,
}

impl ProxyEndpoint {
    /// Parse an endpoint, assuming `http` when no scheme is given.
    pub fn parse(input: &str) -> Result<Self, InvalidEndpoint> {
        Self::parse_with_scheme(input, DEFAULT_SCHEME)
    }

    /// Parse an endpoint, assuming `default_scheme` when no scheme is given.
    pub fn parse_with_scheme(input: &str, default_scheme: &str) -> Result<Self, InvalidEndpoint> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(InvalidEndpoint::new(input, "empty address"));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("{}://{}", default_scheme, trimmed)
        };

        let parsed =
            Url::parse(&with_scheme).map_err(|e| InvalidEndpoint::new(input, e.to_string()))?;

        let scheme = parsed.scheme().to_ascii_lowercase();
        if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(InvalidEndpoint::new(input, format!("unsupported scheme {}", scheme)));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(InvalidEndpoint::new(input, "credentials are not supported"));
        }
        let extra = parsed.query().is_some() || parsed.fragment().is_some();
        if !matches!(parsed.path(), "" | "/") || extra {
            return Err(InvalidEndpoint::new(input, "unexpected path, query or fragment"));
        }

        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
            _ => return Err(InvalidEndpoint::new(input, "missing host")),
        };
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| InvalidEndpoint::new(input, "missing port"))?;

        Ok(Self {
            url: format!("{}://{}:{}", scheme, host, port),
        })
    }

    /// The normalized `scheme://host:port` string.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.split("://").next().unwrap_or(DEFAULT_SCHEME)
    }

    /// Convert to a [`reqwest::Proxy`] intercepting both HTTP and HTTPS traffic.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        reqwest::Proxy::all(&self.url)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl FromStr for ProxyEndpoint {
    type Err = InvalidEndpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ProxyEndpoint {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

/// Parse a list of addresses, logging and skipping the ones that are invalid.
pub(crate) fn parse_endpoints<I, S>(inputs: I) -> Vec<ProxyEndpoint>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .filter_map(|input| match ProxyEndpoint::parse(input.as_ref()) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                log::warn!("Ignoring configured proxy: {}", e);
                None
            }
        })
        .collect()
}
