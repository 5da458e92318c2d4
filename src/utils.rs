//! Parsing of proxy-list payloads.

use log::debug;
use serde_json::Value;

use crate::config::SourceFormat;
use crate::proxy::ProxyEndpoint;

/// Parse a source payload according to its declared format.
///
/// Entries that are not valid endpoints are skipped; an `Err` is returned only
/// when the payload as a whole does not have the declared shape.
pub(crate) fn parse_payload(
    content: &str,
    format: &SourceFormat,
    default_scheme: &str,
) -> Result<Vec<ProxyEndpoint>, String> {
    match format {
        SourceFormat::PlainText => Ok(parse_proxy_list(content, default_scheme)),
        SourceFormat::Json { root, field } => {
            let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
            let items = json_array(&value, root.as_deref())?;
            Ok(items
                .iter()
                .filter_map(|item| {
                    let address = match (item, field) {
                        (Value::String(s), _) => Some(s.as_str()),
                        (Value::Object(map), Some(field)) => map.get(field).and_then(Value::as_str),
                        _ => None,
                    };
                    address.and_then(|a| endpoint(a, default_scheme))
                })
                .collect())
        }
        SourceFormat::JsonHostPort {
            root,
            host: host_key,
            port: port_key,
        } => {
            let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
            let items = json_array(&value, root.as_deref())?;
            Ok(items
                .iter()
                .filter_map(|item| {
                    let host = item.get(host_key).and_then(Value::as_str)?;
                    let port = match item.get(port_key)? {
                        Value::Number(n) => n.as_u64()?.to_string(),
                        Value::String(s) => s.trim().to_string(),
                        _ => return None,
                    };
                    endpoint(&format!("{}:{}", host.trim(), port), default_scheme)
                })
                .collect())
        }
    }
}

/// Parse text content holding one proxy per line.
pub(crate) fn parse_proxy_list(content: &str, default_scheme: &str) -> Vec<ProxyEndpoint> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| endpoint(line, default_scheme))
        .collect()
}

fn json_array<'a>(value: &'a Value, root: Option<&str>) -> Result<&'a Vec<Value>, String> {
    let target = match root {
        Some(key) => value
            .get(key)
            .ok_or_else(|| format!("missing top-level key {:?}", key))?,
        None => value,
    };
    target
        .as_array()
        .ok_or_else(|| "expected a JSON array of proxies".to_string())
}

fn endpoint(address: &str, default_scheme: &str) -> Option<ProxyEndpoint> {
    match ProxyEndpoint::parse_with_scheme(address, default_scheme) {
        Ok(endpoint) => Some(endpoint),
        Err(e) => {
            debug!("Skipping entry: {}", e);
            None
        }
    }
}
