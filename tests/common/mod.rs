#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proxy_pool_manager::{Probe, ProxyEndpoint, ProxySource, SourceError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A source returning a fixed list and counting how often it was asked.
pub struct CountingSource {
    name: String,
    proxies: Vec<ProxyEndpoint>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl CountingSource {
    pub fn new(name: &str, proxies: &[&str]) -> Arc<Self> {
        Self::with_delay(name, proxies, Duration::ZERO)
    }

    pub fn with_delay(name: &str, proxies: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            proxies: proxies.iter().map(|p| ProxyEndpoint::parse(p).unwrap()).collect(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn numbered(name: &str, count: usize) -> Arc<Self> {
        let owned: Vec<String> = (0..count)
            .map(|i| format!("10.1.{}.{}:8080", i / 250, i % 250))
            .collect();
        let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
        Self::new(name, &refs)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxySource for CountingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<ProxyEndpoint>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.proxies.clone())
    }
}

/// A prober with a fixed verdict and an optional delay.
pub struct FakeProber {
    verdict: bool,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeProber {
    pub fn passing() -> Arc<Self> {
        Self::new(true, Duration::ZERO)
    }

    pub fn failing() -> Arc<Self> {
        Self::new(false, Duration::ZERO)
    }

    pub fn new(verdict: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for FakeProber {
    async fn probe(&self, _candidate: &ProxyEndpoint) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.verdict
    }
}

/// Serve every connection with the same HTTP response.
///
/// Works as a plain HTTP origin, and as an HTTP forward proxy for `http://`
/// targets since the request line is never inspected.
pub async fn serve_fixed(status: &'static str, body: impl Into<String>) -> SocketAddr {
    let body: String = body.into();
    let body: Arc<str> = Arc::from(body);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = Arc::clone(&body);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&buf[..n]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\
                     Connection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
