mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logging, serve_fixed, CountingSource, FakeProber};
use proxy_pool_manager::{
    ExecuteError, HttpProber, HttpSource, PoolGeneration, Probe, ProbeTarget, ProxyEndpoint,
    ProxyPool, ProxyPoolConfig, ProxyPoolMiddleware, ProxySource, SourceConfig, SourceError,
    SourceFormat,
};
use reqwest_middleware::ClientBuilder;

fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn probe_target() -> Vec<ProbeTarget> {
    vec![ProbeTarget::new("http://probe.invalid/generate_204", Duration::from_secs(3))]
}

#[tokio::test]
async fn http_source_reads_plain_text_lists() {
    let addr = serve_fixed("200 OK", "1.2.3.4:80\n# comment\n5.6.7.8:8080\n").await;
    let config = SourceConfig::text(format!("http://{}/list.txt", addr));
    let source = HttpSource::with_client(config, direct_client());

    let proxies = source.fetch().await.unwrap();
    let urls: Vec<&str> = proxies.iter().map(ProxyEndpoint::as_str).collect();
    assert_eq!(urls, vec!["http://1.2.3.4:80", "http://5.6.7.8:8080"]);
}

#[tokio::test]
async fn http_source_reads_json_lists() {
    let body = r#"[{"proxy": "socks5://1.2.3.4:1080"}, {"proxy": "5.6.7.8:3128"}]"#;
    let addr = serve_fixed("200 OK", body).await;
    let config = SourceConfig::new(
        format!("http://{}/data.json", addr),
        SourceFormat::Json {
            root: None,
            field: Some("proxy".to_string()),
        },
    );
    let source = HttpSource::with_client(config, direct_client());

    let proxies = source.fetch().await.unwrap();
    assert_eq!(proxies.len(), 2);
    assert_eq!(proxies[0].scheme(), "socks5");
}

#[tokio::test]
async fn http_source_reports_bad_status_and_payload() {
    let unavailable = serve_fixed("503 Service Unavailable", "").await;
    let config = SourceConfig::text(format!("http://{}/", unavailable));
    let source = HttpSource::with_client(config, direct_client());
    assert!(matches!(source.fetch().await, Err(SourceError::Status { .. })));

    let html = serve_fixed("200 OK", "<html>blocked</html>").await;
    let source = HttpSource::with_client(
        SourceConfig::json(format!("http://{}/", html), Some("proxy")),
        direct_client(),
    );
    assert!(matches!(source.fetch().await, Err(SourceError::Malformed { .. })));
}

#[tokio::test]
async fn http_prober_passes_through_live_proxy() {
    let proxy = serve_fixed("200 OK", "ok").await;
    let prober = HttpProber::new(probe_target());
    let candidate = ProxyEndpoint::parse(&proxy.to_string()).unwrap();
    assert!(prober.probe(&candidate).await);
}

#[tokio::test]
async fn http_prober_rejects_error_status() {
    let proxy = serve_fixed("502 Bad Gateway", "").await;
    let prober = HttpProber::new(probe_target());
    let candidate = ProxyEndpoint::parse(&proxy.to_string()).unwrap();
    assert!(!prober.probe(&candidate).await);
}

#[tokio::test]
async fn full_pipeline_over_http() {
    init_logging();
    let proxy = serve_fixed("200 OK", "ok").await;
    // port 1 is never listening, so this candidate fails its probe
    let list = serve_fixed("200 OK", format!("{}\n127.0.0.1:1\n", proxy)).await;

    let config = ProxyPoolConfig::builder()
        .sources(vec![SourceConfig::text(format!("http://{}/list.txt", list))])
        .static_proxies(Vec::<String>::new())
        .probe_targets(probe_target())
        .build();
    let pool = ProxyPool::new(config).unwrap();

    let picked = pool.get_proxy().await.unwrap();
    assert_eq!(picked, ProxyEndpoint::parse(&proxy.to_string()).unwrap());
    assert_eq!(pool.entries().len(), 1);
    assert_eq!(pool.get_stats().generation, PoolGeneration::Live);
}

fn pool_with(proxies: &[&str]) -> Arc<ProxyPool> {
    let source: Arc<dyn ProxySource> = CountingSource::new("test", proxies);
    ProxyPool::with_sources(
        ProxyPoolConfig::builder()
            .static_proxies(Vec::<String>::new())
            .fallback_proxies(Vec::<String>::new())
            .request_timeout(Duration::from_secs(5))
            .build(),
        vec![source],
        FakeProber::passing(),
    )
}

#[tokio::test]
async fn middleware_routes_requests_through_the_pool() {
    let proxy = serve_fixed("200 OK", "via proxy").await.to_string();
    let middleware = ProxyPoolMiddleware::from_pool(pool_with(&[proxy.as_str()]));
    let pool = Arc::clone(middleware.pool());
    let client = ClientBuilder::new(reqwest::Client::new()).with(middleware).build();
    assert_eq!(pool.get_stats().refreshes, 0);

    let response = client.get("http://origin.invalid/ip").send().await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "via proxy");
    assert_eq!(pool.get_stats().refreshes, 1);
}

#[tokio::test]
async fn middleware_falls_back_to_direct_connection() {
    init_logging();
    let origin = serve_fixed("200 OK", "direct").await;
    let pool = pool_with(&["127.0.0.1:1"]);
    let client = ClientBuilder::new(reqwest::Client::new())
        .with(ProxyPoolMiddleware::from_pool(pool))
        .build();

    let response = client.get(format!("http://{}/ip", origin)).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "direct");
}

#[tokio::test]
async fn middleware_surfaces_terminal_failure() {
    let pool = pool_with(&["127.0.0.1:1"]);
    let client = ClientBuilder::new(reqwest::Client::new())
        .with(ProxyPoolMiddleware::from_pool(pool))
        .build();

    let err = client.get("http://127.0.0.1:1/ip").send().await.unwrap_err();
    let inner = match err {
        reqwest_middleware::Error::Middleware(inner) => inner,
        other => panic!("expected a middleware error, got {:?}", other),
    };
    let exhausted = inner.downcast_ref::<ExecuteError>().unwrap();
    assert_eq!(exhausted.attempts(), 4);
    assert!(!exhausted.last_error().is_empty());
}
