//! Simple example of using proxy-pool-manager.

use proxy_pool_manager::{
    ProxyPool, ProxyPoolConfig, ProxyPoolMiddleware, SourceConfig, TaskTracker,
};
use reqwest_middleware::ClientBuilder;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ProxyPoolConfig::builder()
        .sources(vec![
            SourceConfig::text(
                "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/countries/US/data.txt",
            ),
            SourceConfig::text(
                "https://cdn.jsdelivr.net/gh/dpangestuw/Free-Proxy@main/socks5_proxies.txt",
            )
            .with_scheme("socks5"),
        ])
        .refresh_interval(Duration::from_secs(300))
        .probe_deadline(Duration::from_secs(20))
        .retry_count(2)
        // rate limit for each proxy, lower performance but avoid banned
        .max_requests_per_second(3.0)
        .build();

    let pool = ProxyPool::new(config)?;

    println!("Refreshing proxy pool...");
    pool.force_refresh().await;
    let stats = pool.get_stats();
    println!("Pool holds {} {:?} proxies", stats.entries, stats.generation);

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(ProxyPoolMiddleware::from_pool(pool.clone()))
        .build();

    // background work is tracked so it can be cancelled on shutdown
    let tracker = TaskTracker::new();
    for _ in 0..3 {
        let client = client.clone();
        tracker.spawn("ip-check", async move {
            let response = client.get("https://httpbin.org/ip").send().await?;
            println!("Status: {}", response.status());
            println!("Response: {}", response.text().await?);
            Ok::<_, reqwest_middleware::Error>(())
        });
    }

    tokio::select! {
        _ = tracker.wait_all() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, cancelling in-flight requests");
            tracker.shutdown().await;
        }
    }

    Ok(())
}
