// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

/// 初始化 Prometheus 指标导出
///
/// 端口被占用或地址无效时只记录警告，不影响节点运行
///
/// # 参数
///
/// * `listen_addr` - 监听地址，例如 `0.0.0.0:9000`
pub fn init_metrics(listen_addr: &str) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address '{}': {}", listen_addr, e);
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_counter!("scrapeflow_tasks_total", "Tasks reaching a terminal state");
    describe_counter!("scrapeflow_cache_hits_total", "Cache hits per keyspace");
    describe_counter!("scrapeflow_cache_misses_total", "Cache misses per keyspace");
    describe_histogram!(
        "scrapeflow_scrape_duration_seconds",
        "Wall-clock duration of browser scrapes"
    );
    describe_counter!("scrapeflow_llm_requests_total", "LLM provider calls");
    describe_counter!("scrapeflow_llm_tokens_total", "Tokens reported by LLM providers");
    describe_counter!(
        "scrapeflow_browser_restarts_total",
        "Browser processes closed by idle eviction"
    );

    info!("Metrics exporter listening on {}", addr);
}

pub fn record_task(status: &str) {
    counter!("scrapeflow_tasks_total", "status" => status.to_string()).increment(1);
}

pub fn record_cache_lookup(keyspace: &'static str, hit: bool) {
    if hit {
        counter!("scrapeflow_cache_hits_total", "keyspace" => keyspace).increment(1);
    } else {
        counter!("scrapeflow_cache_misses_total", "keyspace" => keyspace).increment(1);
    }
}

pub fn record_scrape_duration(elapsed: Duration) {
    histogram!("scrapeflow_scrape_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_llm_request(provider: &str, success: bool, tokens: u64) {
    let status = if success { "success" } else { "failed" };
    counter!(
        "scrapeflow_llm_requests_total",
        "provider" => provider.to_string(),
        "status" => status
    )
    .increment(1);
    if tokens > 0 {
        counter!("scrapeflow_llm_tokens_total", "provider" => provider.to_string())
            .increment(tokens);
    }
}

pub fn record_browser_restart() {
    counter!("scrapeflow_browser_restarts_total").increment(1);
}
