//! Integration tests
//!
//! These tests use wiremock to create mock HTTP servers and run full sweeps
//! and validator sessions end-to-end.
//!
//! Mock servers listen on 127.0.0.1. A crawl seeded on `127.0.0.1` treats
//! `localhost` as a different host, which is how external links are modeled.

mod crawl_tests;
mod validator_tests;

use std::sync::Arc;
use sumi_sweep::config::{Config, CrawlerConfig, ValidatorConfig};
use sumi_sweep::{Coordinator, NoopObserver, Report};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a configuration with short timeouts and no politeness delay
pub fn test_config() -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_pages: 4,
            max_pages: 100,
            page_timeout: 2_000,
            sitemap_fallback: false,
            ..Default::default()
        },
        validator: fast_validator_config(),
        ..Default::default()
    }
}

pub fn fast_validator_config() -> ValidatorConfig {
    ValidatorConfig {
        probe_timeout: 2_000,
        max_retries: 0,
        backoff_base: 10,
        domain_delay: 0,
        delay_jitter: 0,
        circuit_threshold: 5,
        max_concurrent_checks: 8,
        ..Default::default()
    }
}

/// An HTML response
pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

/// Mounts an HTML page answering GET `route`
pub async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Base URL of `server` addressed as `localhost`
pub fn localhost_uri(server: &MockServer) -> String {
    format!("http://localhost:{}", server.address().port())
}

/// Runs a full sweep with the given configuration
pub async fn sweep(config: Config, seed: &str) -> Report {
    Coordinator::new(config, Arc::new(NoopObserver))
        .run(seed)
        .await
        .expect("sweep failed")
}

/// Counts requests the server received for `route` with `verb`
pub async fn request_count(server: &MockServer, verb: &str, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.to_string() == verb && r.url.path() == route)
        .count()
}
