//! Integration tests for the link validator
//!
//! These drive a [`LinkValidator`] directly against mock servers.

use crate::{fast_validator_config, localhost_uri, request_count};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use sumi_sweep::config::{UserAgentConfig, ValidatorConfig};
use sumi_sweep::crawler::{build_http_client, Fetcher, Reference};
use sumi_sweep::validator::{LinkValidator, ValidationStats};
use sumi_sweep::{LinkOutcome, NoopObserver, WarningReason};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Checks every URL and returns the outcomes by URL plus the final counters
async fn check_all(
    config: ValidatorConfig,
    targets: &[String],
) -> (HashMap<Url, LinkOutcome>, ValidationStats) {
    let client = build_http_client(&UserAgentConfig::default(), 8).unwrap();
    let (handle, mut verdicts, stats) = LinkValidator::new(
        Fetcher::new(client, 5),
        config,
        vec![],
        Arc::new(NoopObserver),
    )
    .spawn();

    let page = url("https://example.com/");
    for target in targets {
        handle.submit(&Reference::link(url(target), "link"), &page);
    }
    handle.finish();

    let mut outcomes = HashMap::new();
    while let Some(verdict) = verdicts.recv().await {
        assert_eq!(verdict.occurrences.len(), 1);
        outcomes.insert(verdict.url, verdict.outcome);
    }

    (outcomes, stats.await.unwrap())
}

#[tokio::test]
async fn test_head_405_falls_back_to_get() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/nohead"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nohead"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let target = format!("{}/nohead", localhost_uri(&server));
    let (outcomes, stats) = check_all(fast_validator_config(), &[target.clone()]).await;

    assert_eq!(outcomes[&url(&target)], LinkOutcome::Ok);
    assert_eq!(stats.requests, 2);
}

#[tokio::test]
async fn test_duplicate_targets_checked_once() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let base = localhost_uri(&server);
    let client = build_http_client(&UserAgentConfig::default(), 8).unwrap();
    let (handle, mut verdicts, stats) = LinkValidator::new(
        Fetcher::new(client, 5),
        fast_validator_config(),
        vec![],
        Arc::new(NoopObserver),
    )
    .spawn();

    let first = url("https://example.com/one");
    let second = url("https://example.com/two");
    handle.submit(&Reference::link(url(&format!("{}/page", base)), "A"), &first);
    handle.submit(&Reference::link(url(&format!("{}/page#top", base)), "B"), &first);
    handle.submit(&Reference::link(url(&format!("{}/page/", base)), "A"), &second);
    handle.finish();

    let verdict = verdicts.recv().await.unwrap();
    assert!(verdicts.recv().await.is_none());
    assert_eq!(verdict.outcome, LinkOutcome::Ok);
    assert_eq!(verdict.occurrences.len(), 3);

    let stats = stats.await.unwrap();
    assert_eq!(stats.targets, 1);
    assert_eq!(stats.dispatched, 1);
}

#[tokio::test]
async fn test_redirects_are_reported() {
    let server = MockServer::start().await;
    let base = localhost_uri(&server);

    Mock::given(path("/moved"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/target"))
        .mount(&server)
        .await;
    Mock::given(path("/slash"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/slash/"))
        .mount(&server)
        .await;
    Mock::given(path("/target"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(path("/slash/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let moved = format!("{}/moved", base);
    let slash = format!("{}/slash", base);
    let (outcomes, _) = check_all(fast_validator_config(), &[moved.clone(), slash.clone()]).await;

    assert_eq!(
        outcomes[&url(&moved)],
        LinkOutcome::Redirect {
            final_url: url(&format!("{}/target", base)),
        }
    );
    // Trailing-slash redirects are cosmetic
    assert_eq!(outcomes[&url(&slash)], LinkOutcome::Ok);
}

#[tokio::test]
async fn test_redirect_loop_is_broken_without_retry() {
    let server = MockServer::start().await;
    let base = localhost_uri(&server);

    Mock::given(path("/loop-a"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop-b"))
        .mount(&server)
        .await;
    Mock::given(path("/loop-b"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop-a"))
        .mount(&server)
        .await;

    let target = format!("{}/loop-a", base);
    let config = ValidatorConfig {
        max_retries: 3,
        ..fast_validator_config()
    };
    let (outcomes, stats) = check_all(config, &[target.clone()]).await;

    assert!(outcomes[&url(&target)].is_broken());
    assert_eq!(stats.requests, 1);
    assert_eq!(request_count(&server, "GET", "/loop-a").await, 0);
}

#[tokio::test]
async fn test_timeouts_retry_with_backoff() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let target = format!("{}/slow", localhost_uri(&server));
    let config = ValidatorConfig {
        probe_timeout: 200,
        max_retries: 1,
        backoff_base: 10,
        ..fast_validator_config()
    };
    let (outcomes, stats) = check_all(config, &[target.clone()]).await;

    // HEAD, the GET fallback, then one retry
    assert_eq!(stats.requests, 3);
    assert_eq!(
        outcomes[&url(&target)],
        LinkOutcome::broken(None, "Request timed out")
    );
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_failures() {
    // Reserve a port, then free it so connections are refused
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let targets: Vec<String> = (0..5)
        .map(|i| format!("http://localhost:{}/page{}", port, i))
        .collect();
    let config = ValidatorConfig {
        circuit_threshold: 2,
        ..fast_validator_config()
    };
    let (outcomes, stats) = check_all(config, &targets).await;

    let broken = outcomes.values().filter(|o| o.is_broken()).count();

    assert_eq!(broken, 2);
    assert_eq!(circuit_open_count(&outcomes), 3);
    // HEAD and GET for each of the two URLs that went to the network
    assert_eq!(stats.requests, 4);
    assert_eq!(stats.open_circuits, vec!["localhost".to_string()]);
}

fn circuit_open_count(outcomes: &HashMap<Url, LinkOutcome>) -> usize {
    outcomes
        .values()
        .filter(|o| {
            **o == LinkOutcome::Warning {
                reason: WarningReason::CircuitOpen,
            }
        })
        .count()
}

#[tokio::test]
async fn test_five_timeouts_open_circuit_at_default_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let base = localhost_uri(&server);
    let targets: Vec<String> = (0..8).map(|i| format!("{}/slow{}", base, i)).collect();
    let config = ValidatorConfig {
        probe_timeout: 200,
        max_retries: 0,
        ..fast_validator_config()
    };
    assert_eq!(config.circuit_threshold, ValidatorConfig::default().circuit_threshold);
    assert_eq!(config.circuit_threshold, 5);

    let (outcomes, stats) = check_all(config, &targets).await;

    let timed_out = outcomes
        .values()
        .filter(|o| **o == LinkOutcome::broken(None, "Request timed out"))
        .count();
    assert_eq!(timed_out, 5);
    assert_eq!(circuit_open_count(&outcomes), 3);

    // HEAD and the GET fallback for each of the five timed-out URLs, nothing after
    assert_eq!(stats.requests, 10);
    assert_eq!(stats.open_circuits, vec!["localhost".to_string()]);

    for (target, outcome) in &outcomes {
        if outcome.is_warning() {
            assert_eq!(request_count(&server, "HEAD", target.path()).await, 0);
            assert_eq!(request_count(&server, "GET", target.path()).await, 0);
        }
    }
}

#[tokio::test]
async fn test_unresolvable_host_is_broken() {
    let targets: Vec<String> = (0..3)
        .map(|i| format!("http://nonexistent.invalid/page{}", i))
        .collect();
    let timeout_ms = 3_000;
    let config = ValidatorConfig {
        probe_timeout: timeout_ms,
        ..fast_validator_config()
    };

    let started = std::time::Instant::now();
    let (outcomes, stats) = check_all(config, &targets).await;

    // One lookup for the host, not one timeout per URL
    assert!(started.elapsed() < Duration::from_millis(timeout_ms * targets.len() as u64));

    assert_eq!(outcomes.len(), 3);
    for target in &targets {
        match &outcomes[&url(target)] {
            LinkOutcome::Broken { status, reason } => {
                assert_eq!(*status, None);
                assert!(reason.contains("DNS"), "reason: {}", reason);
                assert!(reason.contains("nonexistent.invalid"), "reason: {}", reason);
            }
            other => panic!("expected broken, got {:?}", other),
        }
    }

    assert_eq!(stats.requests, 0);
    assert_eq!(stats.dns_failed_hosts, vec!["nonexistent.invalid".to_string()]);
}

/// Starts a server on `ip` that answers one request per connection and then
/// drops the connection without announcing it, so pooled keep-alive
/// connections go stale under the client
async fn spawn_one_shot_server(ip: &str) -> (std::net::SocketAddr, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind((ip, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                    .await;
            });
        }
    });

    (addr, served)
}

#[tokio::test]
async fn test_high_fan_out_survives_stale_connections() {
    // Linux routes all of 127.0.0.0/8 to loopback, giving one lane per address
    let mut servers = Vec::new();
    for i in 1..=16 {
        servers.push(spawn_one_shot_server(&format!("127.0.0.{}", i)).await);
    }

    let targets: Vec<String> = servers
        .iter()
        .flat_map(|(addr, _)| (0..15).map(move |p| format!("http://{}/page{}", addr, p)))
        .collect();
    let config = ValidatorConfig {
        max_retries: 2,
        max_concurrent_checks: 64,
        ..fast_validator_config()
    };
    let (outcomes, stats) = check_all(config, &targets).await;

    assert_eq!(outcomes.len(), 240);
    let not_ok: Vec<_> = outcomes.iter().filter(|(_, o)| !o.is_ok()).collect();
    assert!(not_ok.is_empty(), "not ok: {:?}", not_ok);

    assert_eq!(stats.hosts, 16);
    assert!(stats.open_circuits.is_empty());
    assert!(stats.requests >= 240);

    let served: usize = servers.iter().map(|(_, c)| c.load(Ordering::SeqCst)).sum();
    assert!(served >= 240);
}

#[tokio::test]
async fn test_hosts_checked_in_parallel() {
    let slow = MockServer::start().await;
    let fast = MockServer::start().await;

    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&slow)
        .await;
    Mock::given(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&fast)
        .await;

    // Same host for both servers would serialize; use two host names
    let targets = vec![
        format!("{}/slow", localhost_uri(&slow)),
        format!("{}/fast", fast.uri()),
    ];
    let started = std::time::Instant::now();
    let (outcomes, stats) = check_all(fast_validator_config(), &targets).await;

    assert!(outcomes.values().all(|o| o.is_ok()));
    assert_eq!(stats.hosts, 2);
    assert!(started.elapsed() < Duration::from_millis(1_500));
}
