//! Per-host check lanes (DomainQueues)
//!
//! Each host gets one task that checks its URLs one at a time with a
//! politeness delay between requests. Lanes for different hosts run fully in
//! parallel; the only thing they share is the global check semaphore.

use crate::config::ValidatorConfig;
use crate::crawler::Fetcher;
use crate::state::{DnsStatus, DomainState};
use crate::validator::probe::check_url;
use crate::validator::types::{LinkOutcome, WarningReason};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use url::{Host, Url};

/// What a lane reports when its queue closes
#[derive(Debug, Clone)]
pub struct LaneSummary {
    pub host: String,

    /// URLs that went to the network
    pub checks: u32,

    /// HTTP requests sent, retries and GET fallbacks included
    pub requests: u32,

    pub dns_failed: bool,

    pub circuit_open: bool,
}

/// Shared pieces every lane needs
#[derive(Clone)]
pub(crate) struct LaneContext {
    pub fetcher: Fetcher,
    pub config: Arc<ValidatorConfig>,
    pub permits: Arc<Semaphore>,
    pub results: mpsc::UnboundedSender<(Url, LinkOutcome)>,
    pub cancel: CancellationToken,
}

/// Processes every URL sent to `jobs` for one host
///
/// Returns once the job channel is closed and drained, or at the next URL
/// boundary after cancellation.
pub(crate) async fn run_lane(
    host: String,
    mut jobs: mpsc::UnboundedReceiver<Url>,
    ctx: LaneContext,
) -> LaneSummary {
    let mut state = DomainState::new(host, ctx.config.circuit_threshold);
    let mut requests = 0;

    while let Some(url) = jobs.recv().await {
        if ctx.cancel.is_cancelled() {
            break;
        }

        if state.dns == DnsStatus::Unknown {
            state.dns = resolve_host(&url, ctx.config.probe_timeout()).await;
            if let DnsStatus::Failed(reason) = &state.dns {
                tracing::warn!("DNS resolution failed for {}: {}", state.host, reason);
            }
        }

        let outcome = if state.is_unreachable() {
            unreachable_outcome(&state)
        } else {
            if let Some(wait) = state.time_until_next_request(Instant::now()) {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = ctx.cancel.cancelled() => break,
                }
            }

            let result = {
                // The semaphore is never closed, so acquiring cannot fail
                let _permit = ctx.permits.acquire().await.ok();
                check_url(&ctx.fetcher, &url, &ctx.config).await
            };

            requests += result.requests;
            state.record_request(Instant::now(), politeness_delay(&ctx.config));

            if result.transport_failure {
                if state.breaker.record_transport_failure() {
                    tracing::warn!(
                        "Circuit opened for {} after {} consecutive failures; remaining URLs will not be probed",
                        state.host,
                        ctx.config.circuit_threshold
                    );
                }
            } else {
                state.breaker.record_response();
            }

            result.outcome
        };

        tracing::debug!("Checked {}: {}", url, outcome);

        if ctx.results.send((url, outcome)).is_err() {
            break;
        }
    }

    LaneSummary {
        dns_failed: matches!(state.dns, DnsStatus::Failed(_)),
        circuit_open: state.breaker.is_open(),
        checks: state.request_count,
        requests,
        host: state.host,
    }
}

/// Outcome for a URL on a host that will not be probed again
fn unreachable_outcome(state: &DomainState) -> LinkOutcome {
    match &state.dns {
        DnsStatus::Failed(reason) => LinkOutcome::broken(
            None,
            format!("DNS resolution failed for host: {} ({})", state.host, reason),
        ),
        _ => LinkOutcome::Warning {
            reason: WarningReason::CircuitOpen,
        },
    }
}

/// Looks the host of `url` up once, before any URL on it is probed
///
/// IP literals need no lookup. A lookup that does not finish within
/// `timeout` leaves the host unverified; probing goes ahead and each URL
/// decides for itself.
async fn resolve_host(url: &Url, timeout: Duration) -> DnsStatus {
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain,
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => return DnsStatus::Resolved,
        None => return DnsStatus::Failed("URL has no host".to_string()),
    };
    let port = url.port_or_known_default().unwrap_or(80);

    match tokio::time::timeout(timeout, tokio::net::lookup_host((host, port))).await {
        Ok(Ok(mut addrs)) => {
            if addrs.next().is_some() {
                DnsStatus::Resolved
            } else {
                DnsStatus::Failed("no addresses found".to_string())
            }
        }
        Ok(Err(e)) => DnsStatus::Failed(e.to_string()),
        Err(_) => {
            tracing::debug!("DNS lookup for {} timed out, probing anyway", host);
            DnsStatus::Unverified
        }
    }
}

/// Domain delay plus a random jitter
fn politeness_delay(config: &ValidatorConfig) -> Duration {
    let jitter = if config.delay_jitter > 0 {
        rand::thread_rng().gen_range(0..=config.delay_jitter)
    } else {
        0
    };
    config.domain_delay() + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_politeness_delay_within_bounds() {
        let config = ValidatorConfig {
            domain_delay: 500,
            delay_jitter: 100,
            ..Default::default()
        };

        for _ in 0..50 {
            let delay = politeness_delay(&config);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(600));
        }
    }

    #[test]
    fn test_politeness_delay_without_jitter() {
        let config = ValidatorConfig {
            domain_delay: 0,
            delay_jitter: 0,
            ..Default::default()
        };
        assert_eq!(politeness_delay(&config), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        let status = resolve_host(&url, Duration::from_secs(1)).await;
        assert_eq!(status, DnsStatus::Resolved);
    }

    #[tokio::test]
    async fn test_resolve_ipv6_literal_without_lookup() {
        // host_str() is "[::1]", which is not a resolvable name
        let url = Url::parse("http://[::1]:8080/page").unwrap();
        assert_eq!(url.host_str(), Some("[::1]"));

        let status = resolve_host(&url, Duration::from_secs(1)).await;
        assert_eq!(status, DnsStatus::Resolved);
    }

    #[tokio::test]
    async fn test_resolve_unknown_domain_fails() {
        let url = Url::parse("http://nonexistent.invalid/").unwrap();
        let status = resolve_host(&url, Duration::from_secs(5)).await;
        assert!(matches!(status, DnsStatus::Failed(_) | DnsStatus::Unverified));
    }
}
