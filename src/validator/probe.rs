//! Per-URL check protocol
//!
//! A check starts with a HEAD probe. Servers that reject HEAD (404/405) or
//! drop the connection get one capped GET instead, and GET is used for every
//! later attempt. Transport failures are retried with exponential backoff.

use crate::config::ValidatorConfig;
use crate::crawler::{FetchMode, Fetcher};
use crate::url::is_trivial_redirect;
use crate::validator::types::{LinkOutcome, WarningReason};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

/// Result of checking one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub outcome: LinkOutcome,

    /// True if the check ended without any HTTP answer
    pub transport_failure: bool,

    /// Number of HTTP requests sent
    pub requests: u32,
}

/// Maps an HTTP status to an outcome
///
/// - 1xx to 3xx: ok, or redirect when the final URL differs non-trivially
/// - 401, 403: access-denied warning
/// - other 4xx and 5xx: broken, status retained
pub fn classify_status(status: u16, requested: &Url, final_url: &Url) -> LinkOutcome {
    match status {
        100..=399 => {
            if is_trivial_redirect(requested, final_url) {
                LinkOutcome::Ok
            } else {
                LinkOutcome::Redirect {
                    final_url: final_url.clone(),
                }
            }
        }
        401 | 403 => LinkOutcome::Warning {
            reason: WarningReason::AccessDenied { status },
        },
        _ => LinkOutcome::broken(Some(status), status_reason(status)),
    }
}

fn status_reason(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unexpected status")
        .to_string()
}

/// Delay before retry number `attempt` (zero-based)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

/// Checks whether `url` is alive
///
/// # Check Flow
///
/// 1. HEAD with the probe timeout
/// 2. On 404/405 or a transport failure, switch to a capped GET (body
///    discarded) without using up a retry
/// 3. On further transport failures, retry the GET after
///    `backoff_base * 2^n`, up to `max_retries` times
/// 4. Redirect loops and excessive redirects are broken immediately
pub async fn check_url(fetcher: &Fetcher, url: &Url, config: &ValidatorConfig) -> CheckResult {
    let timeout = config.probe_timeout();
    let get_mode = FetchMode::Body {
        max_bytes: config.max_body_bytes,
    };

    let mut use_get = false;
    let mut retries = 0;
    let mut requests = 0;

    loop {
        let mode = if use_get { get_mode } else { FetchMode::Probe };
        requests += 1;

        match fetcher.fetch(url, mode, timeout).await {
            Ok(response) => {
                if !use_get && matches!(response.status, 404 | 405) {
                    tracing::debug!("HEAD {} returned {}, retrying with GET", url, response.status);
                    use_get = true;
                    continue;
                }

                return CheckResult {
                    outcome: classify_status(response.status, url, &response.final_url),
                    transport_failure: false,
                    requests,
                };
            }
            Err(e) if e.is_transport() => {
                if !use_get {
                    tracing::debug!("HEAD {} failed ({}), retrying with GET", url, e);
                    use_get = true;
                    continue;
                }

                if retries >= config.max_retries {
                    return CheckResult {
                        outcome: LinkOutcome::broken(None, e.to_string()),
                        transport_failure: true,
                        requests,
                    };
                }

                let delay = backoff_delay(config.backoff_base(), retries);
                retries += 1;
                tracing::debug!(
                    "GET {} failed ({}), retry {}/{} in {:?}",
                    url,
                    e,
                    retries,
                    config.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return CheckResult {
                    outcome: LinkOutcome::broken(None, e.to_string()),
                    transport_failure: false,
                    requests,
                };
            }
        }
    }
}
