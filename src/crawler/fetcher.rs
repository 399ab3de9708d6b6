//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for crawling and link checking, including:
//! - Building one pooled HTTP client sized to the concurrency ceilings
//! - HEAD probes and capped GET requests
//! - Manual redirect handling with loop detection
//! - Error classification into transport and definitive failures

use crate::config::UserAgentConfig;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Response};
use std::collections::HashSet;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching a URL
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("Redirect loop detected at {0}")]
    RedirectLoop(String),

    #[error("Invalid redirect target: {0}")]
    InvalidRedirect(String),

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Returns true for failures where no HTTP answer was received
    ///
    /// Transport failures are retried and count towards a host's circuit
    /// breaker. Redirect errors are definitive.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Dns(_) | Self::Connect(_) | Self::Body(_) | Self::Request(_)
        )
    }

    /// Classifies a reqwest error
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        let detail = error_chain(&error);

        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            if looks_like_dns_failure(&detail) {
                Self::Dns(detail)
            } else {
                Self::Connect(detail)
            }
        } else if error.is_body() || error.is_decode() {
            Self::Body(detail)
        } else {
            Self::Request(detail)
        }
    }
}

/// Flattens an error and its sources into one line
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

fn looks_like_dns_failure(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
        || lower.contains("nodename nor servname")
}

/// How much of the response a caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// HEAD request, no body
    Probe,

    /// GET request; up to `max_bytes` are read and discarded
    Body { max_bytes: usize },

    /// GET request; the body is returned only for successful HTML responses
    Page { max_bytes: usize },

    /// GET request; the body is returned for any successful response
    Document { max_bytes: usize },
}

/// Result of a fetch that received an HTTP answer
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL of the final response after redirects
    pub final_url: Url,

    /// HTTP status of the final response
    pub status: u16,

    pub content_type: Option<String>,

    /// Decoded body, depending on the fetch mode
    pub body: Option<String>,

    /// Number of redirect hops followed
    pub redirects: usize,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are handled manually so every hop stays inside the caller's
/// timeout and loops can be reported. The idle pool is sized to the larger
/// concurrency ceiling and idle connections expire quickly so a burst of
/// fan-out does not reuse connections the server already closed.
///
/// # Example
///
/// ```no_run
/// use sumi_sweep::config::UserAgentConfig;
/// use sumi_sweep::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), 64).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    pool_size: usize,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .pool_max_idle_per_host(pool_size.max(1))
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Shared HTTP capability used by the crawler and the validator
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_redirects: usize,
}

impl Fetcher {
    pub fn new(client: Client, max_redirects: usize) -> Self {
        Self {
            client,
            max_redirects,
        }
    }

    /// Fetches a URL, following redirects, within `timeout`
    ///
    /// # Request Flow
    ///
    /// 1. Send HEAD (probe mode) or GET (every other mode)
    /// 2. On 3xx with a Location header, follow it with the same method
    ///    - A URL seen twice in the chain is a loop
    ///    - More than `max_redirects` hops is an error
    /// 3. Read the body as the mode asks, capped at its byte limit
    ///
    /// The timeout covers the whole chain and the body read.
    pub async fn fetch(
        &self,
        url: &Url,
        mode: FetchMode,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        match tokio::time::timeout(timeout, self.fetch_chain(url, mode)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn fetch_chain(&self, url: &Url, mode: FetchMode) -> Result<FetchResponse, FetchError> {
        let mut current = url.clone();
        let mut seen = HashSet::new();
        seen.insert(without_fragment(&current));
        let mut hops = 0;

        loop {
            let request = match mode {
                FetchMode::Probe => self.client.head(current.clone()),
                _ => self.client.get(current.clone()),
            };

            let response = request.send().await.map_err(FetchError::from_reqwest)?;

            if response.status().is_redirection() {
                if let Some(next) = redirect_target(&response, &current)? {
                    hops += 1;
                    if hops > self.max_redirects {
                        return Err(FetchError::TooManyRedirects(self.max_redirects));
                    }
                    if !seen.insert(without_fragment(&next)) {
                        return Err(FetchError::RedirectLoop(next.to_string()));
                    }

                    tracing::trace!("Redirect {} -> {}", current, next);
                    current = next;
                    continue;
                }
            }

            return read_response(response, current, hops, mode).await;
        }
    }
}

fn without_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Resolves the Location header of a redirect response
///
/// Returns `Ok(None)` when there is no Location header, in which case the
/// 3xx response itself is final.
fn redirect_target(response: &Response, current: &Url) -> Result<Option<Url>, FetchError> {
    let Some(location) = response.headers().get(LOCATION) else {
        return Ok(None);
    };

    let location = location
        .to_str()
        .map_err(|_| FetchError::InvalidRedirect(format!("{:?}", location)))?;

    let next = current
        .join(location)
        .map_err(|e| FetchError::InvalidRedirect(format!("{}: {}", location, e)))?;

    if next.scheme() != "http" && next.scheme() != "https" {
        return Err(FetchError::InvalidRedirect(next.to_string()));
    }

    Ok(Some(next))
}

async fn read_response(
    response: Response,
    final_url: Url,
    redirects: usize,
    mode: FetchMode,
) -> Result<FetchResponse, FetchError> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let success = (200..300).contains(&status);

    let body = match mode {
        FetchMode::Probe => None,
        FetchMode::Body { max_bytes } => {
            // The status is the answer; a failed drain does not change it
            if let Err(e) = read_capped(response, max_bytes).await {
                tracing::trace!("Discarded body read for {} failed: {}", final_url, e);
            }
            None
        }
        FetchMode::Page { max_bytes } => {
            let html = content_type.as_deref().map_or(false, is_html_content_type);
            if success && html {
                Some(decode(read_capped(response, max_bytes).await?))
            } else {
                None
            }
        }
        FetchMode::Document { max_bytes } => {
            if success {
                Some(decode(read_capped(response, max_bytes).await?))
            } else {
                None
            }
        }
    };

    Ok(FetchResponse {
        final_url,
        status,
        content_type,
        body,
        redirects,
    })
}

/// Reads at most `max_bytes` of a response body
async fn read_capped(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
    let mut buf = Vec::new();

    while let Some(chunk) = response.chunk().await.map_err(FetchError::from_reqwest)? {
        let room = max_bytes.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buf.len() >= max_bytes {
            break;
        }
    }

    Ok(buf)
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
