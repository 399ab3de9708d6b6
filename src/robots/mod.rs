//! Robots.txt handling module
//!
//! This module fetches and parses the robots.txt of the crawl origin. The
//! crawl obeys its `Disallow` rules, and the sitemap source reads its
//! `Sitemap:` lines.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::{FetchMode, Fetcher};
use std::time::Duration;
use url::Url;

/// Upper bound on the robots.txt body we are willing to read
const MAX_ROBOTS_BYTES: usize = 512 * 1024;

/// Fetches robots.txt for the origin of `origin`
///
/// A missing, unreachable or non-2xx robots.txt allows everything; this
/// never fails.
///
/// # Arguments
///
/// * `fetcher` - Shared fetcher; the request goes through its redirect handling
/// * `origin` - Any URL on the origin; only its scheme, host and port are used
/// * `timeout` - Upper bound on the whole fetch
///
/// # Returns
///
/// The parsed robots.txt, or an allow-all instance
pub async fn fetch_robots(fetcher: &Fetcher, origin: &Url, timeout: Duration) -> ParsedRobots {
    let Ok(robots_url) = origin.join("/robots.txt") else {
        return ParsedRobots::allow_all();
    };

    match fetcher
        .fetch(
            &robots_url,
            FetchMode::Document {
                max_bytes: MAX_ROBOTS_BYTES,
            },
            timeout,
        )
        .await
    {
        Ok(response) if response.is_success() => {
            tracing::debug!("Fetched {}", robots_url);
            response
                .body
                .map(|body| ParsedRobots::from_content(&body))
                .unwrap_or_else(ParsedRobots::allow_all)
        }
        Ok(response) => {
            tracing::debug!("No robots.txt at {} (HTTP {})", robots_url, response.status);
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::debug!("Failed to fetch {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Checks if a URL is allowed by robots.txt
pub fn is_allowed(robots: &ParsedRobots, url: &Url, user_agent: &str) -> bool {
    robots.is_allowed(url.as_str(), user_agent)
}
