//! Sitemap page source
//!
//! Reads `sitemap.xml` (and the sitemaps robots.txt lists) to find pages a
//! link crawl could not reach, for example on sites whose navigation is
//! rendered by JavaScript. Sitemap indexes are followed one level deep.

use crate::config::{CrawlerConfig, DomainEntry};
use crate::crawler::fetcher::{FetchMode, Fetcher};
use crate::crawler::scheduler::{fetch_page, settle_fetch};
use crate::crawler::source::{CrawlOutcome, DiscoveryContext};
use crate::robots::{fetch_robots, is_allowed, ParsedRobots};
use crate::url::{canonicalize, classify_link, extract_domain, origin_root, LinkScope};
use crate::{Result, UrlError};
use futures::stream::{self, StreamExt};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use std::collections::HashSet;
use url::Url;

/// Maximum number of sitemap documents read at the top level
const MAX_SITEMAP_SOURCES: usize = 8;

/// Upper bound on one sitemap document
const MAX_SITEMAP_BYTES: usize = 10 * 1024 * 1024;

/// Reads a site's sitemaps and fetches the pages they list
#[derive(Debug, Clone)]
pub struct SitemapReader {
    fetcher: Fetcher,
    config: CrawlerConfig,
    exclusions: Vec<DomainEntry>,
    robots_agent: String,
}

impl SitemapReader {
    pub fn new(
        fetcher: Fetcher,
        config: CrawlerConfig,
        exclusions: Vec<DomainEntry>,
        robots_agent: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            config,
            exclusions,
            robots_agent: robots_agent.into(),
        }
    }

    /// Fetches every same-origin page listed in the sitemaps of `origin`
    ///
    /// Pages in `ctx.already_visited` are skipped; the total never exceeds
    /// the page cap.
    pub async fn run(&self, origin: &Url, ctx: DiscoveryContext) -> Result<CrawlOutcome> {
        let origin = origin_root(origin);
        let origin_host = extract_domain(&origin).ok_or(UrlError::MissingDomain)?;

        let robots = fetch_robots(&self.fetcher, &origin, self.config.page_timeout()).await;

        let mut visited = ctx.already_visited.clone();
        let room = self.config.max_pages.saturating_sub(visited.len());

        let mut targets = Vec::new();
        for loc in self.collect_locations(&origin, &robots).await {
            if targets.len() >= room {
                break;
            }

            let Ok(url) = Url::parse(&loc) else {
                continue;
            };
            if url.scheme() != "http" && url.scheme() != "https" {
                continue;
            }

            let url = canonicalize(&url);
            if classify_link(&url, &origin_host, &self.exclusions) != LinkScope::Internal {
                continue;
            }
            if self.config.respect_robots && !is_allowed(&robots, &url, &self.robots_agent) {
                continue;
            }
            if visited.insert(url.clone()) {
                targets.push(url);
            }
        }

        tracing::info!("Sitemap lists {} new pages for {}", targets.len(), origin_host);

        let limit = self.config.max_concurrent_pages.max(1);
        let mut pages = stream::iter(targets)
            .map(|url| {
                let cancel = ctx.cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let fetch = fetch_page(&self.fetcher, &url, &self.config);
                    Some(settle_fetch(url.clone(), fetch).await)
                }
            })
            .buffer_unordered(limit);

        let mut pages_fetched = 0;
        let mut references_found = 0;

        while let Some(record) = pages.next().await {
            let Some(mut record) = record else {
                continue;
            };

            pages_fetched += 1;
            if record.was_redirected() {
                visited.insert(canonicalize(&record.final_url));
            }
            if record.strip_offsite_references(&origin_host) {
                tracing::debug!(
                    "{} redirected off-site to {}, ignoring its links",
                    record.url,
                    record.final_url
                );
            }
            references_found += record.references.len();

            ctx.observer.on_crawl_progress(visited.len(), pages_fetched);
            if !ctx.emit(record).await {
                break;
            }
        }

        Ok(CrawlOutcome {
            origin,
            origin_host,
            visited,
            pages_fetched,
            references_found,
            cancelled: ctx.cancel.is_cancelled(),
        })
    }

    /// Gathers `<loc>` values from robots.txt sitemaps and `/sitemap.xml`
    async fn collect_locations(&self, origin: &Url, robots: &ParsedRobots) -> Vec<String> {
        let mut sources = Vec::new();
        if let Ok(default) = origin.join("/sitemap.xml") {
            sources.push(default.to_string());
        }

        for sitemap in robots.sitemaps() {
            if !sources.contains(&sitemap) {
                sources.push(sitemap);
            }
        }

        let mut seen = HashSet::new();
        let mut locations = Vec::new();

        for source in sources.into_iter().take(MAX_SITEMAP_SOURCES) {
            let Some(document) = self.fetch_document(&source).await else {
                continue;
            };

            if is_sitemap_index(&document) {
                for child in extract_loc_values(&document) {
                    // One level only: a nested index contributes nothing
                    let Some(nested) = self.fetch_document(&child).await else {
                        continue;
                    };
                    if is_sitemap_index(&nested) {
                        tracing::debug!("Ignoring nested sitemap index {}", child);
                        continue;
                    }
                    extend_unique(&mut locations, &mut seen, extract_loc_values(&nested));
                }
            } else {
                extend_unique(&mut locations, &mut seen, extract_loc_values(&document));
            }
        }

        locations
    }

    async fn fetch_document(&self, location: &str) -> Option<String> {
        let url = Url::parse(location).ok()?;
        let mode = FetchMode::Document {
            max_bytes: MAX_SITEMAP_BYTES,
        };

        match self.fetcher.fetch(&url, mode, self.config.page_timeout()).await {
            Ok(response) if response.is_success() => response.body,
            Ok(response) => {
                tracing::debug!("Sitemap {} returned HTTP {}", url, response.status);
                None
            }
            Err(e) => {
                tracing::debug!("Failed to fetch sitemap {}: {}", url, e);
                None
            }
        }
    }
}

fn extend_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, values: Vec<String>) {
    for value in values {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
}

/// Returns true if the root element is `<sitemapindex>`
fn is_sitemap_index(xml: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) | Ok(XmlEvent::Empty(e)) => {
                return e.local_name().as_ref() == b"sitemapindex";
            }
            Ok(XmlEvent::Eof) | Err(_) => return false,
            _ => {}
        }
    }
}

/// Extracts the text of every `<loc>` element
///
/// Namespace prefixes are ignored, so `<sm:loc>` counts. Text is unescaped
/// and CDATA sections are taken as-is. Parsing stops at the first XML
/// error, keeping the values read so far.
pub fn extract_loc_values(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut out = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) if e.local_name().as_ref() == b"loc" => {
                current = Some(String::new());
            }
            Ok(XmlEvent::Text(t)) => {
                if let Some(value) = current.as_mut() {
                    match t.unescape() {
                        Ok(text) => value.push_str(&text),
                        Err(e) => {
                            tracing::debug!("Bad entity in sitemap <loc>: {}", e);
                            current = None;
                        }
                    }
                }
            }
            Ok(XmlEvent::CData(c)) => {
                if let Some(value) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(XmlEvent::End(e)) if e.local_name().as_ref() == b"loc" => {
                if let Some(value) = current.take() {
                    let value = value.trim();
                    if !value.is_empty() {
                        out.push(value.to_string());
                    }
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                tracing::debug!("Stopped reading sitemap at position {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => {}
        }
    }

    out
}
