use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Sweep
///
/// Every section and field has a default, so an empty file (or no file at
/// all) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub validator: ValidatorConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    /// Hosts whose links are never requested
    pub exclude: Vec<DomainEntry>,
}

/// Page discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent page fetches
    #[serde(rename = "max-concurrent-pages")]
    pub max_concurrent_pages: usize,

    /// Maximum number of pages to fetch before discovery stops
    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    /// Timeout for a single page fetch, redirects included (milliseconds)
    #[serde(rename = "page-timeout")]
    pub page_timeout: u64,

    /// Maximum redirect hops followed for any request
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Maximum HTML body size read per page (bytes)
    #[serde(rename = "max-page-bytes")]
    pub max_page_bytes: usize,

    /// Whether to obey robots.txt Disallow rules while crawling
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,

    /// Whether to fall back to sitemap.xml when the crawl finds nothing
    #[serde(rename = "sitemap-fallback")]
    pub sitemap_fallback: bool,
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages: 20,
            max_pages: 5000,
            page_timeout: 15_000,
            max_redirects: 10,
            max_page_bytes: 5 * 1024 * 1024,
            respect_robots: true,
            sitemap_fallback: true,
        }
    }
}

/// Link validation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Timeout for a single probe, redirects included (milliseconds)
    #[serde(rename = "probe-timeout")]
    pub probe_timeout: u64,

    /// Retries after a transport failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry (milliseconds)
    #[serde(rename = "backoff-base")]
    pub backoff_base: u64,

    /// Minimum time between two checks on the same host (milliseconds)
    #[serde(rename = "domain-delay")]
    pub domain_delay: u64,

    /// Upper bound of random jitter added to the domain delay (milliseconds)
    #[serde(rename = "delay-jitter")]
    pub delay_jitter: u64,

    /// Consecutive transport failures before a host's circuit opens
    #[serde(rename = "circuit-threshold")]
    pub circuit_threshold: u32,

    /// Global ceiling on checks in flight across all hosts
    #[serde(rename = "max-concurrent-checks")]
    pub max_concurrent_checks: usize,

    /// Bytes read from a fallback GET before the body is discarded
    #[serde(rename = "max-body-bytes")]
    pub max_body_bytes: usize,

    /// Whether image references are checked
    #[serde(rename = "check-images")]
    pub check_images: bool,
}

impl ValidatorConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base)
    }

    pub fn domain_delay(&self) -> Duration {
        Duration::from_millis(self.domain_delay)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: 5_000,
            max_retries: 2,
            backoff_base: 500,
            domain_delay: 500,
            delay_jitter: 100,
            circuit_threshold: 5,
            max_concurrent_checks: 64,
            max_body_bytes: 16 * 1024,
            check_images: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SumiSweep".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/sumi-sweep/sumi-sweep".to_string(),
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where to write the report; stdout summary only when unset
    #[serde(rename = "report-path")]
    pub report_path: Option<String>,

    /// Report document format
    pub format: ReportFormat,
}

/// Simple domain entry for the exclusion list
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,
}
