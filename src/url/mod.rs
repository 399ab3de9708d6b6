//! URL handling module for Sumi-Sweep
//!
//! This module provides URL canonicalization, same-origin classification,
//! relative reference resolution, and wildcard matching for exclusions.

mod domain;
mod matcher;
mod normalize;

use ::url::Url;

use crate::config::DomainEntry;

// Re-export main functions
pub use domain::{extract_domain, is_same_origin, origin_root};
pub use matcher::{is_excluded, matches_wildcard};
pub use normalize::{canonicalize, is_trivial_redirect, normalize_url};

/// Where a reference points relative to the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkScope {
    /// Same host as the crawl origin
    Internal,
    /// Any other host
    External,
    /// Host covered by an exclusion pattern - never requested
    Excluded,
}

/// Resolves an href against the page it was found on
///
/// Returns `None` for anything that cannot be parsed. That is not an error,
/// just an unusable reference.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_sweep::url::to_absolute;
///
/// let base = Url::parse("https://example.com/docs/intro").unwrap();
/// let resolved = to_absolute("../about", &base).unwrap();
/// assert_eq!(resolved.as_str(), "https://example.com/about");
/// assert!(to_absolute("http://[::1", &base).is_none());
/// ```
pub fn to_absolute(href: &str, base: &Url) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Classifies a canonical URL against the origin and the exclusion list
///
/// Exclusions win over the origin, so a site can exclude parts of itself.
pub fn classify_link(url: &Url, origin_host: &str, exclusions: &[DomainEntry]) -> LinkScope {
    let Some(host) = url.host_str() else {
        return LinkScope::Excluded;
    };

    if is_excluded(host, exclusions) {
        LinkScope::Excluded
    } else if is_same_origin(url, origin_host) {
        LinkScope::Internal
    } else {
        LinkScope::External
    }
}
