//! Records produced by page discovery

use serde::Serialize;
use std::fmt;
use url::Url;

/// What kind of markup a reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// `<a href>`
    Link,
    /// `<img src>`
    Image,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => write!(f, "link"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// A single link or image pointer found in a page's markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Absolute target, not yet canonicalized
    pub target: Url,

    /// Anchor text, or `alt` text for images
    pub text: String,

    pub kind: ReferenceKind,
}

impl Reference {
    pub fn link(target: Url, text: impl Into<String>) -> Self {
        Self {
            target,
            text: text.into(),
            kind: ReferenceKind::Link,
        }
    }

    pub fn image(target: Url, text: impl Into<String>) -> Self {
        Self {
            target,
            text: text.into(),
            kind: ReferenceKind::Image,
        }
    }
}

/// The settled result of fetching one page
///
/// Created once per canonical URL, whether the fetch succeeded or not.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    /// Canonical URL that was claimed
    pub url: Url,

    /// Where the fetch ended up after redirects
    pub final_url: Url,

    /// HTTP status of the final response, if one arrived
    pub status: Option<u16>,

    pub content_type: Option<String>,

    pub title: Option<String>,

    /// Outbound references; empty when the fetch failed
    pub references: Vec<Reference>,

    /// Why the page could not be used
    pub error: Option<String>,
}

impl PageRecord {
    /// Creates a record for a page that could not be fetched
    pub fn failed(url: Url, status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status,
            content_type: None,
            title: None,
            references: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns true if the fetch ended on a different URL than requested
    pub fn was_redirected(&self) -> bool {
        crate::url::canonicalize(&self.final_url) != self.url
    }

    /// Drops the references of a page that redirected off the origin
    ///
    /// The landing page belongs to another site, so its links are not this
    /// site's links. Status and final URL are kept.
    ///
    /// # Returns
    ///
    /// True if references were dropped
    pub fn strip_offsite_references(&mut self, origin_host: &str) -> bool {
        if crate::url::is_same_origin(&self.final_url, origin_host) {
            return false;
        }
        let dropped = !self.references.is_empty();
        self.references.clear();
        dropped
    }
}
