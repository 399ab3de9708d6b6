//! Verdict types produced by the link validator

use crate::crawler::ReferenceKind;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Why a reference is reported as a warning rather than broken
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningReason {
    /// 401 or 403; usually bot blocking, not a dead link
    AccessDenied { status: u16 },

    /// The host stopped answering and was no longer probed
    CircuitOpen,
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied { status } => write!(f, "access denied (HTTP {})", status),
            Self::CircuitOpen => write!(f, "unable to verify: host rate limited or unresponsive"),
        }
    }
}

/// Liveness result for one canonical target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    Ok,

    /// Reachable, but the final URL differs by more than trivial normalization
    Redirect { final_url: Url },

    Broken {
        /// HTTP status, when the failure was an HTTP answer
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        reason: String,
    },

    Warning { reason: WarningReason },
}

impl LinkOutcome {
    pub fn broken(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Broken {
            status,
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken { .. })
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning { .. })
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    /// Short label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Redirect { .. } => "redirect",
            Self::Broken { .. } => "broken",
            Self::Warning { .. } => "warning",
        }
    }
}

impl fmt::Display for LinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Redirect { final_url } => write!(f, "redirects to {}", final_url),
            Self::Broken {
                status: Some(status),
                reason,
            } => write!(f, "broken (HTTP {}): {}", status, reason),
            Self::Broken { status: None, reason } => write!(f, "broken: {}", reason),
            Self::Warning { reason } => write!(f, "warning: {}", reason),
        }
    }
}

/// One place a target was referenced from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Occurrence {
    /// Canonical URL of the referencing page
    pub page_url: Url,

    /// Anchor or alt text
    pub text: String,

    pub kind: ReferenceKind,
}

/// Deduplicated verdict for one canonical target URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkVerdict {
    /// Canonical target
    pub url: Url,

    pub outcome: LinkOutcome,

    /// Every page that references the target
    pub occurrences: Vec<Occurrence>,
}

impl LinkVerdict {
    pub fn new(url: Url, outcome: LinkOutcome) -> Self {
        Self {
            url,
            outcome,
            occurrences: Vec::new(),
        }
    }
}
