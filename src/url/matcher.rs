use crate::config::DomainEntry;

/// Checks if a host matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches the bare domain and any
///    subdomain, however deeply nested
///
/// Matching ignores ASCII case.
///
/// # Examples
///
/// ```
/// use sumi_sweep::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "Example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => candidate == base || candidate.ends_with(&format!(".{}", base)),
        None => candidate == pattern,
    }
}

/// Returns true if the host is covered by any exclusion entry
pub fn is_excluded(host: &str, exclusions: &[DomainEntry]) -> bool {
    exclusions
        .iter()
        .any(|entry| matches_wildcard(&entry.domain, host))
}
