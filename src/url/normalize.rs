use crate::UrlError;
use url::Url;

/// Normalizes a URL string into its canonical form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an HTTP or HTTPS scheme and a host
/// 3. Remove the fragment (everything after #)
/// 4. Remove trailing slashes from the path (except for root /)
///
/// Query strings, scheme and host are left as the server sees them. Two URLs
/// with the same canonical form are treated as the same page.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Canonical URL
/// * `Err(UrlError)` - Failed to parse or the URL is not crawlable
///
/// # Examples
///
/// ```
/// use sumi_sweep::url::normalize_url;
///
/// let url = normalize_url("http://example.com/docs/#intro").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(canonicalize(&url))
}

/// Canonicalizes an already-parsed URL
///
/// Same rules as [`normalize_url`] without the scheme checks, so it never
/// fails. Applying it twice yields the same URL.
pub fn canonicalize(url: &Url) -> Url {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    let path = canonical.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        canonical.set_path(&trimmed);
    }

    canonical
}

/// Returns true if a redirect from `requested` to `landed` is cosmetic
///
/// A redirect is trivial when the two URLs only differ by scheme, a leading
/// `www.` on the host, trailing slashes, or the fragment. Port, path and
/// query must match.
pub fn is_trivial_redirect(requested: &Url, landed: &Url) -> bool {
    fn strip(url: &Url) -> (String, Option<u16>, String, Option<String>) {
        let canonical = canonicalize(url);
        let host = canonical
            .host_str()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        (
            host,
            canonical.port(),
            canonical.path().to_string(),
            canonical.query().map(str::to_string),
        )
    }

    strip(requested) == strip(landed)
}
