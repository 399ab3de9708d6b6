use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_sweep::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether a URL lives on the crawl origin
///
/// Hostnames are compared exactly (case-insensitively). There is no
/// subdomain wildcarding: `blog.example.com` is not on `example.com`.
pub fn is_same_origin(url: &Url, origin_host: &str) -> bool {
    url.host_str()
        .map_or(false, |host| host.eq_ignore_ascii_case(origin_host))
}

/// Returns the root URL (`scheme://host[:port]/`) of a URL
pub fn origin_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}
