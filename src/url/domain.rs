use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use reconmap::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the origin of a URL as `scheme://host[:port]`
///
/// This is the unit robots.txt applies to: two URLs share a robots.txt iff
/// they share an origin.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use reconmap::url::origin_key;
///
/// let url = Url::parse("http://example.com:8080/a/b?c=d").unwrap();
/// assert_eq!(origin_key(&url), "http://example.com:8080");
/// ```
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}
