use url::Url;

/// Schemes that never lead to a crawlable document
const NON_NAVIGABLE_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Resolves an href found on a page against the page's URL
///
/// Returns `None` for empty hrefs, fragment-only hrefs (`#...`), non-navigable
/// schemes, and anything that does not resolve to an absolute http(s) URL with
/// a host. Relative, protocol-relative and parent-path references are resolved
/// per RFC 3986.
///
/// The result is absolute but not yet normalized; pass it through
/// [`normalize`](crate::url::normalize) before storing it.
///
/// # Examples
///
/// ```
/// use reconmap::url::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("http://a.com/b/c/").unwrap();
/// assert_eq!(resolve_url(&base, "../x").unwrap().as_str(), "http://a.com/b/x");
/// assert!(resolve_url(&base, "#top").is_none());
/// assert!(resolve_url(&base, "mailto:me@a.com").is_none());
/// ```
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if NON_NAVIGABLE_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") || resolved.host_str().is_none() {
        return None;
    }

    Some(resolved)
}
