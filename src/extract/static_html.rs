//! Regex-based extraction from raw markup
//!
//! These functions never fail: markup they cannot make sense of simply yields
//! fewer results. All patterns are compiled once.

use super::{ButtonInfo, EndpointInfo, EndpointSource, FormData, FormField};
use crate::url::{normalize, resolve_url};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("HREF_RE: hardcoded regex is valid")
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("TITLE_RE: hardcoded regex is valid")
});

static FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form\s*>").expect("FORM_RE: hardcoded regex is valid")
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(input|select|textarea)\b([^>]*)>")
        .expect("FIELD_RE: hardcoded regex is valid")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z_:][-a-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("ATTR_RE: hardcoded regex is valid")
});

static BUTTON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<button\b([^>]*)>(.*?)</button\s*>|<input\b([^>]*)>")
        .expect("BUTTON_RE: hardcoded regex is valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("TAG_RE: hardcoded regex is valid"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_RE: hardcoded regex is valid"));

static FETCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bfetch\s*\(\s*(?:"([^"]+)"|'([^']+)'|`([^`]+)`)\s*(?:,\s*(\{[^}]*\}))?"#)
        .expect("FETCH_RE: hardcoded regex is valid")
});

static XHR_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.open\s*\(\s*["']([A-Za-z]+)["']\s*,\s*["'`]([^"'`]+)["'`]"#)
        .expect("XHR_OPEN_RE: hardcoded regex is valid")
});

static AJAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\.ajax\s*\(\s*(\{[^}]*\})").expect("AJAX_RE: hardcoded regex is valid")
});

static JQUERY_SHORTHAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$\.(get|post|getJSON)\s*\(\s*["'`]([^"'`]+)["'`]"#)
        .expect("JQUERY_SHORTHAND_RE: hardcoded regex is valid")
});

static AXIOS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\baxios\.(get|post|put|delete|patch|head|options)\s*\(\s*["'`]([^"'`]+)["'`]"#)
        .expect("AXIOS_RE: hardcoded regex is valid")
});

static API_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'`](https?://[^"'`\s]*/api/[^"'`\s]*)["'`]"#)
        .expect("API_LITERAL_RE: hardcoded regex is valid")
});

static URL_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\burl\s*:\s*["'`]([^"'`]+)["'`]"#)
        .expect("URL_OPTION_RE: hardcoded regex is valid")
});

static METHOD_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:method|type)\s*:\s*["'`]([a-z]+)["'`]"#)
        .expect("METHOD_OPTION_RE: hardcoded regex is valid")
});

const NON_NAVIGABLE: [&str; 3] = ["javascript:", "mailto:", "tel:"];

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn first_group(caps: &regex::Captures<'_>, groups: &[usize]) -> Option<String> {
    groups
        .iter()
        .find_map(|&i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = first_group(&caps, &[2, 3, 4]).unwrap_or_default();
            Some((name, decode_entities(&value)))
        })
        .collect()
}

fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn inner_text(markup: &str) -> String {
    let stripped = TAG_RE.replace_all(markup, " ");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    decode_entities(collapsed.trim())
}

/// Resolved and normalized target, or `None` for anything that is not an
/// http(s) URL
fn absolute(base: &Url, raw: &str) -> Option<String> {
    resolve_url(base, raw)
        .and_then(|u| normalize(u).ok())
        .map(|u| u.to_string())
}

/// Raw `href` values, in document order
///
/// Anchor-only references and `javascript:`, `mailto:`, `tel:` links are
/// dropped. Values are entity-decoded but not resolved.
pub fn links(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| first_group(&caps, &[1, 2]))
        .map(|href| decode_entities(href.trim()))
        .filter(|href| {
            let lower = href.to_ascii_lowercase();
            !href.is_empty()
                && !href.starts_with('#')
                && !NON_NAVIGABLE.iter().any(|scheme| lower.starts_with(scheme))
        })
        .collect()
}

/// Contents of the first `<title>` element
pub fn title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| inner_text(m.as_str()))
        .filter(|t| !t.is_empty())
}

/// Forms with their fields
///
/// The action is resolved against `base`; a missing, empty or non-http(s)
/// action (`javascript:` handlers) submits to `base` itself. Method defaults
/// to `GET`.
pub fn forms(html: &str, base: &Url) -> Vec<FormData> {
    FORM_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = parse_attributes(caps.get(1).map_or("", |m| m.as_str()));
            let body = caps.get(2).map_or("", |m| m.as_str());

            let action = attribute(&attrs, "action")
                .and_then(|action| absolute(base, action))
                .or_else(|| absolute(base, base.as_str()))?;
            let method = attribute(&attrs, "method")
                .map(|m| m.trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "GET".to_string());

            let inputs: Vec<FormField> = FIELD_RE
                .captures_iter(body)
                .map(|field| {
                    let tag = field[1].to_ascii_lowercase();
                    let field_attrs = parse_attributes(&field[2]);
                    let field_type = match tag.as_str() {
                        "input" => attribute(&field_attrs, "type")
                            .map(|t| t.trim().to_ascii_lowercase())
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| "text".to_string()),
                        other => other.to_string(),
                    };
                    FormField {
                        name: attribute(&field_attrs, "name").map(str::to_string),
                        field_type,
                        value: attribute(&field_attrs, "value").map(str::to_string),
                    }
                })
                .collect();

            let has_file_upload = inputs.iter().any(|f| f.field_type == "file");

            Some(FormData {
                action,
                method,
                inputs,
                has_file_upload,
            })
        })
        .collect()
}

/// `<button>` elements and `<input type="submit|button">`
pub fn buttons(html: &str) -> Vec<ButtonInfo> {
    BUTTON_RE
        .captures_iter(html)
        .filter_map(|caps| {
            if let Some(raw) = caps.get(1) {
                let attrs = parse_attributes(raw.as_str());
                let onclick = attribute(&attrs, "onclick").map(str::to_string);
                Some(ButtonInfo {
                    label: inner_text(caps.get(2).map_or("", |m| m.as_str())),
                    button_type: Some(
                        attribute(&attrs, "type")
                            .map(|t| t.to_ascii_lowercase())
                            .unwrap_or_else(|| "submit".to_string()),
                    ),
                    has_handler: onclick.is_some(),
                    onclick,
                })
            } else {
                let attrs = parse_attributes(caps.get(3)?.as_str());
                let input_type = attribute(&attrs, "type")?.to_ascii_lowercase();
                if input_type != "submit" && input_type != "button" {
                    return None;
                }
                let onclick = attribute(&attrs, "onclick").map(str::to_string);
                Some(ButtonInfo {
                    label: attribute(&attrs, "value").unwrap_or_default().to_string(),
                    button_type: Some(input_type),
                    has_handler: onclick.is_some(),
                    onclick,
                })
            }
        })
        .collect()
}

struct EndpointCollector<'a> {
    base: &'a Url,
    seen: HashSet<(String, String)>,
    endpoints: Vec<EndpointInfo>,
}

impl<'a> EndpointCollector<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            seen: HashSet::new(),
            endpoints: Vec::new(),
        }
    }

    fn push(&mut self, raw_url: &str, method: &str, source: EndpointSource) {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return;
        }
        let Some(url) = absolute(self.base, raw_url) else {
            return;
        };
        let method = method.to_ascii_uppercase();
        if self.seen.insert((url.clone(), method.clone())) {
            self.endpoints.push(EndpointInfo {
                url,
                method,
                source,
            });
        }
    }

    fn contains_url(&self, raw_url: &str) -> bool {
        absolute(self.base, raw_url)
            .is_some_and(|url| self.endpoints.iter().any(|e| e.url == url))
    }
}

fn option_method(options: Option<&str>) -> String {
    options
        .and_then(|o| METHOD_OPTION_RE.captures(o))
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "GET".to_string())
}

/// API call sites found in inline script and markup
///
/// Recognizes `fetch(..)`, `xhr.open(method, url)`, `$.ajax({..})`,
/// `$.get/$.post/$.getJSON`, `axios.<verb>(..)` and absolute URL string
/// literals containing `/api/`. URLs are normalized, targets that are not
/// http(s) are dropped, and results are deduplicated by (url, method).
pub fn api_calls(html: &str, base: &Url) -> Vec<EndpointInfo> {
    let mut collector = EndpointCollector::new(base);

    for caps in FETCH_RE.captures_iter(html) {
        if let Some(url) = first_group(&caps, &[1, 2, 3]) {
            let method = option_method(caps.get(4).map(|m| m.as_str()));
            collector.push(&url, &method, EndpointSource::Fetch);
        }
    }

    for caps in XHR_OPEN_RE.captures_iter(html) {
        collector.push(&caps[2], &caps[1], EndpointSource::Xhr);
    }

    for caps in AJAX_RE.captures_iter(html) {
        let options = &caps[1];
        if let Some(url) = URL_OPTION_RE.captures(options) {
            let method = option_method(Some(options));
            collector.push(&url[1], &method, EndpointSource::Ajax);
        }
    }

    for caps in JQUERY_SHORTHAND_RE.captures_iter(html) {
        let method = if &caps[1] == "post" { "POST" } else { "GET" };
        collector.push(&caps[2], method, EndpointSource::Ajax);
    }

    for caps in AXIOS_RE.captures_iter(html) {
        collector.push(&caps[2], &caps[1], EndpointSource::Axios);
    }

    for caps in API_LITERAL_RE.captures_iter(html) {
        let url = &caps[1];
        // Already attributed to a call idiom above
        if !collector.contains_url(url) {
            collector.push(url, "GET", EndpointSource::Literal);
        }
    }

    collector.endpoints
}
