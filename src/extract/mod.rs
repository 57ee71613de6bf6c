//! Page structure extraction
//!
//! Two extractors produce the same record types:
//! - [`static_html`]: pure functions over raw markup
//! - [`RenderedPageExtractor`]: DOM queries against a live [`RenderedPage`](crate::browser::RenderedPage)
//!
//! [`NetworkCapture`] complements the rendered extractor by recording the API
//! calls a page issues while it loads.

mod network;
mod rendered;
pub mod static_html;

pub use network::NetworkCapture;
pub use rendered::{
    detect_spa, PageAnalysis, PageGuard, RenderedPageExtractor, SPA_SCRIPT_THRESHOLD,
};

use serde::Serialize;

/// One input field of a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: Option<String>,
}

/// A form and its fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormData {
    /// Absolute, normalized action URL
    pub action: String,
    /// Uppercased HTTP method, `GET` when unspecified
    pub method: String,
    pub inputs: Vec<FormField>,
    pub has_file_upload: bool,
}

/// A clickable button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonInfo {
    pub label: String,
    pub button_type: Option<String>,
    pub onclick: Option<String>,
    pub has_handler: bool,
}

/// How an endpoint was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSource {
    Fetch,
    Xhr,
    Ajax,
    Axios,
    /// Absolute API URL found as a string literal
    Literal,
    /// XHR observed on a rendered page
    NetworkXhr,
    /// fetch() observed on a rendered page
    NetworkFetch,
}

impl EndpointSource {
    /// True when the endpoint was observed on the wire rather than in markup
    pub fn is_network(self) -> bool {
        matches!(self, Self::NetworkXhr | Self::NetworkFetch)
    }
}

/// An API endpoint the page calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    pub url: String,
    pub method: String,
    pub source: EndpointSource,
}
