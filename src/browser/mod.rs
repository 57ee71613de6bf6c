//! Browser session abstraction for the rendered crawl mode
//!
//! The crawler never talks to a browser automation library directly. It
//! consumes the [`BrowserSession`] / [`RenderedPage`] / [`DomElement`] traits,
//! so any automation backend can be plugged in without touching scheduling
//! logic. Two implementations ship with the crate:
//!
//! - [`SnapshotSession`]: serves pre-recorded markup through a static DOM.
//!   Used to run the rendered-page heuristics on plain HTTP responses and in
//!   tests.
//! - `ChromiumSession` (feature `chromium`): drives headless Chromium over CDP.

mod snapshot;

#[cfg(feature = "chromium")]
mod chromium;

pub use snapshot::{SnapshotDocument, SnapshotElement, SnapshotPage, SnapshotSession};

#[cfg(feature = "chromium")]
pub use chromium::ChromiumSession;

use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// Condition a navigation waits for before it is considered done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategy {
    /// No network activity for a short quiet window
    #[default]
    NetworkIdle,
    /// DOMContentLoaded fired
    DomContentLoaded,
    /// The load event fired
    Load,
    /// The navigation response was committed
    Commit,
}

/// Browser window dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Result of a completed navigation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationOutcome {
    /// Status of the main document response, when the backend can observe it
    pub status: Option<u16>,
    /// URL the page ended up on after redirects
    pub final_url: Option<Url>,
}

/// Category of a network request issued by a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Xhr,
    Fetch,
    WebSocket,
    Other,
}

impl ResourceType {
    /// True for the categories that represent application API traffic
    pub fn is_api(self) -> bool {
        matches!(self, Self::Xhr | Self::Fetch)
    }
}

/// A request observed on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub url: String,
    pub method: String,
    pub resource_type: ResourceType,
}

/// Handle returned by [`RenderedPage::on_request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback invoked for every request a page issues
pub type RequestHandler = Arc<dyn Fn(&NetworkRequest) + Send + Sync>;

/// A long-lived browser that hands out isolated pages
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Opens a fresh, isolated page
    async fn new_page(&self, viewport: Viewport, user_agent: &str)
        -> Result<Box<dyn RenderedPage>>;

    /// Shuts the browser down
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// One page (tab/context) of a browser session
#[async_trait]
pub trait RenderedPage: Send + Sync {
    /// Navigates and waits for the given condition
    async fn navigate(&self, url: &Url, wait: WaitStrategy) -> Result<NavigationOutcome>;

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn DomElement>>>;

    async fn title(&self) -> Result<Option<String>>;

    /// Registers a request listener
    async fn on_request(&self, handler: RequestHandler) -> Result<ListenerId>;

    /// Detaches a listener registered with [`on_request`](Self::on_request)
    async fn remove_listener(&self, id: ListenerId) -> Result<()>;

    /// Closes the page, releasing its browser resources
    async fn close(self: Box<Self>) -> Result<()>;
}

/// An element handle inside a rendered page
#[async_trait]
pub trait DomElement: Send + Sync {
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// Rendered text content
    async fn text(&self) -> Result<String>;

    /// Descendants matching a selector
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn DomElement>>>;
}
