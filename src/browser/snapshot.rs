//! Markup-backed browser session
//!
//! Serves recorded documents through the browser traits using `scraper` for
//! selector queries. No script runs: the DOM is whatever the markup says.
//! [`SnapshotPage::from_html`] wraps a plain HTTP response so the rendered-page
//! heuristics (SPA detection) can run on it.

use crate::browser::{
    BrowserSession, DomElement, ListenerId, NavigationOutcome, NetworkRequest, RenderedPage,
    RequestHandler, Viewport, WaitStrategy,
};
use crate::url::normalize;
use crate::{ReconError, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

/// A recorded response served by [`SnapshotSession`]
#[derive(Debug, Clone)]
pub struct SnapshotDocument {
    pub status: u16,
    pub html: String,
    /// Requests replayed to listeners when the document is loaded
    pub requests: Vec<NetworkRequest>,
    /// Artificial navigation latency
    pub delay: Option<Duration>,
}

impl SnapshotDocument {
    pub fn new(status: u16, html: impl Into<String>) -> Self {
        Self {
            status,
            html: html.into(),
            requests: Vec::new(),
            delay: None,
        }
    }

    pub fn with_request(mut self, request: NetworkRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct SessionCounters {
    open_pages: AtomicUsize,
    pages_created: AtomicUsize,
    active_listeners: AtomicUsize,
}

/// Browser session serving recorded documents keyed by normalized URL
///
/// Unknown URLs load as an empty 404 document.
#[derive(Debug, Default)]
pub struct SnapshotSession {
    documents: HashMap<String, SnapshotDocument>,
    counters: Arc<SessionCounters>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn document_key(url: &Url) -> String {
    normalize(url.clone())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl SnapshotSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the document served for `url`
    pub fn insert(&mut self, url: &str, document: SnapshotDocument) -> Result<()> {
        let url = Url::parse(url)?;
        self.documents.insert(document_key(&url), document);
        Ok(())
    }

    pub fn with_document(mut self, url: &str, document: SnapshotDocument) -> Result<Self> {
        self.insert(url, document)?;
        Ok(self)
    }

    /// Pages opened and not yet closed (or dropped)
    pub fn open_pages(&self) -> usize {
        self.counters.open_pages.load(Ordering::SeqCst)
    }

    pub fn pages_created(&self) -> usize {
        self.counters.pages_created.load(Ordering::SeqCst)
    }

    /// Request listeners currently attached across all pages
    pub fn active_listeners(&self) -> usize {
        self.counters.active_listeners.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for SnapshotSession {
    async fn new_page(
        &self,
        _viewport: Viewport,
        _user_agent: &str,
    ) -> Result<Box<dyn RenderedPage>> {
        self.counters.open_pages.fetch_add(1, Ordering::SeqCst);
        self.counters.pages_created.fetch_add(1, Ordering::SeqCst);

        let mut page = SnapshotPage::empty();
        page.documents = Some(self.documents.clone());
        page.counters = Some(Arc::clone(&self.counters));
        Ok(Box::new(page))
    }
}

/// A page of a [`SnapshotSession`], or a standalone wrapper around markup
pub struct SnapshotPage {
    documents: Option<HashMap<String, SnapshotDocument>>,
    counters: Option<Arc<SessionCounters>>,
    html: Mutex<String>,
    listeners: Mutex<Vec<(ListenerId, RequestHandler)>>,
    next_listener: AtomicU64,
    closed: bool,
}

impl SnapshotPage {
    fn empty() -> Self {
        Self {
            documents: None,
            counters: None,
            html: Mutex::new(String::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            closed: false,
        }
    }

    /// Wraps already fetched markup
    pub fn from_html(html: impl Into<String>) -> Self {
        let page = Self::empty();
        *lock(&page.html) = html.into();
        page
    }

    fn mark_closed(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(counters) = &self.counters {
            let listeners = lock(&self.listeners).len();
            counters
                .active_listeners
                .fetch_sub(listeners, Ordering::SeqCst);
            counters.open_pages.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SnapshotPage {
    fn drop(&mut self) {
        self.mark_closed();
    }
}

#[async_trait]
impl RenderedPage for SnapshotPage {
    async fn navigate(&self, url: &Url, _wait: WaitStrategy) -> Result<NavigationOutcome> {
        let document = self
            .documents
            .as_ref()
            .and_then(|docs| docs.get(&document_key(url)))
            .cloned()
            .unwrap_or_else(|| SnapshotDocument::new(404, ""));

        if let Some(delay) = document.delay {
            tokio::time::sleep(delay).await;
        }

        *lock(&self.html) = document.html;

        let handlers: Vec<RequestHandler> = lock(&self.listeners)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for request in &document.requests {
            for handler in &handlers {
                handler(request);
            }
        }

        Ok(NavigationOutcome {
            status: Some(document.status),
            final_url: Some(url.clone()),
        })
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn DomElement>>> {
        let html = lock(&self.html).clone();
        let elements = select_document(&html, selector)?;
        Ok(boxed(elements))
    }

    async fn title(&self) -> Result<Option<String>> {
        let html = lock(&self.html).clone();
        let title = select_document(&html, "title")?
            .into_iter()
            .next()
            .map(|el| el.text.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(title)
    }

    async fn on_request(&self, handler: RequestHandler) -> Result<ListenerId> {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        lock(&self.listeners).push((id, handler));
        if let Some(counters) = &self.counters {
            counters.active_listeners.fetch_add(1, Ordering::SeqCst);
        }
        Ok(id)
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<()> {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        if let Some(counters) = &self.counters {
            counters
                .active_listeners
                .fetch_sub(before - listeners.len(), Ordering::SeqCst);
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.mark_closed();
        Ok(())
    }
}

/// Static copy of a matched element
///
/// Holds its outer HTML so descendant queries can be answered without
/// keeping the (non-`Send`) parsed document alive.
#[derive(Debug, Clone)]
pub struct SnapshotElement {
    html: String,
    attributes: Vec<(String, String)>,
    text: String,
}

impl SnapshotElement {
    fn from_ref(element: ElementRef<'_>) -> Self {
        Self {
            html: element.html(),
            attributes: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: element.text().collect(),
        }
    }
}

#[async_trait]
impl DomElement for SnapshotElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone()))
    }

    async fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn DomElement>>> {
        let selector = parse_selector(selector)?;
        let fragment = Html::parse_fragment(&self.html);

        let Some(own) = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
        else {
            return Ok(Vec::new());
        };

        // Descendants only, like querySelectorAll on an element
        let elements: Vec<SnapshotElement> = own
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| selector.matches(el))
            .map(SnapshotElement::from_ref)
            .collect();

        Ok(boxed(elements))
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ReconError::Browser(format!("Invalid selector '{}': {:?}", selector, e)))
}

fn select_document(html: &str, selector: &str) -> Result<Vec<SnapshotElement>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(SnapshotElement::from_ref)
        .collect())
}

fn boxed(elements: Vec<SnapshotElement>) -> Vec<Box<dyn DomElement>> {
    elements
        .into_iter()
        .map(|el| Box::new(el) as Box<dyn DomElement>)
        .collect()
}
