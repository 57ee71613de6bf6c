//! Headless Chromium backend over the DevTools protocol

use crate::browser::{
    BrowserSession, DomElement, ListenerId, NavigationOutcome, NetworkRequest, RenderedPage,
    RequestHandler, ResourceType, Viewport, WaitStrategy,
};
use crate::{ReconError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, ResourceType as CdpResourceType,
};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const READY_MAX_WAIT: Duration = Duration::from_secs(10);
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

const NAVIGATION_STATUS_SCRIPT: &str = r#"
    (function() {
        const entry = performance.getEntriesByType('navigation')[0];
        return entry && entry.responseStatus ? entry.responseStatus : null;
    })()
"#;

fn browser_error(context: &str, err: impl std::fmt::Display) -> ReconError {
    ReconError::Browser(format!("{}: {}", context, err))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A launched Chromium process
pub struct ChromiumSession {
    browser: tokio::sync::Mutex<Browser>,
    handler_task: JoinHandle<()>,
}

impl ChromiumSession {
    /// Launches Chromium and spawns its CDP event loop
    pub async fn launch(headless: bool, viewport: Viewport) -> Result<Self> {
        let mut builder = BrowserConfig::builder().window_size(viewport.width, viewport.height);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| browser_error("Failed to build browser config", e))?;

        info!("Launching Chromium (headless: {})", headless);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("Failed to launch browser", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    // chromiumoxide cannot decode every CDP event newer browsers emit
                    if message.contains("did not match any variant")
                        || message.contains("Failed to deserialize WS response")
                    {
                        trace!("Ignoring undecodable CDP message: {}", message);
                    } else {
                        error!("Browser handler error: {}", message);
                    }
                }
            }
            debug!("Browser handler task finished");
        });

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            handler_task,
        })
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(
        &self,
        viewport: Viewport,
        user_agent: &str,
    ) -> Result<Box<dyn RenderedPage>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| browser_error("Failed to open page", e))?;

        page.set_user_agent(user_agent)
            .await
            .map_err(|e| browser_error("Failed to set user agent", e))?;

        let metrics = SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            1.0,
            false,
        );
        if let Err(e) = page.execute(metrics).await {
            warn!("Failed to apply viewport: {}", e);
        }

        Ok(Box::new(ChromiumPage {
            page,
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            closed: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| browser_error("Failed to close browser", e))?;
        if let Err(e) = browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
    listeners: Mutex<HashMap<ListenerId, JoinHandle<()>>>,
    next_listener: AtomicU64,
    closed: bool,
}

impl ChromiumPage {
    async fn ready_state(&self) -> Option<String> {
        let result = self.page.evaluate("document.readyState").await.ok()?;
        result.into_value::<String>().ok()
    }

    async fn wait_for(&self, strategy: WaitStrategy) {
        let target: &[&str] = match strategy {
            WaitStrategy::Commit => return,
            WaitStrategy::DomContentLoaded => &["interactive", "complete"],
            WaitStrategy::Load | WaitStrategy::NetworkIdle => &["complete"],
        };

        let start = Instant::now();
        while start.elapsed() < READY_MAX_WAIT {
            if let Some(state) = self.ready_state().await {
                if target.contains(&state.as_str()) {
                    break;
                }
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        if strategy == WaitStrategy::NetworkIdle {
            tokio::time::sleep(NETWORK_QUIET_WINDOW).await;
        }
    }

    fn abort_listeners(&self) {
        for (_, task) in lock(&self.listeners).drain() {
            task.abort();
        }
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.abort_listeners();
        if self.closed {
            return;
        }
        let page = self.page.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("Failed to close dropped page: {}", e);
                }
            });
        }
    }
}

fn map_resource_type(kind: Option<&CdpResourceType>) -> ResourceType {
    match kind {
        Some(CdpResourceType::Document) => ResourceType::Document,
        Some(CdpResourceType::Stylesheet) => ResourceType::Stylesheet,
        Some(CdpResourceType::Image) => ResourceType::Image,
        Some(CdpResourceType::Media) => ResourceType::Media,
        Some(CdpResourceType::Font) => ResourceType::Font,
        Some(CdpResourceType::Script) => ResourceType::Script,
        Some(CdpResourceType::Xhr) => ResourceType::Xhr,
        Some(CdpResourceType::Fetch) => ResourceType::Fetch,
        Some(CdpResourceType::WebSocket) => ResourceType::WebSocket,
        _ => ResourceType::Other,
    }
}

#[async_trait]
impl RenderedPage for ChromiumPage {
    async fn navigate(&self, url: &Url, wait: WaitStrategy) -> Result<NavigationOutcome> {
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| ReconError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        self.wait_for(wait).await;

        let status = match self.page.evaluate(NAVIGATION_STATUS_SCRIPT).await {
            Ok(result) => result.into_value::<Option<u16>>().ok().flatten(),
            Err(e) => {
                debug!("Could not read navigation status for {}: {}", url, e);
                None
            }
        };

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok());

        Ok(NavigationOutcome { status, final_url })
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn DomElement>>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| browser_error("Query failed", e))?;
        Ok(boxed(elements))
    }

    async fn title(&self) -> Result<Option<String>> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| browser_error("Failed to read title", e))?;
        Ok(title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }

    async fn on_request(&self, handler: RequestHandler) -> Result<ListenerId> {
        let mut events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| browser_error("Failed to subscribe to requests", e))?;

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let request = NetworkRequest {
                    url: event.request.url.clone(),
                    method: event.request.method.clone(),
                    resource_type: map_resource_type(event.r#type.as_ref()),
                };
                handler(&request);
            }
        });

        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        lock(&self.listeners).insert(id, task);
        Ok(id)
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<()> {
        if let Some(task) = lock(&self.listeners).remove(&id) {
            task.abort();
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.abort_listeners();
        self.closed = true;
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| browser_error("Failed to close page", e))
    }
}

struct ChromiumElement(Element);

#[async_trait]
impl DomElement for ChromiumElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.0
            .attribute(name)
            .await
            .map_err(|e| browser_error("Failed to read attribute", e))
    }

    async fn text(&self) -> Result<String> {
        let text = self
            .0
            .inner_text()
            .await
            .map_err(|e| browser_error("Failed to read text", e))?;
        Ok(text.unwrap_or_default())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn DomElement>>> {
        let elements = self
            .0
            .find_elements(selector)
            .await
            .map_err(|e| browser_error("Query failed", e))?;
        Ok(boxed(elements))
    }
}

fn boxed(elements: Vec<Element>) -> Vec<Box<dyn DomElement>> {
    elements
        .into_iter()
        .map(|el| Box::new(ChromiumElement(el)) as Box<dyn DomElement>)
        .collect()
}
