//! API traffic capture on rendered pages

use super::{EndpointInfo, EndpointSource};
use crate::browser::{ListenerId, NetworkRequest, RenderedPage, ResourceType};
use crate::url::normalize_url;
use crate::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CaptureState {
    seen: HashSet<(String, String)>,
    endpoints: Vec<EndpointInfo>,
}

impl CaptureState {
    fn record(&mut self, request: &NetworkRequest) {
        let source = match request.resource_type {
            ResourceType::Xhr => EndpointSource::NetworkXhr,
            ResourceType::Fetch => EndpointSource::NetworkFetch,
            _ => return,
        };

        let Ok(url) = normalize_url(&request.url).map(|u| u.to_string()) else {
            debug!("Ignoring non-http request to {}", request.url);
            return;
        };
        let method = request.method.to_ascii_uppercase();

        if self.seen.insert((url.clone(), method.clone())) {
            self.endpoints.push(EndpointInfo {
                url,
                method,
                source,
            });
        }
    }
}

fn lock(state: &Mutex<CaptureState>) -> MutexGuard<'_, CaptureState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Records the XHR/fetch requests a page issues
///
/// Static resources (documents, stylesheets, images, fonts, scripts) are
/// ignored. Requests are deduplicated by (url, method). One capture belongs
/// to one page: `start` attaches a single listener, `stop` detaches it.
#[derive(Debug, Default)]
pub struct NetworkCapture {
    state: Arc<Mutex<CaptureState>>,
    listener: Option<ListenerId>,
}

impl NetworkCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the request listener; a no-op while already capturing
    pub async fn start(&mut self, page: &dyn RenderedPage) -> Result<()> {
        if self.listener.is_some() {
            debug!("Network capture already attached");
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let id = page
            .on_request(Arc::new(move |request: &NetworkRequest| {
                if request.resource_type.is_api() {
                    lock(&state).record(request);
                }
            }))
            .await?;

        self.listener = Some(id);
        Ok(())
    }

    /// Detaches the listener and returns everything captured
    pub async fn stop(&mut self, page: &dyn RenderedPage) -> Vec<EndpointInfo> {
        if let Some(id) = self.listener.take() {
            if let Err(e) = page.remove_listener(id).await {
                warn!("Failed to detach network listener: {}", e);
            }
        }
        self.endpoints()
    }

    /// Endpoints captured so far
    pub fn endpoints(&self) -> Vec<EndpointInfo> {
        lock(&self.state).endpoints.clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.listener.is_some()
    }
}
