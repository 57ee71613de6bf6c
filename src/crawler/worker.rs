//! Per-page fetch and extraction
//!
//! A [`PageWorker`] turns one URL into a [`PageFetch`], either over plain
//! HTTP with the static extractor or through a browser page with the rendered
//! extractor and network capture. It never fails: every problem ends up in
//! `PageFetch::error`.

use super::fetcher::{FetchResult, Fetcher};
use crate::browser::{BrowserSession, SnapshotPage, Viewport, WaitStrategy};
use crate::config::CrawlConfig;
use crate::extract::{
    detect_spa, static_html, ButtonInfo, EndpointInfo, FormData, NetworkCapture, PageGuard,
    RenderedPageExtractor,
};
use crate::url::{normalize, resolve_url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// What a worker learned about one URL
#[derive(Debug, Clone, Default)]
pub struct PageFetch {
    /// HTTP status, 0 when no response was received
    pub status: u16,
    /// Normalized URL the content was served from
    pub final_url: Option<Url>,
    pub redirect_chain: Vec<Url>,
    pub title: Option<String>,
    /// Absolute, normalized links
    pub links: Vec<String>,
    pub forms: Vec<FormData>,
    pub buttons: Vec<ButtonInfo>,
    pub endpoints: Vec<EndpointInfo>,
    pub spa_detected: bool,
    pub error: Option<String>,
}

impl PageFetch {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    fn http_error(status: u16, final_url: Option<Url>, redirect_chain: Vec<Url>) -> Self {
        Self {
            status,
            final_url,
            redirect_chain,
            error: Some(format!("HTTP {}", status)),
            ..Self::default()
        }
    }

    /// True when the target could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        self.status == 0 && self.error.is_some()
    }

    /// True when links from this page should be followed
    pub fn is_followable(&self) -> bool {
        self.error.is_none() && self.status < 400
    }
}

fn is_markup(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("html") || ct.contains("xml") || ct.starts_with("text/plain")
        }
        // Servers that omit the header usually serve HTML
        None => true,
    }
}

/// Cheap to clone; one clone per in-flight page
#[derive(Clone)]
pub struct PageWorker {
    fetcher: Fetcher,
    browser: Option<Arc<dyn BrowserSession>>,
    user_agent: Arc<str>,
    viewport: Viewport,
    wait_until: WaitStrategy,
    navigation_timeout: Duration,
    detect_spa: bool,
}

impl PageWorker {
    pub fn new(
        fetcher: Fetcher,
        browser: Option<Arc<dyn BrowserSession>>,
        config: &CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            browser,
            user_agent: Arc::from(config.crawler.user_agent.as_str()),
            viewport: config.render.viewport(),
            wait_until: config.render.wait_until,
            navigation_timeout: config.crawler.timeout(),
            detect_spa: config.render.auto_detect_spa,
        }
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Fetches and extracts `url`, through the browser when `rendered` is set
    /// and a session is available
    pub async fn process(&self, url: &Url, rendered: bool) -> PageFetch {
        match (&self.browser, rendered) {
            (Some(browser), true) => self.process_rendered(url, browser.as_ref()).await,
            _ => self.process_static(url).await,
        }
    }

    async fn process_static(&self, url: &Url) -> PageFetch {
        let response = match self.fetcher.fetch(url).await {
            FetchResult::Success(response) => response,
            FetchResult::HttpError {
                status,
                final_url,
                redirect_chain,
            } => {
                debug!("HTTP {} from {}", status, url);
                return PageFetch::http_error(status, normalize(final_url).ok(), redirect_chain);
            }
            FetchResult::NetworkError { error, attempts } => {
                debug!("Fetch of {} failed after {} attempt(s): {}", url, attempts, error);
                return PageFetch::failed(error);
            }
        };

        // Relative references resolve against the URL as served; `/dir/` and
        // `/dir` differ here even though they normalize the same
        let base = response.final_url;
        let mut page = PageFetch {
            status: response.status,
            final_url: Some(normalize(base.clone()).unwrap_or_else(|_| url.clone())),
            redirect_chain: response.redirect_chain,
            ..PageFetch::default()
        };

        if !is_markup(response.content_type.as_deref()) {
            debug!(
                "Skipping extraction for {} ({})",
                url,
                response.content_type.as_deref().unwrap_or_default()
            );
            return page;
        }

        let body = response.body;
        page.title = static_html::title(&body);
        page.links = static_html::links(&body)
            .iter()
            .filter_map(|href| resolve_url(&base, href))
            .filter_map(|u| normalize(u).ok())
            .map(|u| u.to_string())
            .collect();
        page.forms = static_html::forms(&body, &base);
        page.buttons = static_html::buttons(&body);
        page.endpoints = static_html::api_calls(&body, &base);

        if self.detect_spa {
            page.spa_detected = detect_spa(&SnapshotPage::from_html(body)).await;
        }

        page
    }

    async fn process_rendered(&self, url: &Url, browser: &dyn BrowserSession) -> PageFetch {
        let page = match browser.new_page(self.viewport, &self.user_agent).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Could not open a page for {}: {}", url, e);
                return PageFetch::failed(e.to_string());
            }
        };

        let guard = PageGuard::new(page);
        let result = self.render(url, &guard).await;

        if let Err(e) = guard.close().await {
            warn!("Failed to close page for {}: {}", url, e);
        }
        result
    }

    async fn render(&self, url: &Url, guard: &PageGuard) -> PageFetch {
        let Some(page) = guard.page() else {
            return PageFetch::failed("page already closed");
        };

        let mut capture = NetworkCapture::new();
        if let Err(e) = capture.start(page).await {
            warn!("Network capture unavailable for {}: {}", url, e);
        }

        self.fetcher.pacer().wait().await;

        let navigation =
            tokio::time::timeout(self.navigation_timeout, page.navigate(url, self.wait_until))
                .await;
        let outcome = match navigation {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                capture.stop(page).await;
                return PageFetch::failed(e.to_string());
            }
            Err(_) => {
                capture.stop(page).await;
                debug!("Navigation to {} timed out", url);
                return PageFetch::failed(format!(
                    "Navigation timed out after {}s",
                    self.navigation_timeout.as_secs_f64()
                ));
            }
        };

        let status = outcome.status.unwrap_or(0);
        let base = outcome.final_url.unwrap_or_else(|| url.clone());
        let final_url = normalize(base.clone()).unwrap_or_else(|_| url.clone());
        let redirect_chain = if final_url != *url {
            vec![url.clone()]
        } else {
            Vec::new()
        };

        if status >= 400 {
            let endpoints = capture.stop(page).await;
            return PageFetch {
                endpoints,
                ..PageFetch::http_error(status, Some(final_url), redirect_chain)
            };
        }

        let analysis = RenderedPageExtractor::new(base)
            .analyze(page)
            .await;
        let endpoints = capture.stop(page).await;

        PageFetch {
            status,
            final_url: Some(final_url),
            redirect_chain,
            title: analysis.title,
            links: analysis.links,
            forms: analysis.forms,
            buttons: analysis.buttons,
            endpoints,
            spa_detected: analysis.is_spa,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{FetchResponse, Transport};
    use crate::crawler::pacer::RequestPacer;
    use async_trait::async_trait;

    /// Answers every request as if the server had redirected to `/dir/`
    struct DirectoryTransport;

    #[async_trait]
    impl Transport for DirectoryTransport {
        async fn fetch(
            &self,
            _url: &Url,
            _headers: &[(String, String)],
            _timeout: Duration,
        ) -> crate::Result<FetchResponse> {
            let served = Url::parse("https://example.com/dir/").unwrap();
            Ok(FetchResponse::new(
                served,
                200,
                r#"<a href="b">b</a><form action="save"></form><form action="javascript:go()"></form>"#,
            ))
        }
    }

    #[tokio::test]
    async fn test_links_resolve_against_served_url() {
        let config = CrawlConfig::builder("https://example.com/dir").build().unwrap();
        let fetcher = Fetcher::new(
            Arc::new(DirectoryTransport),
            Arc::new(RequestPacer::new(Duration::ZERO)),
            &config.crawler,
        );
        let worker = PageWorker::new(fetcher, None, &config);

        let url = Url::parse("https://example.com/dir").unwrap();
        let page = worker.process(&url, false).await;

        assert_eq!(page.final_url.unwrap().as_str(), "https://example.com/dir");
        assert_eq!(page.links, ["https://example.com/dir/b"]);
        assert_eq!(page.forms[0].action, "https://example.com/dir/save");
        assert_eq!(page.forms[1].action, "https://example.com/dir");
    }

    #[test]
    fn test_is_markup() {
        assert!(is_markup(Some("text/html; charset=utf-8")));
        assert!(is_markup(Some("application/xhtml+xml")));
        assert!(is_markup(None));
        assert!(!is_markup(Some("image/png")));
        assert!(!is_markup(Some("application/pdf")));
    }

    #[test]
    fn test_page_fetch_classification() {
        let unreachable = PageFetch::failed("connection refused");
        assert!(unreachable.is_unreachable());
        assert!(!unreachable.is_followable());

        let not_found = PageFetch::http_error(404, None, Vec::new());
        assert!(!not_found.is_unreachable());
        assert!(!not_found.is_followable());
        assert_eq!(not_found.error.as_deref(), Some("HTTP 404"));

        let ok = PageFetch {
            status: 200,
            ..PageFetch::default()
        };
        assert!(ok.is_followable());
    }
}
