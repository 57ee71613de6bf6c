//! Integration tests for rendered and auto crawl modes
//!
//! The browser side is a `SnapshotSession` serving recorded documents, so
//! these run without a Chromium install.

use async_trait::async_trait;
use reconmap::browser::{
    BrowserSession, NetworkRequest, RenderedPage, ResourceType, SnapshotDocument,
    SnapshotSession, Viewport,
};
use reconmap::config::{CrawlConfig, RenderMode};
use reconmap::crawler::{crawl_with, HttpTransport};
use reconmap::extract::EndpointSource;
use reconmap::output::CrawlResult;
use reconmap::ReconError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP: &str = "https://app.test";

fn request(url: &str, method: &str, resource_type: ResourceType) -> NetworkRequest {
    NetworkRequest {
        url: url.to_string(),
        method: method.to_string(),
        resource_type,
    }
}

/// Rendered-mode config for the fake app; robots.txt is skipped so no HTTP
/// request ever leaves the test
fn rendered_config() -> CrawlConfig {
    CrawlConfig::builder(format!("{}/", APP))
        .render_mode(RenderMode::Rendered)
        .respect_robots(false)
        .retry_delay(Duration::ZERO)
        .build()
        .unwrap()
}

/// A browser that cannot open pages
struct ExhaustedBrowser;

#[async_trait]
impl BrowserSession for ExhaustedBrowser {
    async fn new_page(
        &self,
        _viewport: Viewport,
        _user_agent: &str,
    ) -> reconmap::Result<Box<dyn RenderedPage>> {
        Err(ReconError::Browser("target closed".to_string()))
    }
}

async fn run_rendered(config: CrawlConfig, session: Arc<SnapshotSession>) -> CrawlResult {
    let transport = Arc::new(HttpTransport::from_config(&config.crawler).unwrap());
    let browser: Arc<dyn BrowserSession> = session;
    crawl_with(config, transport, Some(browser)).await.unwrap()
}

#[tokio::test]
async fn test_rendered_crawl_follows_dom_links() {
    let session = SnapshotSession::new()
        .with_document(
            &format!("{}/", APP),
            SnapshotDocument::new(
                200,
                r#"<title>App</title>
                <nav><a href="/settings">Settings</a><a href="/reports">Reports</a></nav>"#,
            ),
        )
        .unwrap()
        .with_document(
            &format!("{}/settings", APP),
            SnapshotDocument::new(
                200,
                r#"<title>Settings</title>
                <form action="/settings/save" method="post">
                    <input name="email" type="email">
                    <textarea name="bio"></textarea>
                </form>"#,
            ),
        )
        .unwrap()
        .with_document(
            &format!("{}/reports", APP),
            SnapshotDocument::new(200, "<title>Reports</title>"),
        )
        .unwrap();
    let session = Arc::new(session);

    let result = run_rendered(rendered_config(), Arc::clone(&session)).await;

    assert_eq!(result.pages.len(), 3);
    assert_eq!(result.statistics.total_errors, 0);

    let settings = result
        .pages
        .iter()
        .find(|p| p.url == format!("{}/settings", APP))
        .unwrap();
    assert_eq!(settings.title.as_deref(), Some("Settings"));
    assert_eq!(settings.forms.len(), 1);
    assert_eq!(settings.forms[0].action, format!("{}/settings/save", APP));
    assert_eq!(settings.forms[0].inputs.len(), 2);
}

#[tokio::test]
async fn test_every_page_closed() {
    let session = SnapshotSession::new()
        .with_document(
            &format!("{}/", APP),
            SnapshotDocument::new(200, r#"<a href="/a">a</a><a href="/missing">gone</a>"#)
                .with_request(request(
                    &format!("{}/api/ping", APP),
                    "GET",
                    ResourceType::Fetch,
                )),
        )
        .unwrap()
        .with_document(&format!("{}/a", APP), SnapshotDocument::new(200, "<p>a</p>"))
        .unwrap();
    let session = Arc::new(session);

    let result = run_rendered(rendered_config(), Arc::clone(&session)).await;

    assert_eq!(result.pages.len(), 3);
    assert_eq!(session.pages_created(), 3);
    assert_eq!(session.open_pages(), 0);
    assert_eq!(session.active_listeners(), 0);

    let missing = result
        .pages
        .iter()
        .find(|p| p.url.ends_with("/missing"))
        .unwrap();
    assert_eq!(missing.status, 404);
    assert!(missing.is_error());
}

#[tokio::test]
async fn test_network_capture_records_api_calls() {
    let session = SnapshotSession::new()
        .with_document(
            &format!("{}/", APP),
            SnapshotDocument::new(200, "<div id=\"app\"></div>")
                .with_request(request(&format!("{}/api/users", APP), "get", ResourceType::Xhr))
                .with_request(request(
                    &format!("{}/api/login", APP),
                    "POST",
                    ResourceType::Fetch,
                ))
                .with_request(request(&format!("{}/api/users", APP), "GET", ResourceType::Xhr))
                .with_request(request(
                    &format!("{}/static/app.js", APP),
                    "GET",
                    ResourceType::Script,
                )),
        )
        .unwrap();

    let result = run_rendered(rendered_config(), Arc::new(session)).await;

    let endpoints = &result.pages[0].api_endpoints;
    assert_eq!(endpoints.len(), 2);

    assert_eq!(endpoints[0].url, format!("{}/api/users", APP));
    assert_eq!(endpoints[0].method, "GET");
    assert_eq!(endpoints[0].source, EndpointSource::NetworkXhr);

    assert_eq!(endpoints[1].url, format!("{}/api/login", APP));
    assert_eq!(endpoints[1].method, "POST");
    assert_eq!(endpoints[1].source, EndpointSource::NetworkFetch);

    assert!(result.statistics.spa_detected);
}

#[tokio::test]
async fn test_navigation_timeout_is_recoverable() {
    let session = SnapshotSession::new()
        .with_document(
            &format!("{}/", APP),
            SnapshotDocument::new(200, r#"<a href="/slow">slow</a><a href="/fast">fast</a>"#),
        )
        .unwrap()
        .with_document(
            &format!("{}/slow", APP),
            SnapshotDocument::new(200, "<p>slow</p>").with_delay(Duration::from_secs(3)),
        )
        .unwrap()
        .with_document(&format!("{}/fast", APP), SnapshotDocument::new(200, "<p>fast</p>"))
        .unwrap();
    let session = Arc::new(session);

    let config = CrawlConfig::builder(format!("{}/", APP))
        .render_mode(RenderMode::Rendered)
        .respect_robots(false)
        .timeout_secs(1)
        .build()
        .unwrap();
    let result = run_rendered(config, Arc::clone(&session)).await;

    assert_eq!(result.pages.len(), 3);

    let slow = result.pages.iter().find(|p| p.url.ends_with("/slow")).unwrap();
    assert_eq!(slow.status, 0);
    assert!(slow.error.as_deref().unwrap().contains("timed out"));

    let fast = result.pages.iter().find(|p| p.url.ends_with("/fast")).unwrap();
    assert!(fast.error.is_none());
    assert_eq!(session.open_pages(), 0);
}

#[tokio::test]
async fn test_auto_mode_switches_to_rendered_for_spa() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><div id="root"></div><a href="/dashboard">Dashboard</a></body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>shell</p>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let session = SnapshotSession::new()
        .with_document(
            &format!("{}/dashboard", base),
            SnapshotDocument::new(200, "<title>Dashboard</title>").with_request(request(
                &format!("{}/api/stats", base),
                "GET",
                ResourceType::Xhr,
            )),
        )
        .unwrap();
    let session = Arc::new(session);

    let config = CrawlConfig::builder(format!("{}/", base))
        .render_mode(RenderMode::Auto)
        .retry_delay(Duration::ZERO)
        .build()
        .unwrap();
    let result = run_rendered(config, Arc::clone(&session)).await;

    assert!(result.statistics.spa_detected);
    assert_eq!(session.pages_created(), 1);

    let dashboard = result
        .pages
        .iter()
        .find(|p| p.url == format!("{}/dashboard", base))
        .unwrap();
    assert_eq!(dashboard.title.as_deref(), Some("Dashboard"));
    assert_eq!(dashboard.api_endpoints.len(), 1);
    assert_eq!(dashboard.api_endpoints[0].source, EndpointSource::NetworkXhr);
}

#[tokio::test]
async fn test_auto_mode_stays_static_for_plain_site() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<h1>Plain</h1><a href="/about">About</a>"#, "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>about</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let session = Arc::new(SnapshotSession::new());
    let config = CrawlConfig::builder(format!("{}/", server.uri()))
        .render_mode(RenderMode::Auto)
        .build()
        .unwrap();
    let result = run_rendered(config, Arc::clone(&session)).await;

    assert!(!result.statistics.spa_detected);
    assert_eq!(result.pages.len(), 2);
    assert_eq!(session.pages_created(), 0);
}

#[tokio::test]
async fn test_browser_failure_on_seed_aborts() {
    let config = rendered_config();
    let transport = Arc::new(HttpTransport::from_config(&config.crawler).unwrap());
    let browser: Arc<dyn BrowserSession> = Arc::new(ExhaustedBrowser);

    let err = crawl_with(config, transport, Some(browser))
        .await
        .unwrap_err();
    match err {
        ReconError::SeedUnreachable { reason, .. } => assert!(reason.contains("target closed")),
        other => panic!("unexpected error: {}", other),
    }
}
