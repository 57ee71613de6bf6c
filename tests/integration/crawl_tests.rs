//! Integration tests for the static crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use reconmap::config::{CrawlConfig, CrawlConfigBuilder};
use reconmap::crawler::{crawl, crawl_with, HttpTransport};
use reconmap::output::{CrawlResult, PageResult};
use reconmap::state::CrawlState;
use reconmap::ReconError;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Builder with fast retries, for a crawl rooted at the mock server
fn config_for(server: &MockServer) -> CrawlConfigBuilder {
    CrawlConfig::builder(format!("{}/", server.uri()))
        .retry_delay(Duration::ZERO)
        .max_retries(1)
}

fn find<'a>(result: &'a CrawlResult, server: &MockServer, route: &str) -> Option<&'a PageResult> {
    let url = format!("{}{}", server.uri(), route);
    result.pages.iter().find(|p| p.url == url)
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <a href="/about">About</a>
            <a href="/login">Login</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/about",
        r#"<title>About</title><a href="/">Home</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/login",
        r#"<title>Login</title>
        <form action="/session" method="post">
            <input type="text" name="user">
            <input type="password" name="pass">
        </form>
        <button onclick="submitLogin()">Sign in</button>
        <script>fetch('/api/session', { method: 'POST' })</script>"#,
    )
    .await;

    let config = config_for(&server).build().unwrap();
    let result = crawl(config).await.unwrap();

    assert_eq!(result.state, CrawlState::Completed);
    assert_eq!(result.pages.len(), 3);
    assert_eq!(result.statistics.total_errors, 0);

    let home = find(&result, &server, "/").unwrap();
    assert_eq!(home.status, 200);
    assert_eq!(home.depth, 0);
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.links.len(), 2);

    let login = find(&result, &server, "/login").unwrap();
    assert_eq!(login.depth, 1);
    assert_eq!(login.parent_url.as_deref(), Some(home.url.as_str()));
    assert_eq!(login.forms.len(), 1);
    assert_eq!(login.forms[0].method, "POST");
    assert_eq!(login.forms[0].inputs.len(), 2);
    assert_eq!(login.buttons.len(), 1);
    assert!(login.buttons[0].has_handler);
    assert!(login
        .api_endpoints
        .iter()
        .any(|e| e.url.ends_with("/api/session") && e.method == "POST"));

    let graph = result.graph.as_ref().unwrap();
    assert!(graph.statistics().total_nodes >= 4);
}

#[tokio::test]
async fn test_pattern_sampling_limits_similar_urls() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/users/1">1</a><a href="/users/2">2</a>
           <a href="/users/3">3</a><a href="/users/4">4</a>"#,
    )
    .await;
    for id in 1..=4 {
        mount_page(&server, &format!("/users/{}", id), "<p>user</p>").await;
    }

    let config = config_for(&server)
        .max_samples_per_pattern(3)
        .max_concurrent_pages(1)
        .build()
        .unwrap();
    let result = crawl(config).await.unwrap();

    let users = result
        .pages
        .iter()
        .filter(|p| p.url.contains("/users/"))
        .count();
    assert_eq!(users, 3);
    assert_eq!(result.statistics.skipped.pattern, 1);

    let patterns = result.patterns.as_ref().unwrap();
    let group = patterns
        .patterns
        .iter()
        .find(|g| g.samples.iter().any(|s| s.contains("/users/")))
        .unwrap();
    assert_eq!(group.samples.len(), 3);
    assert_eq!(group.skip_count, 1);
}

#[tokio::test]
async fn test_robots_disallow_respected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        r#"<a href="/public">public</a><a href="/private/admin">admin</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<p>hello</p>").await;
    Mock::given(method("GET"))
        .and(path("/private/admin"))
        .respond_with(html("<p>secret</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();

    assert!(find(&result, &server, "/public").is_some());
    assert!(find(&result, &server, "/private/admin").is_none());
    assert_eq!(result.statistics.skipped.robots, 1);
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/", "<p>home</p>").await;

    let config = config_for(&server).respect_robots(false).build().unwrap();
    let result = crawl(config).await.unwrap();

    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.statistics.skipped.robots, 0);
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/level1">1</a>"#).await;
    mount_page(&server, "/level1", r#"<a href="/level2">2</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(html("<p>too deep</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server).max_depth(1).build().unwrap();
    let result = crawl(config).await.unwrap();

    assert_eq!(result.pages.len(), 2);
    assert!(result.pages.iter().all(|p| p.depth <= 1));
    assert_eq!(result.statistics.skipped.depth, 1);
}

#[tokio::test]
async fn test_each_url_fetched_once() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/a">a</a><a href="/b">b</a><a href="/a#top">a again</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/b">b</a><a href="/">home</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<a href="/a">a</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).max_concurrent_pages(4).build().unwrap();
    let result = crawl(config).await.unwrap();

    assert_eq!(result.pages.len(), 3);
    let mut urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 3);
}

#[tokio::test]
async fn test_http_error_recorded_and_not_followed() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/missing">missing</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_raw(r#"<a href="/hidden">hidden</a>"#, "text/html"),
        )
        .mount(&server)
        .await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();

    let missing = find(&result, &server, "/missing").unwrap();
    assert_eq!(missing.status, 404);
    assert!(missing.error.is_some());
    assert!(missing.links.is_empty());
    assert!(find(&result, &server, "/hidden").is_none());
    assert_eq!(result.statistics.total_errors, 1);
    assert_eq!(result.state, CrawlState::Completed);
}

#[tokio::test]
async fn test_out_of_scope_links_skipped() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="https://elsewhere.example/page">external</a>
           <a href="/local">local</a>
           <a href="mailto:someone@example.com">mail</a>"#,
    )
    .await;
    mount_page(&server, "/local", "<p>local</p>").await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();

    assert_eq!(result.pages.len(), 2);
    assert!(result.pages.iter().all(|p| !p.url.contains("elsewhere")));
    assert_eq!(result.statistics.skipped.scope, 1);
}

#[tokio::test]
async fn test_exclude_patterns() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/docs/manual.pdf">pdf</a><a href="/docs">docs</a>"#,
    )
    .await;
    mount_page(&server, "/docs", "<p>docs</p>").await;

    let config = config_for(&server).exclude_pattern("*.pdf").build().unwrap();
    let result = crawl(config).await.unwrap();

    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.statistics.skipped.scope, 1);
}

#[tokio::test]
async fn test_server_error_retried() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/flaky">flaky</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(&server, "/flaky", "<title>Recovered</title>").await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();

    let flaky = find(&result, &server, "/flaky").unwrap();
    assert_eq!(flaky.status, 200);
    assert_eq!(flaky.title.as_deref(), Some("Recovered"));
    assert!(flaky.error.is_none());
}

#[tokio::test]
async fn test_redirect_chain_recorded() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/old">old</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    mount_page(&server, "/new", "<title>New</title>").await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();

    let old = find(&result, &server, "/old").unwrap();
    assert_eq!(old.status, 200);
    assert_eq!(old.title.as_deref(), Some("New"));
    assert_eq!(
        old.redirect_chain,
        [
            format!("{}/old", server.uri()),
            format!("{}/new", server.uri())
        ]
    );
}

#[tokio::test]
async fn test_page_budget() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a><a href="/d">d</a>"#,
    )
    .await;
    for route in ["/a", "/b", "/c", "/d"] {
        mount_page(&server, route, "<p>leaf</p>").await;
    }

    let config = config_for(&server).max_pages(3).build().unwrap();
    let result = crawl(config).await.unwrap();

    assert_eq!(result.pages.len(), 3);
    assert_eq!(result.state, CrawlState::Completed);
}

#[tokio::test]
async fn test_deadline_drops_in_flight_pages() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/slow">slow</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = config_for(&server)
        .max_duration(Duration::from_secs(1))
        .timeout_secs(30)
        .build()
        .unwrap();
    let result = crawl(config).await.unwrap();

    assert!(result.statistics.deadline_reached);
    assert_eq!(result.pages.len(), 1);
    assert!(find(&result, &server, "/slow").is_none());
    assert_eq!(result.state, CrawlState::Completed);
}

#[tokio::test]
async fn test_unreachable_seed_aborts() {
    // Nothing listens on port 1
    let config = CrawlConfig::builder("http://127.0.0.1:1/")
        .max_retries(0)
        .timeout_secs(2)
        .build()
        .unwrap();

    let err = crawl(config).await.unwrap_err();
    assert!(matches!(err, ReconError::SeedUnreachable { .. }));
}

#[tokio::test]
async fn test_seed_http_error_is_not_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();

    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].status, 500);
    assert!(result.pages[0].is_error());
}

#[tokio::test]
async fn test_result_saved_as_json() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Home</title>").await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("result.json");

    let config = config_for(&server).knowledge_graph(false).build().unwrap();
    let transport = Arc::new(HttpTransport::from_config(&config.crawler).unwrap());
    let result = crawl_with(config, transport, None)
        .await
        .unwrap()
        .with_config_hash("deadbeef");
    result.save_to_file(&output).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value["state"], "completed");
    assert_eq!(value["config_hash"], "deadbeef");
    assert_eq!(value["pages"][0]["title"], "Home");
    assert!(value.get("graph").is_none());
}

#[tokio::test]
async fn test_slow_robots_respects_deadline() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nAllow: /\n")
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", "<p>home</p>").await;

    let config = config_for(&server)
        .max_duration(Duration::from_secs(1))
        .timeout_secs(30)
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let result = crawl(config).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(result.statistics.deadline_reached);
    assert!(result.pages.is_empty());
    assert_eq!(result.state, CrawlState::Completed);
}

#[tokio::test]
async fn test_depth_is_shortest_path_under_concurrency() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
    mount_page(&server, "/a", r#"<a href="/c">c</a>"#).await;
    mount_page(&server, "/c", r#"<a href="/x">x</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<a href="/x">x</a>"#).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;
    mount_page(&server, "/x", "<p>target</p>").await;

    let config = config_for(&server)
        .max_depth(2)
        .max_concurrent_pages(4)
        .build()
        .unwrap();
    let result = crawl(config).await.unwrap();

    assert_eq!(result.pages.len(), 5);
    let target = find(&result, &server, "/x").unwrap();
    assert_eq!(target.depth, 2);
    assert_eq!(target.parent_url, Some(format!("{}/b", server.uri())));
    assert_eq!(result.statistics.skipped.depth, 0);
}

#[tokio::test]
async fn test_stored_targets_are_normalized() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<form action="javascript:void(0)" method="post"><input name="q"></form>
        <script>
            fetch("ws://Example.com/api/Sock#x");
            fetch("/API/Items/?b=2&a=1#top");
        </script>"#,
    )
    .await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();
    let home = find(&result, &server, "/").unwrap();

    assert_eq!(home.forms.len(), 1);
    assert_eq!(home.forms[0].action, format!("{}/", server.uri()));
    assert_eq!(home.api_endpoints.len(), 1);
    assert_eq!(
        home.api_endpoints[0].url,
        format!("{}/API/Items?a=1&b=2", server.uri())
    );

    let graph = result.graph.as_ref().unwrap();
    assert!(graph.nodes().all(|node| node.url.starts_with("http://")));
}

#[tokio::test]
async fn test_relative_links_after_directory_redirect() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/docs">docs</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/docs/"))
        .mount(&server)
        .await;
    mount_page(&server, "/docs/", r#"<a href="intro">intro</a>"#).await;
    mount_page(&server, "/docs/intro", "<title>Intro</title>").await;

    let result = crawl(config_for(&server).build().unwrap()).await.unwrap();

    let docs = find(&result, &server, "/docs").unwrap();
    assert_eq!(docs.links, [format!("{}/docs/intro", server.uri())]);
    assert!(docs.redirect_chain.is_empty());

    let intro = find(&result, &server, "/docs/intro").unwrap();
    assert_eq!(intro.title.as_deref(), Some("Intro"));
}
