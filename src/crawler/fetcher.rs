//! HTTP fetching
//!
//! Two layers:
//! - [`Transport`]: a single request with manual redirect handling. The
//!   production implementation is [`HttpTransport`] over `reqwest`.
//! - [`Fetcher`]: shared pacing, retries and outcome classification on top
//!   of any transport. Used for pages and robots.txt alike.
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 2xx/3xx | Success |
//! | HTTP 4xx | Immediate → HttpError |
//! | HTTP 5xx | Retry up to `max_retries`, then HttpError |
//! | Timeout / connection failure | Retry up to `max_retries`, then NetworkError |
//! | Redirect loop / chain > 10 | Immediate → NetworkError |

use super::pacer::RequestPacer;
use crate::config::CrawlerConfig;
use crate::{ReconError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Maximum redirect hops before a fetch is abandoned
pub const MAX_REDIRECTS: usize = 10;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,*/*;q=0.8";

/// A completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// URL of the response after following redirects
    pub final_url: Url,
    pub body: String,
    pub content_type: Option<String>,
    /// URLs redirected through, starting with the requested one; empty when
    /// no redirect happened
    pub redirect_chain: Vec<Url>,
}

impl FetchResponse {
    /// A response served directly without redirects
    pub fn new(url: Url, status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            final_url: url,
            body: body.into(),
            content_type: None,
            redirect_chain: Vec::new(),
        }
    }
}

/// One HTTP GET, redirects included
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<FetchResponse>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport whose client sends `user_agent`
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .redirect(Policy::none()) // Handle redirects manually
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Self::new(&config.user_agent, config.timeout())
    }
}

fn classify_error(url: &Url, err: reqwest::Error) -> ReconError {
    if err.is_timeout() {
        ReconError::Timeout {
            url: url.to_string(),
        }
    } else {
        ReconError::Http {
            url: url.to_string(),
            source: err,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &Url,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<FetchResponse> {
        let mut current = url.clone();
        let mut chain: Vec<Url> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(current.to_string());

        loop {
            let mut request = self.client.get(current.clone()).timeout(timeout);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request
                .send()
                .await
                .map_err(|e| classify_error(&current, e))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                if let Some(location) = location {
                    let next = current.join(&location)?;
                    if chain.len() >= MAX_REDIRECTS {
                        return Err(ReconError::RedirectLimit {
                            url: url.to_string(),
                        });
                    }
                    if !visited.insert(next.to_string()) {
                        return Err(ReconError::RedirectLoop {
                            url: url.to_string(),
                        });
                    }
                    debug!("Redirect {} -> {} ({})", current, next, status.as_u16());
                    chain.push(std::mem::replace(&mut current, next));
                    continue;
                }
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = response
                .text()
                .await
                .map_err(|e| classify_error(&current, e))?;

            return Ok(FetchResponse {
                status: status.as_u16(),
                final_url: current,
                body,
                content_type,
                redirect_chain: chain,
            });
        }
    }
}

/// Outcome of a fetch after retries
#[derive(Debug)]
pub enum FetchResult {
    /// 2xx/3xx response
    Success(FetchResponse),

    /// 4xx, or 5xx after retries ran out
    HttpError {
        status: u16,
        final_url: Url,
        redirect_chain: Vec<Url>,
    },

    /// No HTTP response at all
    NetworkError {
        error: String,
        /// Number of attempts made
        attempts: u32,
    },
}

/// Retrying, paced fetcher shared by all workers
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    pacer: Arc<RequestPacer>,
    headers: Vec<(String, String)>,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        pacer: Arc<RequestPacer>,
        config: &CrawlerConfig,
    ) -> Self {
        Self {
            transport,
            pacer,
            headers: vec![
                ("User-Agent".to_string(), config.user_agent.clone()),
                ("Accept".to_string(), ACCEPT_HTML.to_string()),
            ],
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    pub fn pacer(&self) -> &Arc<RequestPacer> {
        &self.pacer
    }

    /// Fetches `url`, retrying 5xx responses and transient network errors
    ///
    /// Every attempt, retries included, takes a slot from the shared pacer.
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.pacer.wait().await;

            match self.transport.fetch(url, &self.headers, self.timeout).await {
                Ok(response) if response.status >= 500 => {
                    if attempt <= self.max_retries {
                        warn!(
                            "HTTP {} from {} (attempt {}/{}), retrying",
                            response.status,
                            url,
                            attempt,
                            self.max_retries + 1
                        );
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }
                    return FetchResult::HttpError {
                        status: response.status,
                        final_url: response.final_url,
                        redirect_chain: response.redirect_chain,
                    };
                }
                Ok(response) if response.status >= 400 => {
                    return FetchResult::HttpError {
                        status: response.status,
                        final_url: response.final_url,
                        redirect_chain: response.redirect_chain,
                    };
                }
                Ok(response) => return FetchResult::Success(response),
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    warn!(
                        "Fetch of {} failed (attempt {}/{}): {}, retrying",
                        url,
                        attempt,
                        self.max_retries + 1,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return FetchResult::NetworkError {
                        error: e.to_string(),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted outcomes in order, repeating the last one
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<std::result::Result<u16, ()>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<std::result::Result<u16, ()>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(
            &self,
            url: &Url,
            _headers: &[(String, String)],
            _timeout: Duration,
        ) -> Result<FetchResponse> {
            *self.calls.lock().unwrap() += 1;
            let mut outcomes = self.outcomes.lock().unwrap();
            let outcome = if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                *outcomes.front().unwrap()
            };
            match outcome {
                Ok(status) => Ok(FetchResponse::new(url.clone(), status, "<html></html>")),
                Err(()) => Err(ReconError::Timeout {
                    url: url.to_string(),
                }),
            }
        }
    }

    fn create_test_config() -> CrawlerConfig {
        CrawlerConfig {
            max_retries: 2,
            retry_delay_ms: 0,
            ..CrawlerConfig::default()
        }
    }

    fn fetcher(transport: Arc<ScriptedTransport>) -> Fetcher {
        Fetcher::new(
            transport,
            Arc::new(RequestPacer::new(Duration::ZERO)),
            &create_test_config(),
        )
    }

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(200)]));
        let result = fetcher(transport.clone()).fetch(&url()).await;
        assert!(matches!(result, FetchResult::Success(ref r) if r.status == 200));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(404)]));
        let result = fetcher(transport.clone()).fetch(&url()).await;
        assert!(matches!(result, FetchResult::HttpError { status: 404, .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(503), Ok(200)]));
        let result = fetcher(transport.clone()).fetch(&url()).await;
        assert!(matches!(result, FetchResult::Success(ref r) if r.status == 200));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(500)]));
        let result = fetcher(transport.clone()).fetch(&url()).await;
        assert!(matches!(result, FetchResult::HttpError { status: 500, .. }));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_timeout_exhausts_retries() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(())]));
        let result = fetcher(transport.clone()).fetch(&url()).await;
        match result {
            FetchResult::NetworkError { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected network error, got {:?}", other),
        }
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn test_build_http_transport() {
        let transport = HttpTransport::from_config(&CrawlerConfig::default());
        assert!(transport.is_ok());
    }
}
