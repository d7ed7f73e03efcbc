//! # svgpaint Net
//!
//! Resource fetching for the svgpaint renderer.
//!
//! ## Supported sources
//!
//! - `http://` and `https://` through reqwest, with retries on transient failures
//! - `file://` URLs and plain filesystem paths
//! - `data:` URLs (base64 or percent-encoded)
//!
//! Relative references resolve against [`FetchConfig::base_url`] when set, otherwise
//! against the working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use mime::Mime;
use reqwest::Client;
use svgpaint_common::{retry_with_backoff_if, RetryConfig};
use thiserror::Error;
use tracing::{debug, info, trace};
use url::Url;

pub mod data_url;

pub use data_url::DataUrl;

/// Errors that can occur in fetching.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("HTTP {status} for {url}")]
    Status { url: Url, status: StatusCode },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl NetError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Timeout(_) => true,
            NetError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            NetError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Where a fetched resource came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(Url),
    File(PathBuf),
    Data,
}

/// A fetched resource.
#[derive(Debug, Clone)]
pub struct Response {
    pub source: Source,
    pub status: StatusCode,
    pub content_type: Option<Mime>,
    body: Bytes,
}

impl Response {
    /// Check if the fetch was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string.
    pub user_agent: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
    /// Retry policy for http fetches.
    pub retry: RetryConfig,
    /// Base for relative references.
    pub base_url: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("svgpaint/", env!("CARGO_PKG_VERSION")).to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
            retry: RetryConfig::default(),
            base_url: None,
        }
    }
}

/// What an href resolves to before fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(Url),
    Path(PathBuf),
    Data(String),
}

/// Fetches resources by href.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Create a new fetcher.
    pub fn new(config: FetchConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(user_agent = %config.user_agent, "Fetcher initialized");

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolve an href to a fetch target.
    pub fn resolve(&self, href: &str) -> Result<Target, NetError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(NetError::InvalidUrl("empty href".to_string()));
        }
        if href.starts_with("data:") {
            return Ok(Target::Data(href.to_string()));
        }

        let url = match Url::parse(href) {
            Ok(url) if url.scheme().len() > 1 => Some(url),
            // Drive letters such as `C:\` parse as one-letter schemes.
            Ok(_) => None,
            Err(url::ParseError::RelativeUrlWithoutBase) => None,
            Err(e) => return Err(NetError::InvalidUrl(format!("{}: {}", href, e))),
        };

        let url = match (url, &self.config.base_url) {
            (Some(url), _) => url,
            (None, Some(base)) => base
                .join(href)
                .map_err(|e| NetError::InvalidUrl(format!("{}: {}", href, e)))?,
            (None, None) => return Ok(Target::Path(PathBuf::from(href))),
        };

        match url.scheme() {
            "http" | "https" => Ok(Target::Url(url)),
            "file" => url
                .to_file_path()
                .map(Target::Path)
                .map_err(|_| NetError::InvalidUrl(url.to_string())),
            "data" => Ok(Target::Data(url.to_string())),
            other => Err(NetError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Fetch an href.
    pub async fn fetch(&self, href: &str) -> Result<Response, NetError> {
        match self.resolve(href)? {
            Target::Data(data) => {
                let decoded = DataUrl::parse(&data)?;
                trace!(len = decoded.data.len(), "Decoded data URL");
                Ok(Response {
                    source: Source::Data,
                    status: StatusCode::OK,
                    content_type: decoded.media_type.as_deref().and_then(|m| m.parse().ok()),
                    body: Bytes::from(decoded.data),
                })
            }
            Target::Path(path) => self.fetch_file(&path).await,
            Target::Url(url) => {
                retry_with_backoff_if(
                    &self.config.retry,
                    || self.fetch_http(url.clone()),
                    NetError::is_retryable,
                )
                .await
            }
        }
    }

    /// Fetch an href as UTF-8 text.
    pub async fn fetch_text(&self, href: &str) -> Result<String, NetError> {
        self.fetch(href).await?.text()
    }

    async fn fetch_file(&self, path: &Path) -> Result<Response, NetError> {
        debug!(path = %path.display(), "Reading file");
        let body = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path).first();
        Ok(Response {
            source: Source::File(path.to_path_buf()),
            status: StatusCode::OK,
            content_type,
            body: Bytes::from(body),
        })
    }

    async fn fetch_http(&self, url: Url) -> Result<Response, NetError> {
        debug!(url = %url, "Fetching resource");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                NetError::Timeout(self.config.default_timeout)
            } else {
                NetError::HttpError(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetError::Status { url, status });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Mime>().ok());

        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            content_type = ?content_type,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response {
            source: Source::Http(url),
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(base: Option<&str>) -> Fetcher {
        Fetcher::new(FetchConfig {
            base_url: base.map(|b| Url::parse(b).unwrap()),
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                jitter: false,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_targets() {
        let f = fetcher(None);
        assert_eq!(
            f.resolve("images/a.png").unwrap(),
            Target::Path(PathBuf::from("images/a.png"))
        );
        assert!(matches!(
            f.resolve("https://example.com/a.svg").unwrap(),
            Target::Url(_)
        ));
        assert!(matches!(f.resolve("data:,x").unwrap(), Target::Data(_)));
        assert!(matches!(
            f.resolve("ftp://example.com/a.svg"),
            Err(NetError::UnsupportedScheme(_))
        ));
        assert!(f.resolve("  ").is_err());
    }

    #[test]
    fn test_resolve_against_base() {
        let f = fetcher(Some("https://example.com/art/index.svg"));
        match f.resolve("tiles/a.png").unwrap() {
            Target::Url(url) => assert_eq!(url.as_str(), "https://example.com/art/tiles/a.png"),
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn test_retryable_classification() {
        let url = Url::parse("https://example.com").unwrap();
        assert!(NetError::Status {
            url: url.clone(),
            status: StatusCode::BAD_GATEWAY
        }
        .is_retryable());
        assert!(!NetError::Status {
            url,
            status: StatusCode::NOT_FOUND
        }
        .is_retryable());
        assert!(!NetError::InvalidUrl("x".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_data_url() {
        let response = fetcher(None)
            .fetch("data:image/svg+xml;base64,PHN2Zy8+")
            .await
            .unwrap();
        assert_eq!(response.source, Source::Data);
        let content_type = response.content_type.as_ref().map(|mime| mime.essence_str());
        assert_eq!(content_type, Some("image/svg+xml"));
        assert_eq!(response.text().unwrap(), "<svg/>");
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::Builder::new().suffix(".svg").tempfile().unwrap();
        write!(file, "<svg width=\"4\"/>").unwrap();

        let f = fetcher(None);
        let path = file.path().to_str().unwrap().to_string();
        assert_eq!(f.fetch_text(&path).await.unwrap(), "<svg width=\"4\"/>");

        let url = Url::from_file_path(file.path()).unwrap();
        let response = f.fetch(url.as_str()).await.unwrap();
        assert!(response.ok());
        let content_type = response.content_type.as_ref().map(|mime| mime.essence_str());
        assert_eq!(content_type, Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let err = fetcher(None)
            .fetch("/definitely/not/here.svg")
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::IoError(_)));
    }

    #[tokio::test]
    async fn test_fetch_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shape.svg"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<svg/>"))
            .mount(&server)
            .await;

        let body = fetcher(None)
            .fetch_text(&format!("{}/shape.svg", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<svg/>");
    }

    #[tokio::test]
    async fn test_fetch_http_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.svg"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.svg"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let f = fetcher(None);
        let err = f
            .fetch(&format!("{}/flaky.svg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE));

        let err = f
            .fetch(&format!("{}/gone.svg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }
}
