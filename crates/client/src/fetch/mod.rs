//! Network access for the agent.
//!
//! [`Network`] is the seam the router fetches through. A rejected fetch
//! (offline, DNS failure, timeout, oversized body) is an `Err`; any HTTP
//! status, including 404 and 500, is an `Ok` response for the router to judge.
//!
//! [`FetchClient`] is the reqwest-backed implementation:
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable), enforced while the body streams in
//! - Request timeout: 20s (configurable)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header};
use url::Url;

use colorwise_core::{AppConfig, Error, Request, Response, ResponseType};

/// Something that can carry a request to the network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Issue `request`, resolving to the response or rejecting.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "colorwise-sw/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Application origin; responses from elsewhere are typed `cors`.
    pub origin: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "colorwise-sw/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    /// Derive the fetch settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            origin: config.origin_url().ok(),
            ..Self::default()
        }
    }

    fn response_type_for(&self, url: &Url) -> ResponseType {
        match &self.origin {
            Some(origin) if origin.origin() != url.origin() => ResponseType::Cors,
            _ => ResponseType::Basic,
        }
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = request.url();

        let mut response = self
            .http
            .request(request.method().clone(), url.as_str())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{} after {}ms", url, self.config.timeout.as_millis()))
                } else {
                    Error::Network(format!("{}: {}", url, e))
                }
            })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?
        {
            if bytes.len() + chunk.len() > self.config.max_bytes {
                return Err(Error::FetchTooLarge(format!("{} body exceeds {} bytes", url, self.config.max_bytes)));
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes, {})",
            request.method(),
            url,
            final_url,
            start.elapsed().as_millis(),
            bytes.len(),
            headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("-")
        );

        Ok(Response::new(status, bytes)
            .with_type(self.config.response_type_for(&final_url))
            .with_headers(headers))
    }
}
