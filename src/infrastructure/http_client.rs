//! HTTP client for storefront crawling
//!
//! A single reqwest client configured with browser-like headers, gzip/brotli
//! and a cookie store. One call performs one attempt; retries and politeness
//! delays are the crawler's job.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::domain::errors::CatalogError;
use crate::infrastructure::config::{CrawlerConfig, SiteConfig, saphirus};

/// Failure of a single page fetch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to read body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Client errors other than 408/429 will not improve on retry
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } | Self::Body { .. } => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Transport { url, .. }
            | Self::Body { url, .. } => url,
        }
    }

    fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { url: url.to_string() }
        } else if let Some(status) = err.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<FetchError> for CatalogError {
    fn from(err: FetchError) -> Self {
        Self::network(err.url(), err.to_string())
    }
}

/// Source of raw page markup
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page body in a single attempt
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Whether to follow redirects
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: saphirus::USER_AGENT.to_string(),
            accept: saphirus::ACCEPT.to_string(),
            accept_language: saphirus::ACCEPT_LANGUAGE.to_string(),
            follow_redirects: true,
        }
    }
}

impl HttpClientConfig {
    pub fn from_app_config(site: &SiteConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            timeout_seconds: crawler.request_timeout_seconds,
            user_agent: site.user_agent.clone(),
            accept_language: site.accept_language.clone(),
            ..Self::default()
        }
    }
}

/// HTTP client for storefront pages
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&config.accept).context("Invalid Accept header")?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).context("Invalid Accept-Language header")?,
        );

        let redirect_policy = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(redirect_policy)
            .build()
            .context("Failed to build HTTP client")?;

        info!("🌐 HTTP client ready (timeout {}s)", config.timeout_seconds);
        Ok(Self { client, config })
    }

    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        debug!("🌐 HTTP GET: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ HTTP error {}: {}", status, url);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}
