//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests to fetch page content
//! - Surfacing redirects instead of following them, and following them on
//!   request for detail pages
//! - Error classification

use crate::config::FetcherConfig;
use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Redirect hops followed for one detail page
pub const MAX_REDIRECTS: usize = 5;

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// URL the body was served from
        final_url: String,
        /// HTTP status code
        status: u16,
        /// Page body content
        body: String,
    },

    /// The server answered with a 3xx; the redirect was not followed
    Redirect {
        /// The HTTP status code
        status: u16,
        /// Location header, if any
        location: Option<String>,
    },

    /// Any other non-success status
    HttpError {
        /// The HTTP status code
        status: u16,
    },

    /// Network error (connection refused, timeout, body read failure)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Consumes the result, keeping the body of a successful fetch
    pub fn into_document(self) -> Option<String> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Target of a redirect, if the server sent one
    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location, .. } => location.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of the response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. }
            | Self::Redirect { status, .. }
            | Self::HttpError { status } => Some(*status),
            Self::NetworkError { .. } => None,
        }
    }
}

/// Source of pages for the crawler
///
/// Implementations never fail: every outcome, including transport errors, is
/// a [`FetchResult`] the caller decides how to treat.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> FetchResult {
        (**self).fetch(url).await
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled so that a 3xx reaches the caller, where it marks
/// the end of a price band.
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use rent_trawl::config::FetcherConfig;
/// use rent_trawl::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the response
///
/// | Response | Result |
/// |----------|--------|
/// | 2xx | `Success` with the body |
/// | 3xx | `Redirect` with the `Location` header |
/// | 4xx, 5xx | `HttpError` |
/// | Timeout, connect or body error | `NetworkError` |
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                e.to_string()
            };
            return FetchResult::NetworkError { error };
        }
    };

    let status = response.status();

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        return FetchResult::Redirect {
            status: status.as_u16(),
            location,
        };
    }

    if !status.is_success() {
        return FetchResult::HttpError {
            status: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status: status.as_u16(),
            body,
        },
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
        },
    }
}

/// Fetches `url` and follows up to `max_hops` redirects
///
/// Every hop goes back through `fetcher`, so politeness applies to each
/// request. A relative `Location` is resolved against the URL that sent it.
/// When the hops run out, or a redirect has no usable `Location`, the last
/// redirect is returned.
pub async fn fetch_following<F>(fetcher: &F, url: &str, max_hops: usize) -> FetchResult
where
    F: PageFetcher + ?Sized,
{
    let mut current = url.to_string();
    let mut result = fetcher.fetch(&current).await;

    for _ in 0..max_hops {
        let Some(location) = result.redirect_location() else {
            break;
        };
        let next = match Url::parse(&current).and_then(|base| base.join(location)) {
            Ok(next) => next.to_string(),
            Err(e) => {
                tracing::debug!("Unusable redirect from {} to {}: {}", current, location, e);
                break;
            }
        };

        tracing::debug!("Following redirect {} -> {}", current, next);
        current = next;
        result = fetcher.fetch(&current).await;
    }

    result
}

/// [`PageFetcher`] backed by a reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let result = fetch_url(&self.client, url).await;
        tracing::debug!("GET {} -> {:?}", url, result.status());
        result
    }
}
