//! Shared HTTP client for the WebTRIS API
//!
//! One client is built per run and reused by the catalog resolver and all
//! three download phases. Its connection pool is sized to the worker count
//! and transport failures are retried a fixed number of times before being
//! surfaced; callers never retry on top of that.

use crate::config::ScraperConfig;
use crate::constants::{IDENTIFYING_HEADER_NAME, IDENTIFYING_HEADER_VALUE};
use crate::error::{Result, ScraperError};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A completed HTTP exchange, whatever its status
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub url: String,
    pub status: StatusCode,
    pub body: Vec<u8>,
    /// Time from sending the request to receiving the full body
    pub elapsed: Duration,
}

impl FetchedResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }
}

/// WebTRIS client with connection reuse and transport-level retries
#[derive(Debug, Clone)]
pub struct WebTrisClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl WebTrisClient {
    /// Build the shared client with a connection pool of `pool_size` per host
    pub fn new(config: &ScraperConfig, pool_size: usize) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(IDENTIFYING_HEADER_NAME),
            HeaderValue::from_static(IDENTIFYING_HEADER_VALUE),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(pool_size.max(1))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ScraperError::configuration(format!("failed to build HTTP client: {}", e)))?;

        debug!(
            "HTTP client ready: base={}, pool={}, retries={}",
            config.api_base_url, pool_size, config.max_transport_retries
        );

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_transport_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sites_url(&self) -> String {
        format!("{}/sites", self.base_url)
    }

    /// GET `url`, retrying transport failures up to the configured limit.
    ///
    /// Any HTTP status counts as a completed exchange; only connection-level
    /// failures (including a body that could not be read) are retried.
    pub async fn get(&self, url: &str) -> Result<FetchedResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_get(url).await {
                Ok(response) => return Ok(response),
                Err(source) if attempt <= self.max_retries => {
                    warn!(
                        "Transport failure on attempt {} for {}: {}; retrying",
                        attempt, url, source
                    );
                }
                Err(source) => {
                    return Err(ScraperError::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    async fn try_get(&self, url: &str) -> std::result::Result<FetchedResponse, reqwest::Error> {
        let started = Instant::now();
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.bytes().await?;

        Ok(FetchedResponse {
            url: final_url,
            status,
            body: body.to_vec(),
            elapsed: started.elapsed(),
        })
    }
}
