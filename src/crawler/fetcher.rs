//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured identity and proxy
//! - Optional randomized politeness delay before a fetch
//! - Retry with exponential backoff and jitter on transient failures
//! - Error classification (terminal status vs. transient)

use super::decode::decode_html;
use super::scheduler::Pacer;
use crate::config::{NetworkConfig, RetryConfig};
use crate::FetchError;
use rand::Rng;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, Proxy, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// A successfully fetched document
#[derive(Debug, Clone)]
pub struct Document {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// `Content-Type` header, if the server sent one
    pub content_type: Option<String>,

    /// Raw response body
    pub body: Vec<u8>,
}

impl Document {
    /// Body decoded as HTML, honoring header and in-document charsets
    pub fn text(&self) -> String {
        decode_html(&self.body, self.content_type.as_deref())
    }
}

/// Per-call fetch settings
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Wall-clock limit for each attempt
    pub timeout: Duration,

    /// Wait a random politeness delay before the first attempt
    pub polite: bool,
}

impl FetchOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            polite: false,
        }
    }

    pub fn polite(mut self, polite: bool) -> Self {
        self.polite = polite;
        self
    }
}

/// Retry and delay tuning, all durations in seconds
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    min_delay: f64,
    max_delay: f64,
    max_retries: u32,
    backoff_factor: f64,
    jitter_max: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            min_delay: config.min_delay,
            max_delay: config.max_delay,
            max_retries: config.max_retries.max(1),
            backoff_factor: config.backoff_factor,
            jitter_max: config.jitter_max,
        }
    }

    /// Total number of attempts per logical fetch
    pub fn max_attempts(&self) -> u32 {
        self.max_retries
    }

    /// Deterministic part of the wait after failed attempt `attempt` (1-indexed)
    ///
    /// Capped at [`MAX_WAIT`].
    pub fn backoff_base(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        seconds(self.min_delay * self.backoff_factor.powi(exponent))
    }

    /// Full wait after failed attempt `attempt`, jitter included
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base(attempt) + uniform(0.0, self.jitter_max)
    }

    /// Random wait applied before a polite fetch
    pub fn politeness_delay(&self) -> Duration {
        uniform(self.min_delay, self.max_delay)
    }
}

/// Longest single wait the crawler will request
pub const MAX_WAIT: Duration = Duration::from_secs(3600);

/// Converts seconds to a wait, clamped to `0..=MAX_WAIT`
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
}

pub(crate) fn uniform(low: f64, high: f64) -> Duration {
    if high <= low {
        return seconds(low);
    }
    seconds(rand::rng().random_range(low..=high))
}

/// Builds the HTTP client shared by every fetch
///
/// All traffic goes through the configured forward proxy; without one the
/// environment's proxy settings are ignored so routing stays explicit.
pub fn build_http_client(config: &NetworkConfig) -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    let builder = match config.proxy_url() {
        Some(proxy) => builder.proxy(Proxy::all(proxy)?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Returns true for statuses worth another attempt
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// GET with bounded retries
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | 2xx | Return the document |
/// | HTTP 429 | Retry with backoff |
/// | HTTP 5xx | Retry with backoff |
/// | Timeout / connect / body read error | Retry with backoff |
/// | Any other status | Immediate `FetchError::Status` |
///
/// The wait after failed attempt *k* is `min_delay * factor^(k-1)` plus
/// uniform jitter; there is no wait after the final attempt.
pub struct ResilientFetcher {
    client: Client,
    policy: RetryPolicy,
    pacer: Arc<dyn Pacer>,
}

impl ResilientFetcher {
    pub fn new(client: Client, policy: RetryPolicy, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            client,
            policy,
            pacer,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The pacer every wait of this fetcher goes through
    pub fn pacer(&self) -> &dyn Pacer {
        self.pacer.as_ref()
    }

    /// Fetches `url`, retrying transient failures
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<Document, FetchError> {
        if options.polite {
            let wait = self.policy.politeness_delay();
            tracing::debug!(%url, wait_secs = wait.as_secs_f64(), "Politeness delay");
            self.pacer.pause(wait).await;
        }

        let attempts = self.policy.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.client.get(url).timeout(options.timeout).send().await {
                Ok(response) => {
                    let status = response.status();
                    let final_url = response.url().to_string();
                    let content_type = response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);

                    if status.is_success() {
                        match response.bytes().await {
                            Ok(body) => {
                                tracing::debug!(%url, status = status.as_u16(), attempt, bytes = body.len(), "Fetched");
                                return Ok(Document {
                                    url: final_url,
                                    status: status.as_u16(),
                                    content_type,
                                    body: body.to_vec(),
                                });
                            }
                            Err(e) => last_error = e.to_string(),
                        }
                    } else if is_retryable_status(status) {
                        last_error = format!("HTTP {}", status.as_u16());
                    } else {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => {
                    last_error = if e.is_timeout() {
                        "request timeout".to_string()
                    } else {
                        e.to_string()
                    };
                }
            }

            if attempt < attempts {
                let wait = self.policy.backoff(attempt);
                tracing::warn!(
                    %url,
                    attempt,
                    error = %last_error,
                    wait_secs = wait.as_secs_f64(),
                    "Transient fetch failure, backing off"
                );
                self.pacer.pause(wait).await;
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts,
            last: last_error,
        })
    }
}
