//! JSON-over-HTTP client for the remote graph and trace data service.
//!
//! ## Endpoints
//!
//! - `GET {endpoint}/graph?startTime=..&endTime=..&region=..` returns a
//!   service graph
//! - `GET {endpoint}/traces?startTime=..&endTime=..&region=..&filterExpression=..[&nextToken=..]`
//!   returns one page of trace summaries
//!
//! Timeouts, connection failures, 429 and 5xx responses are retried with
//! exponential backoff plus random jitter.
//!
//! ## Example
//!
//! ```rust,no_run
//! use scatter_adapters::http::HttpSource;
//! use scatter_types::{GraphSource, TimeRange};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpSource::builder()
//!         .endpoint("http://localhost:2000")
//!         .region("eu-west-1")
//!         .build()?;
//!
//!     let graph = source.service_graph(TimeRange::new(1_700_000_000, 1_700_000_060))?;
//!     println!("{} services", graph.services.len());
//!     Ok(())
//! }
//! ```

use std::thread;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use scatter_types::{GraphSource, ServiceGraph, TimeRange, TracePage, TraceQuery, TraceSource};

use crate::AdapterError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:2000";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_RETRY_LIMIT: u32 = 6;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

/// How failed requests are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub limit: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RETRY_LIMIT,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (starting at 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self
            .backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let ceiling = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=ceiling);
        base.saturating_add(Duration::from_millis(jitter))
    }
}

/// Graph and trace source backed by the HTTP data service.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: String,
    region: String,
    retry: RetryPolicy,
}

impl HttpSource {
    /// Create a new builder for configuring the source.
    pub fn builder() -> HttpSourceBuilder {
        HttpSourceBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn range_query(&self, range: TimeRange) -> Vec<(&'static str, String)> {
        vec![
            ("startTime", range.start.to_string()),
            ("endTime", range.end.to_string()),
            ("region", self.region.clone()),
        ]
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, AdapterError> {
        let url = self.url(path);
        let mut attempt = 0;

        loop {
            match self.send(&url, query) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.limit => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(
                        attempt,
                        limit = self.retry.limit,
                        delay_ms = delay.as_millis() as u64,
                        "request to {} failed, retrying: {}",
                        url,
                        err
                    );
                    thread::sleep(delay);
                }
                Err(err) if err.is_retryable() && attempt > 0 => {
                    return Err(AdapterError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(err),
                    })
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, AdapterError> {
        debug!(url, "sending request");
        let response = self.client.get(url).query(query).send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(AdapterError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl GraphSource for HttpSource {
    type Error = AdapterError;

    fn service_graph(&self, range: TimeRange) -> Result<ServiceGraph, Self::Error> {
        self.get("graph", &self.range_query(range))
    }

    fn region(&self) -> &str {
        &self.region
    }
}

impl TraceSource for HttpSource {
    type Error = AdapterError;

    fn trace_summaries(&self, query: &TraceQuery) -> Result<TracePage, Self::Error> {
        let mut params = self.range_query(query.range);
        params.push(("filterExpression", query.filter_expression.clone()));
        if let Some(token) = &query.next_token {
            params.push(("nextToken", token.clone()));
        }
        self.get("traces", &params)
    }

    fn region(&self) -> &str {
        &self.region
    }
}

/// Builder for HttpSource.
#[derive(Debug, Default)]
pub struct HttpSourceBuilder {
    endpoint: Option<String>,
    region: Option<String>,
    timeout: Option<Duration>,
    retry_limit: Option<u32>,
    backoff: Option<Duration>,
}

impl HttpSourceBuilder {
    /// Set the data service endpoint (default: "http://localhost:2000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the region to query (default: "us-east-1").
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the per-request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the number of retries after the first attempt (default: 6).
    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    /// Set the initial retry backoff (default: 200ms).
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Build the source.
    pub fn build(self) -> Result<HttpSource, AdapterError> {
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(HttpSource {
            client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            region: self.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            retry: RetryPolicy {
                limit: self.retry_limit.unwrap_or(DEFAULT_RETRY_LIMIT),
                backoff: self.backoff.unwrap_or(DEFAULT_BACKOFF),
            },
        })
    }
}
