//! HTTP request layer abstraction for testability.
//!
//! Every network access made by the probe and the transfer engines goes
//! through [`HttpSource`], so tests can substitute an in-memory source and
//! observe exactly which byte ranges were requested.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};

use crate::error::{FetchError, FetchResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Metadata returned by a HEAD request.
#[derive(Debug, Clone, Default)]
pub struct HeadInfo {
    pub status: u16,
    pub content_length: Option<u64>,
    pub accept_ranges: Option<String>,
    pub content_range: Option<String>,
}

/// A fully buffered response to a ranged GET.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub status: u16,
    pub content_range: Option<String>,
    pub body: Vec<u8>,
}

/// A streaming response to an unbounded GET.
pub struct StreamResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for the HTTP operations the download engine needs.
///
/// Implementations return the raw status; interpreting it is the caller's
/// job, because a 200 means different things to the probe and to a window
/// request.
pub trait HttpSource: Send + Sync {
    /// Issue a metadata-only request.
    fn head(&self, url: &str) -> FetchResult<HeadInfo>;

    /// Request the inclusive byte span `start..=end` and buffer the body.
    fn get_range(&self, url: &str, start: u64, end: u64) -> FetchResult<RangeResponse>;

    /// Request the whole resource as a stream.
    fn get(&self, url: &str) -> FetchResult<StreamResponse>;

    /// Request timeout in seconds, reported in `Timeout` errors raised while
    /// reading a streamed body.
    fn timeout_secs(&self) -> u64 {
        0
    }
}

/// Real HTTP source using the blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestSource {
    client: Client,
    timeout: Duration,
}

impl ReqwestSource {
    /// Create a source with the given request timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                FetchError::InvalidConfig(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, timeout })
    }

    /// Request timeout applied to every call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send(&self, url: &str, request: RequestBuilder) -> FetchResult<Response> {
        request.send().map_err(|e| self.map_error(url, e))
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

fn header_string(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

fn header_u64(response: &Response, name: reqwest::header::HeaderName) -> Option<u64> {
    header_string(response, name).and_then(|s| s.parse::<u64>().ok())
}

impl HttpSource for ReqwestSource {
    fn head(&self, url: &str) -> FetchResult<HeadInfo> {
        let response = self.send(url, self.client.head(url))?;

        Ok(HeadInfo {
            status: response.status().as_u16(),
            content_length: header_u64(&response, CONTENT_LENGTH),
            accept_ranges: header_string(&response, ACCEPT_RANGES),
            content_range: header_string(&response, CONTENT_RANGE),
        })
    }

    fn get_range(&self, url: &str, start: u64, end: u64) -> FetchResult<RangeResponse> {
        let request = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-{}", start, end));
        let response = self.send(url, request)?;

        let status = response.status().as_u16();
        let content_range = header_string(&response, CONTENT_RANGE);
        let body = response
            .bytes()
            .map_err(|e| self.map_error(url, e))?
            .to_vec();

        Ok(RangeResponse {
            status,
            content_range,
            body,
        })
    }

    fn get(&self, url: &str) -> FetchResult<StreamResponse> {
        let response = self.send(url, self.client.get(url))?;

        Ok(StreamResponse {
            status: response.status().as_u16(),
            content_length: header_u64(&response, CONTENT_LENGTH),
            body: Box::new(response),
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}
