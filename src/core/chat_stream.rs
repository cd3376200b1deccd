//! HTTP transport between the orchestrator and the chat backend.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use crate::api::{ChatRequest, HealthReport, RateLimitInfo, STREAM_CONTENT_TYPE};
use crate::core::config::data::Config;
use crate::core::stream_decoder::ByteStream;
use crate::utils::url::{construct_api_url, CHAT_ENDPOINT, HEALTH_ENDPOINT};

const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
const CONNECT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug)]
pub enum TransportError {
    Http(reqwest::Error),
    Decode(serde_json::Error),
    Interrupted(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Http(err) => write!(f, "Request failed: {err}"),
            TransportError::Decode(err) => write!(f, "Unexpected response from backend: {err}"),
            TransportError::Interrupted(reason) => write!(f, "Response interrupted: {reason}"),
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TransportError::Http(err) => Some(err),
            TransportError::Decode(err) => Some(err),
            TransportError::Interrupted(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err)
    }
}

pub enum ResponseBody {
    /// Incremental body in the record protocol, still being received.
    Stream(ByteStream),
    /// Whole body, read to the end.
    Text(String),
}

pub struct BackendResponse {
    pub status: u16,
    pub rate_limit: Option<RateLimitInfo>,
    pub body: ResponseBody,
}

impl BackendResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            rate_limit: None,
            body: ResponseBody::Text(body.into()),
        }
    }

    pub fn stream(status: u16, body: ByteStream) -> Self {
        Self {
            status,
            rate_limit: None,
            body: ResponseBody::Stream(body),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimitInfo>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to send one chat request. The orchestrator only talks to the
/// backend through this seam.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request`, asking for an incremental body when `stream` is set.
    /// The backend may still answer with a whole JSON envelope.
    async fn send_chat(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<BackendResponse, TransportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, TransportError> {
        // Streamed bodies have no overall deadline, but each read must make
        // progress within the request timeout.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
            .read_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            request_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::new(config.backend_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the backend whether its model credential is configured. An
    /// unhealthy backend answers 503 with the same JSON body.
    pub async fn check_health(&self) -> Result<HealthReport, TransportError> {
        let url = construct_api_url(&self.base_url, HEALTH_ENDPOINT);
        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "health check answered");
        serde_json::from_str(&body).map_err(TransportError::Decode)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send_chat(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<BackendResponse, TransportError> {
        let url = construct_api_url(&self.base_url, CHAT_ENDPOINT);
        let mut builder = self.client.post(url).json(request);
        builder = if stream {
            builder.header(ACCEPT, STREAM_CONTENT_TYPE)
        } else {
            // A streamed body may legitimately outlive the request timeout.
            builder.timeout(self.request_timeout)
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers();
        let rate_limit = RateLimitInfo::from_headers(|name| {
            headers.get(name).and_then(|value| value.to_str().ok())
        });
        let is_stream = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(is_stream_content_type);
        debug!(status, is_stream, "chat response received");

        let response = if is_stream {
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::Http))
                .boxed();
            BackendResponse::stream(status, body)
        } else {
            BackendResponse::text(status, response.text().await?)
        };
        Ok(response.with_rate_limit(rate_limit))
    }
}

fn is_stream_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == STREAM_CONTENT_TYPE || essence == EVENT_STREAM_CONTENT_TYPE
}

/// Pull a readable error out of a backend error body: `error` as a string or
/// as an object with `message`, then a top-level `message`.
pub fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}
