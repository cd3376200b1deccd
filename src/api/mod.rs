use serde::{Deserialize, Serialize};

use crate::core::message::Message;

/// Content type the backend uses for incremental responses, and the value the
/// client sends in `Accept` to ask for one.
pub const STREAM_CONTENT_TYPE: &str = "text/stream";

/// Marker that starts every record of the streaming protocol.
pub const STREAM_RECORD_PREFIX: &str = "data:";

pub const RATE_LIMIT_LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<Message>,
    pub personality: String,
}

/// Whole-response envelope. `success = false` always carries `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChatReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ChatEnvelope {
    pub fn reply(content: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(ChatReply {
                content: content.into(),
                timestamp: None,
            }),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// One record of the streaming protocol.
///
/// Content records carry a delta in `content` and the server's running total
/// in `full_content`. Failure records carry `error` and are always terminal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl StreamRecord {
    pub fn delta(content: &str, full_content: &str, is_complete: bool) -> Self {
        Self {
            content: Some(content.to_string()),
            full_content: Some(full_content.to_string()),
            is_complete,
            ..Self::default()
        }
    }

    pub fn failure(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            is_complete: true,
            ..Self::default()
        }
    }

    /// Encode the record as a wire frame: marker, JSON object, blank line.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{STREAM_RECORD_PREFIX} {json}\n\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub gemini: bool,
    #[serde(default)]
    pub database: bool,
    #[serde(default)]
    pub voice: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub services: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    /// The language model credential is the only dependency the front-end
    /// reports on; everything else is informational.
    pub fn needs_setup(&self) -> bool {
        !self.services.gemini
    }
}

/// Out-of-band rate limit metadata attached to every backend response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window resets.
    pub reset: u64,
}

impl RateLimitInfo {
    /// Read the three rate limit headers through `lookup`. Any missing or
    /// unparsable header yields `None`.
    pub fn from_headers<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        let limit = lookup(RATE_LIMIT_LIMIT_HEADER)?.trim().parse().ok()?;
        let remaining = lookup(RATE_LIMIT_REMAINING_HEADER)?.trim().parse().ok()?;
        let reset = lookup(RATE_LIMIT_RESET_HEADER)?.trim().parse().ok()?;
        Some(Self {
            limit,
            remaining,
            reset,
        })
    }

    pub fn header_pairs(&self) -> [(&'static str, String); 3] {
        [
            (RATE_LIMIT_LIMIT_HEADER, self.limit.to_string()),
            (RATE_LIMIT_REMAINING_HEADER, self.remaining.to_string()),
            (RATE_LIMIT_RESET_HEADER, self.reset.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_record_frames_with_marker_and_blank_line() {
        let frame = StreamRecord::delta("Na", "Na", false)
            .to_frame()
            .expect("frame");
        assert_eq!(
            frame,
            "data: {\"content\":\"Na\",\"fullContent\":\"Na\",\"isComplete\":false}\n\n"
        );
    }

    #[test]
    fn failure_record_is_terminal() {
        let record = StreamRecord::failure("boom");
        assert!(record.is_complete);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn envelope_parses_backend_error_with_instructions() {
        let raw = r#"{"success":false,"error":"Gemini API key is not configured.","instructions":"Get your API key"}"#;
        let envelope: ChatEnvelope = serde_json::from_str(raw).expect("parse");
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(
            envelope.error.as_deref(),
            Some("Gemini API key is not configured.")
        );
        assert_eq!(envelope.instructions.as_deref(), Some("Get your API key"));
    }

    #[test]
    fn health_report_tolerates_missing_services() {
        let raw = r#"{"status":"unhealthy","timestamp":"2024-01-01T00:00:00Z","error":"Health check failed"}"#;
        let report: HealthReport = serde_json::from_str(raw).expect("parse");
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.needs_setup());
    }

    #[test]
    fn rate_limit_info_round_trips_through_headers() {
        let info = RateLimitInfo {
            limit: 100,
            remaining: 7,
            reset: 1_700_000_000_000,
        };
        let pairs = info.header_pairs();
        let parsed = RateLimitInfo::from_headers(|name| {
            pairs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        });
        assert_eq!(parsed, Some(info));
    }

    #[test]
    fn rate_limit_info_requires_every_header() {
        let parsed = RateLimitInfo::from_headers(|name| {
            (name == RATE_LIMIT_LIMIT_HEADER).then_some("100")
        });
        assert!(parsed.is_none());
    }
}
