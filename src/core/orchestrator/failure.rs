use chrono::{DateTime, Local, Utc};

use crate::api::RateLimitInfo;

const API_KEY_GUIDE: &str = "1. Get your free API key from https://aistudio.google.com/
2. Add it to the backend's .env.local file:
   GEMINI_API_KEY=your_key_here
3. Restart the backend server
4. Try sending a message again";

/// Known causes of a failed turn, each with its own guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingApiKey,
    InvalidApiKey,
    QuotaExceeded,
    RateLimited,
    Generic,
}

impl FailureKind {
    /// Classify from the backend's error text and, when there was one, the
    /// HTTP status. Text wins over status: the backend reports quota
    /// exhaustion with a 429 as well.
    pub fn classify(detail: &str, status: Option<u16>) -> Self {
        let detail = detail.to_ascii_lowercase();
        if detail.contains("api_key_invalid")
            || detail.contains("invalid api key")
            || status == Some(401)
        {
            FailureKind::InvalidApiKey
        } else if detail.contains("api key") {
            FailureKind::MissingApiKey
        } else if detail.contains("quota") {
            FailureKind::QuotaExceeded
        } else if detail.contains("rate limit") || status == Some(429) {
            FailureKind::RateLimited
        } else {
            FailureKind::Generic
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FailureKind::MissingApiKey => "missing-api-key",
            FailureKind::InvalidApiKey => "invalid-api-key",
            FailureKind::QuotaExceeded => "quota-exceeded",
            FailureKind::RateLimited => "rate-limited",
            FailureKind::Generic => "generic",
        }
    }

    /// The user-facing text of the error message appended for this failure.
    pub fn remediation(self, detail: &str, rate_limit: Option<RateLimitInfo>) -> String {
        match self {
            FailureKind::MissingApiKey => format!(
                "API Key Error: The backend's Gemini API key is not configured.\n\n{API_KEY_GUIDE}"
            ),
            FailureKind::InvalidApiKey => format!(
                "Invalid API Key: The backend rejected its Gemini API key.\n\n{API_KEY_GUIDE}"
            ),
            FailureKind::QuotaExceeded => {
                "API Quota Exceeded: You've reached your Gemini API usage limit.\n\n\
                 Please check your API usage in the Google AI Studio dashboard."
                    .to_string()
            }
            FailureKind::RateLimited => {
                let mut text = "Rate Limit Reached: Please wait a moment before sending more messages.\n\n\
                                This helps prevent overloading the system."
                    .to_string();
                if let Some(reset) = rate_limit.and_then(|info| reset_time(info.reset)) {
                    text.push_str(&format!(" The limit resets at {reset}."));
                }
                text
            }
            FailureKind::Generic => {
                let detail = detail.trim();
                if detail.is_empty() {
                    "Something went wrong while getting a reply. Please try again.".to_string()
                } else {
                    format!("Something went wrong: {detail}\n\nPlease try again.")
                }
            }
        }
    }
}

fn reset_time(reset_ms: u64) -> Option<String> {
    let reset = DateTime::<Utc>::from_timestamp_millis(i64::try_from(reset_ms).ok()?)?;
    Some(reset.with_timezone(&Local).format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_backend_messages() {
        let cases = [
            (
                "Gemini API key is not configured. Please add your API key to the .env.local file.",
                Some(500),
                FailureKind::MissingApiKey,
            ),
            (
                "Invalid API key. Please check your Gemini API key in the .env.local file.",
                Some(401),
                FailureKind::InvalidApiKey,
            ),
            ("[400] API_KEY_INVALID", None, FailureKind::InvalidApiKey),
            (
                "API quota exceeded. Please check your Gemini API usage limits.",
                Some(429),
                FailureKind::QuotaExceeded,
            ),
            (
                "Rate limit exceeded. Please try again later.",
                Some(429),
                FailureKind::RateLimited,
            ),
            ("Too many requests", Some(429), FailureKind::RateLimited),
            ("HTTP error! status: 502", Some(502), FailureKind::Generic),
            ("connection refused", None, FailureKind::Generic),
        ];
        for (detail, status, expected) in cases {
            assert_eq!(FailureKind::classify(detail, status), expected, "{detail}");
        }
    }

    #[test]
    fn each_kind_has_distinct_guidance() {
        let texts: Vec<String> = [
            FailureKind::MissingApiKey,
            FailureKind::InvalidApiKey,
            FailureKind::QuotaExceeded,
            FailureKind::RateLimited,
            FailureKind::Generic,
        ]
        .into_iter()
        .map(|kind| kind.remediation("boom", None))
        .collect();

        for (index, text) in texts.iter().enumerate() {
            assert!(texts[index + 1..].iter().all(|other| other != text));
        }
        assert!(texts[0].contains("aistudio.google.com"));
        assert!(texts[3].starts_with("Rate Limit Reached"));
        assert!(texts[4].contains("boom"));
    }

    #[test]
    fn rate_limit_guidance_mentions_reset_when_known() {
        let info = RateLimitInfo {
            limit: 100,
            remaining: 0,
            reset: 1_700_000_000_000,
        };
        let text = FailureKind::RateLimited.remediation("", Some(info));
        assert!(text.contains("The limit resets at"));
    }
}
