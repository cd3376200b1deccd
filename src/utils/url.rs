//! URL utilities for consistent URL handling
//!
//! Backend endpoints are joined onto a configurable base URL, which users
//! often write with a trailing slash.

pub const CHAT_ENDPOINT: &str = "api/chat";
pub const HEALTH_ENDPOINT: &str = "api/health";

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use samvad::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:3000"), "http://localhost:3000");
/// assert_eq!(normalize_base_url("http://localhost:3000///"), "http://localhost:3000");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use samvad::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:3000/", "/api/chat"),
///     "http://localhost:3000/api/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://chat.example.com"),
            "https://chat.example.com"
        );
        assert_eq!(
            normalize_base_url(" https://chat.example.com/ "),
            "https://chat.example.com"
        );
        // Path prefixes survive, only the trailing slashes go.
        assert_eq!(
            normalize_base_url("https://example.com/samvad//"),
            "https://example.com/samvad"
        );
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("http://localhost:3000", CHAT_ENDPOINT),
            "http://localhost:3000/api/chat"
        );
        assert_eq!(
            construct_api_url("https://example.com/samvad/", HEALTH_ENDPOINT),
            "https://example.com/samvad/api/health"
        );
    }
}
