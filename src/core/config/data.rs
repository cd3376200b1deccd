use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::orchestrator::{DEFAULT_HISTORY_LIMIT, MAX_INPUT_CHARS};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Application settings stored in `config.toml`. Every key is optional; the
/// accessors fall back to the built-in defaults.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    pub backend_url: Option<String>,
    pub streaming: Option<bool>,
    pub history_limit: Option<usize>,
    pub max_input_chars: Option<usize>,
    /// Directory holding the chat and auth snapshots.
    pub data_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn backend_url(&self) -> &str {
        self.backend_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
    }

    pub fn streaming_enabled(&self) -> bool {
        self.streaming.unwrap_or(true)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    /// Zero would reject every message, so it is treated as unset.
    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
            .filter(|limit| *limit > 0)
            .unwrap_or(MAX_INPUT_CHARS)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Apply `SAMVAD_BACKEND_URL` and `SAMVAD_DATA_DIR` through `lookup`.
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.backend_url = Some(url);
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|value| !value.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }
}

pub const BACKEND_URL_ENV: &str = "SAMVAD_BACKEND_URL";
pub const DATA_DIR_ENV: &str = "SAMVAD_DATA_DIR";

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.local/share/samvad/chat-store.json` → `~/.local/share/samvad/chat-store.json`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
