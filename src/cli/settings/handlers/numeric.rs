//! Whole-number settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mutate_config, success_set, success_unset};
use crate::cli::settings::{CurrentSettings, SetContext, SettingHandler};
use crate::core::config::data::{Config, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::core::orchestrator::{DEFAULT_HISTORY_LIMIT, MAX_INPUT_CHARS};

pub struct NumberHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    min: u64,
    default_value: u64,
    get: fn(&Config) -> Option<u64>,
    set_field: fn(&mut Config, Option<u64>),
}

impl NumberHandler {
    fn parse(&self, input: &str) -> Result<u64, SettingError> {
        input
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|value| *value >= self.min)
            .ok_or_else(|| SettingError::InvalidNumber {
                key: self.key,
                input: input.to_string(),
                min: self.min,
            })
    }
}

impl SettingHandler for NumberHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let [input] = args else {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        };
        let value = self.parse(input)?;
        let set_field = self.set_field;
        mutate_config(ctx.config_path, move |config| set_field(config, Some(value)))?;
        Ok(success_set(self.key, &value.to_string()))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let set_field = self.set_field;
        mutate_config(ctx.config_path, move |config| set_field(config, None))?;
        Ok(success_unset(self.key, &self.default_value.to_string()))
    }

    fn format(&self, current: &CurrentSettings<'_>) -> String {
        match (self.get)(current.config) {
            Some(value) => format!("  {}: {value}", self.key),
            None => format!("  {}: (unset, default: {})", self.key, self.default_value),
        }
    }
}

fn to_u64(value: Option<usize>) -> Option<u64> {
    value.and_then(|value| u64::try_from(value).ok())
}

fn to_usize(value: Option<u64>) -> Option<usize> {
    value.and_then(|value| usize::try_from(value).ok())
}

/// Handler for `history-limit`: earlier messages sent with each request.
pub fn history_limit_handler() -> NumberHandler {
    NumberHandler {
        key: "history-limit",
        hint: "To change how many earlier messages travel with a request, give a number:",
        example: "samvad set history-limit 20",
        min: 0,
        default_value: DEFAULT_HISTORY_LIMIT as u64,
        get: |c| to_u64(c.history_limit),
        set_field: |c, v| c.history_limit = to_usize(v),
    }
}

pub fn max_input_chars_handler() -> NumberHandler {
    NumberHandler {
        key: "max-input-chars",
        hint: "To change the longest message you can send, give a number of characters:",
        example: "samvad set max-input-chars 2000",
        min: 1,
        default_value: MAX_INPUT_CHARS as u64,
        get: |c| to_u64(c.max_input_chars),
        set_field: |c, v| c.max_input_chars = to_usize(v),
    }
}

pub fn request_timeout_handler() -> NumberHandler {
    NumberHandler {
        key: "request-timeout",
        hint: "To change the timeout for whole (non-streamed) replies, give seconds:",
        example: "samvad set request-timeout 120",
        min: 1,
        default_value: DEFAULT_REQUEST_TIMEOUT_SECS,
        get: |c| c.request_timeout_secs,
        set_field: |c, v| c.request_timeout_secs = v,
    }
}
