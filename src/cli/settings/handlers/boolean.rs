//! Boolean setting handlers for on/off settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{
    format_bool, mutate_config, parse_bool, success_set, success_unset,
};
use crate::cli::settings::{CurrentSettings, SetContext, SettingHandler};
use crate::core::config::data::Config;

/// Data-driven handler for boolean (on/off) keys in `config.toml`.
pub struct BooleanHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    default_value: bool,
    get: fn(&Config) -> Option<bool>,
    set_field: fn(&mut Config, Option<bool>),
}

impl SettingHandler for BooleanHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        if args.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        }

        let input = args.join(" ");
        let value = parse_bool(&input).ok_or(SettingError::InvalidBoolean(input))?;
        let set_field = self.set_field;
        mutate_config(ctx.config_path, move |config| set_field(config, Some(value)))?;

        Ok(success_set(self.key, format_bool(value)))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let set_field = self.set_field;
        mutate_config(ctx.config_path, move |config| set_field(config, None))?;
        Ok(success_unset(self.key, format_bool(self.default_value)))
    }

    fn format(&self, current: &CurrentSettings<'_>) -> String {
        match (self.get)(current.config) {
            Some(value) => format!("  {}: {}", self.key, format_bool(value)),
            None => format!(
                "  {}: (unset, default: {})",
                self.key,
                format_bool(self.default_value)
            ),
        }
    }
}

/// Handler for the `streaming` setting.
pub fn streaming_handler() -> BooleanHandler {
    BooleanHandler {
        key: "streaming",
        hint: "To choose between streamed and whole replies, specify on or off:",
        example: "samvad set streaming off",
        default_value: true,
        get: |c| c.streaming,
        set_field: |c, v| c.streaming = v,
    }
}
