//! Preferences stored with the conversations rather than in `config.toml`.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{
    format_bool, joined_value, parse_bool, success_set, success_unset,
};
use crate::cli::settings::{CurrentSettings, SetContext, SettingHandler};
use crate::core::settings::{ChatConfig, PersonalityMode, Theme};

/// Handler for `personality`, the tone requested from the backend.
pub struct PersonalityHandler;

impl SettingHandler for PersonalityHandler {
    fn key(&self) -> &'static str {
        "personality"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = joined_value(
            args,
            "To change the reply tone, choose formal, casual, humorous, or helpful:",
            "samvad set personality casual",
        )?;
        let mode: PersonalityMode = value.parse().map_err(SettingError::InvalidChoice)?;
        ctx.chat
            .with(|store| store.update_config(|config| config.personality.mode = mode));
        Ok(success_set(self.key(), mode.as_str()))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let mode = PersonalityMode::default();
        ctx.chat
            .with(|store| store.update_config(|config| config.personality.mode = mode));
        Ok(success_unset(self.key(), mode.as_str()))
    }

    fn format(&self, current: &CurrentSettings<'_>) -> String {
        format!("  personality: {}", current.chat.personality.mode)
    }
}

pub struct ThemeHandler;

impl SettingHandler for ThemeHandler {
    fn key(&self) -> &'static str {
        "theme"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = joined_value(
            args,
            "To set a theme, choose light or dark:",
            "samvad set theme dark",
        )?;
        let theme: Theme = value.parse().map_err(SettingError::InvalidChoice)?;
        ctx.chat.with(|store| store.set_theme(theme));
        Ok(success_set(self.key(), theme.as_str()))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let theme = Theme::default();
        ctx.chat.with(|store| store.set_theme(theme));
        Ok(success_unset(self.key(), theme.as_str()))
    }

    fn format(&self, current: &CurrentSettings<'_>) -> String {
        format!("  theme: {}", current.theme)
    }
}

/// Handler for `timestamps`: whether transcripts show message times.
pub struct TimestampsHandler;

impl SettingHandler for TimestampsHandler {
    fn key(&self) -> &'static str {
        "timestamps"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        if args.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: "To show or hide message times, specify on or off:",
                example: "samvad set timestamps off",
            });
        }
        let input = args.join(" ");
        let value = parse_bool(&input).ok_or(SettingError::InvalidBoolean(input))?;
        ctx.chat
            .with(|store| store.update_config(|config| config.show_timestamps = value));
        Ok(success_set(self.key(), format_bool(value)))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = ChatConfig::default().show_timestamps;
        ctx.chat
            .with(|store| store.update_config(|config| config.show_timestamps = value));
        Ok(success_unset(self.key(), format_bool(value)))
    }

    fn format(&self, current: &CurrentSettings<'_>) -> String {
        format!("  timestamps: {}", format_bool(current.chat.show_timestamps))
    }
}
