//! Free-text settings.

use std::path::PathBuf;

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{joined_value, mutate_config, success_set, success_unset};
use crate::cli::settings::{CurrentSettings, SetContext, SettingHandler};
use crate::core::config::data::{path_display, DEFAULT_BACKEND_URL};
use crate::utils::url::normalize_base_url;

/// Handler for the `backend-url` setting.
pub struct BackendUrlHandler;

impl SettingHandler for BackendUrlHandler {
    fn key(&self) -> &'static str {
        "backend-url"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = joined_value(
            args,
            "To point samvad at another backend, give its base URL:",
            "samvad set backend-url https://chat.example.com",
        )?;
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(SettingError::InvalidChoice(format!(
                "Backend URL must start with http:// or https://, got: {value}"
            )));
        }
        let url = normalize_base_url(&value);
        let message = success_set(self.key(), &url);
        mutate_config(ctx.config_path, move |config| config.backend_url = Some(url))?;
        Ok(message)
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        mutate_config(ctx.config_path, |config| config.backend_url = None)?;
        Ok(success_unset(self.key(), DEFAULT_BACKEND_URL))
    }

    fn format(&self, current: &CurrentSettings<'_>) -> String {
        match &current.config.backend_url {
            Some(url) => format!("  backend-url: {url}"),
            None => format!("  backend-url: (unset, default: {DEFAULT_BACKEND_URL})"),
        }
    }
}

/// Handler for the `data-dir` setting.
pub struct DataDirHandler;

impl SettingHandler for DataDirHandler {
    fn key(&self) -> &'static str {
        "data-dir"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = joined_value(
            args,
            "To keep conversations somewhere else, give a directory:",
            "samvad set data-dir ~/samvad-data",
        )?;
        let dir = PathBuf::from(value);
        let message = success_set(self.key(), &path_display(&dir));
        mutate_config(ctx.config_path, move |config| config.data_dir = Some(dir))?;
        Ok(message)
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        mutate_config(ctx.config_path, |config| config.data_dir = None)?;
        Ok(success_unset(self.key(), "platform data directory"))
    }

    fn format(&self, current: &CurrentSettings<'_>) -> String {
        match &current.config.data_dir {
            Some(dir) => format!("  data-dir: {}", path_display(dir)),
            None => "  data-dir: (unset, default: platform data directory)".to_string(),
        }
    }
}
