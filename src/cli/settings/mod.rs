//! Settings management for CLI set/unset commands.
//!
//! Each key is served by a [`SettingHandler`]. Application settings live in
//! `config.toml`; chat preferences (personality, theme, timestamps) live in
//! the chat snapshot next to the conversations.

pub mod error;
pub mod handlers;
pub mod helpers;
pub mod registry;


pub use error::SettingError;
pub use registry::SettingRegistry;

use std::path::Path;

use crate::core::config::data::Config;
use crate::core::settings::{ChatConfig, Theme};
use crate::core::store::SharedStore;

/// Where set/unset operations write.
pub struct SetContext<'a> {
    pub config_path: &'a Path,
    pub chat: &'a SharedStore,
}

/// Everything a handler may need to describe its current value.
pub struct CurrentSettings<'a> {
    pub config: &'a Config,
    pub chat: &'a ChatConfig,
    pub theme: Theme,
}

pub trait SettingHandler: Send + Sync {
    fn key(&self) -> &'static str;

    /// Apply `args` (the words after the key) and return the message to show.
    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// Restore the default.
    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// One line for `samvad set` output.
    fn format(&self, current: &CurrentSettings<'_>) -> String;
}

/// Print every key with its value, in registry order.
pub fn describe_all(registry: &SettingRegistry, current: &CurrentSettings<'_>) -> Vec<String> {
    registry
        .keys_display_order()
        .iter()
        .filter_map(|key| registry.get(key))
        .map(|handler| handler.format(current))
        .collect()
}
