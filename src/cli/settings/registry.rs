//! Registry of setting handlers.

use std::collections::HashMap;

use super::handlers::{
    history_limit_handler, max_input_chars_handler, request_timeout_handler, streaming_handler,
    BackendUrlHandler, DataDirHandler, PersonalityHandler, ThemeHandler, TimestampsHandler,
};
use super::SettingHandler;

pub struct SettingRegistry {
    handlers: HashMap<&'static str, Box<dyn SettingHandler>>,
    /// Keys in display order for `samvad set` output.
    display_order: Vec<&'static str>,
}

impl SettingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            display_order: Vec::new(),
        };

        registry.register(Box::new(BackendUrlHandler));
        registry.register(Box::new(streaming_handler()));
        registry.register(Box::new(history_limit_handler()));
        registry.register(Box::new(max_input_chars_handler()));
        registry.register(Box::new(request_timeout_handler()));
        registry.register(Box::new(DataDirHandler));
        registry.register(Box::new(PersonalityHandler));
        registry.register(Box::new(ThemeHandler));
        registry.register(Box::new(TimestampsHandler));

        registry
    }

    fn register(&mut self, handler: Box<dyn SettingHandler>) {
        let key = handler.key();
        self.display_order.push(key);
        self.handlers.insert(key, handler);
    }

    pub fn get(&self, key: &str) -> Option<&dyn SettingHandler> {
        self.handlers.get(key).map(|h| h.as_ref())
    }

    pub fn keys_display_order(&self) -> &[&'static str] {
        &self.display_order
    }
}

impl Default for SettingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
