//! Error types for settings operations.

use std::fmt;

#[derive(Debug)]
pub enum SettingError {
    UnknownKey(String),
    /// The value could not be parsed as a boolean.
    InvalidBoolean(String),
    InvalidNumber {
        key: &'static str,
        input: String,
        min: u64,
    },
    /// The value is not one of the accepted names.
    InvalidChoice(String),
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
    /// Persisting the configuration failed.
    ConfigError(String),
}

impl SettingError {
    /// Print the error message to stderr with appropriate formatting.
    pub fn print(&self) {
        match self {
            SettingError::UnknownKey(key) => {
                eprintln!("❌ Unknown config key: {key}");
                eprintln!("   Run 'samvad set' to list the available keys.");
            }
            SettingError::InvalidBoolean(input) => {
                eprintln!("❌ Invalid boolean value: {input}");
                eprintln!("   Use 'on' or 'off' (also accepts true/false, yes/no)");
            }
            SettingError::InvalidNumber { key, input, min } => {
                eprintln!("❌ Invalid value for {key}: {input}");
                eprintln!("   Expected a whole number of at least {min}");
            }
            SettingError::InvalidChoice(message) => {
                eprintln!("❌ {message}");
            }
            SettingError::MissingArgs { hint, example } => {
                eprintln!("⚠️  {hint}");
                eprintln!("Example: {example}");
            }
            SettingError::ConfigError(msg) => {
                eprintln!("❌ Failed to save configuration: {msg}");
            }
        }
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::InvalidBoolean(input) => write!(f, "Invalid boolean value: {input}"),
            SettingError::InvalidNumber { key, input, .. } => {
                write!(f, "Invalid value for {key}: {input}")
            }
            SettingError::InvalidChoice(message) => write!(f, "{message}"),
            SettingError::MissingArgs { hint, .. } => write!(f, "{hint}"),
            SettingError::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for SettingError {}
