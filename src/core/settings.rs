//! User-facing chat preferences persisted alongside conversations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}' (expected light or dark)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityMode {
    Formal,
    Casual,
    Humorous,
    #[default]
    Helpful,
}

impl PersonalityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PersonalityMode::Formal => "formal",
            PersonalityMode::Casual => "casual",
            PersonalityMode::Humorous => "humorous",
            PersonalityMode::Helpful => "helpful",
        }
    }
}

impl fmt::Display for PersonalityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonalityMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "formal" => Ok(PersonalityMode::Formal),
            "casual" => Ok(PersonalityMode::Casual),
            "humorous" => Ok(PersonalityMode::Humorous),
            "helpful" => Ok(PersonalityMode::Helpful),
            other => Err(format!(
                "unknown personality '{other}' (expected formal, casual, humorous, or helpful)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    Concise,
    Detailed,
    #[default]
    Conversational,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyLanguage {
    En,
    Hi,
    #[default]
    Hinglish,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personality {
    #[serde(default)]
    pub mode: PersonalityMode,
    #[serde(default)]
    pub response_style: ResponseStyle,
    #[serde(default)]
    pub language: ReplyLanguage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSettings {
    pub is_enabled: bool,
    pub language: ReplyLanguage,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            is_enabled: false,
            language: ReplyLanguage::Hinglish,
            rate: 1.0,
            pitch: 1.0,
            volume: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    pub max_messages: usize,
    pub auto_scroll: bool,
    pub show_timestamps: bool,
    pub enable_voice: bool,
    pub personality: Personality,
    pub voice_settings: VoiceSettings,
    pub animation_speed: AnimationSpeed,
    pub voice_language: String,
    pub auto_submit_voice: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_messages: 1000,
            auto_scroll: true,
            show_timestamps: true,
            enable_voice: false,
            personality: Personality::default(),
            voice_settings: VoiceSettings::default(),
            animation_speed: AnimationSpeed::Normal,
            voice_language: "en-US".to_string(),
            auto_submit_voice: false,
        }
    }
}
