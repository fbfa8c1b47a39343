use crate::error::{MailError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_mailbox_id")]
    pub mailbox_id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub drafts: DraftSettings,
    #[serde(default)]
    pub view: ViewSettings,
}

/// How synthesized draft messages are presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftSettings {
    pub sender_name: String,
    pub sender_email: String,
    pub untitled_subject: String,
    pub just_now_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub default_folder: String,
}

fn default_mailbox_id() -> String {
    "primary".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            sender_name: "You".to_string(),
            sender_email: String::new(),
            untitled_subject: "Untitled draft".to_string(),
            just_now_label: "Just now".to_string(),
        }
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            default_folder: "inbox".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox_id: default_mailbox_id(),
            log_level: default_log_level(),
            drafts: DraftSettings::default(),
            view: ViewSettings::default(),
        }
    }
}

impl Config {
    /// Reads `settings.toml` from the working directory, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from("settings.toml").unwrap_or_default()
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MailError::Config(e.to_string()))
    }

    /// `--debug` wins over the configured level; unknown levels mean INFO.
    pub fn tracing_level(&self, debug: bool) -> Level {
        if debug {
            return Level::DEBUG;
        }
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}
