use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{InsureChatError, Result};

/// Top-level configuration for the Insurance Chat application.
///
/// Loaded from `~/.insurechat/config.toml` by default. Every section falls
/// back to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsureChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

impl InsureChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: InsureChatConfig = toml::from_str(&content)?;
        config.model.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite message store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.insurechat/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Resolve `data_dir`, expanding a leading `~` to the home directory.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

/// Which LLM provider backs the AI reply path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// No provider: every reply comes from the knowledge base.
    #[default]
    None,
    /// Offline provider that answers from canned text.
    Mock,
}

/// LLM request settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Route replies through the LLM provider when one is available.
    pub use_ai: bool,
    pub provider: ProviderKind,
    /// Upper bound on a single provider call; 0 disables the timeout.
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 200,
            use_ai: true,
            provider: ProviderKind::None,
            request_timeout_secs: 30,
        }
    }
}

impl ModelConfig {
    /// Apply caller overrides field by field over this configuration.
    pub fn merged(&self, overrides: &ModelOverrides) -> Self {
        Self {
            model: overrides.model.clone().unwrap_or_else(|| self.model.clone()),
            temperature: overrides.temperature.unwrap_or(self.temperature),
            max_tokens: overrides.max_tokens.unwrap_or(self.max_tokens),
            use_ai: overrides.use_ai.unwrap_or(self.use_ai),
            provider: self.provider,
            request_timeout_secs: self.request_timeout_secs,
        }
    }

    /// Reject values no provider accepts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(InsureChatError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(InsureChatError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial model settings supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub use_ai: Option<bool>,
}

/// Session state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Write the transcript to the store after every change.
    pub persist: bool,
    /// Store key holding the serialized transcript.
    pub storage_key: String,
    pub max_message_length: usize,
    /// Topic-specific follow-up questions taken before canned ones.
    pub topic_questions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: true,
            storage_key: "insurance_chat_messages".to_string(),
            max_message_length: 2000,
            topic_questions: 2,
        }
    }
}

/// Knowledge base source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// JSON file of entries replacing the built-in table.
    pub entries_path: Option<String>,
}

/// Expand a leading `~/` (or `~\`) to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").ok();
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").ok();
        if let Some(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
