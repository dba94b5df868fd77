//! CLI argument definitions for the insurechat binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use insurechat_core::config::ModelOverrides;

/// insurechat - a terminal assistant for life insurance questions.
#[derive(Parser, Debug)]
#[command(name = "insurechat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Directory holding the transcript database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Model requested from the LLM provider.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Answer from the knowledge base only.
    #[arg(long = "no-ai")]
    pub no_ai: bool,

    /// Keep the transcript in memory only.
    #[arg(long = "no-persist")]
    pub no_persist: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > INSURECHAT_CONFIG env var > ~/.insurechat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("INSURECHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Returns `None` if not overridden.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Model settings given on the command line.
    pub fn model_overrides(&self) -> ModelOverrides {
        ModelOverrides {
            model: self.model.clone(),
            use_ai: self.no_ai.then_some(false),
            ..ModelOverrides::default()
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".insurechat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".insurechat").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "insurechat",
            "--model",
            "gpt-4o",
            "--no-ai",
            "-d",
            "/tmp/ic",
        ]);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/tmp/ic"));
        let overrides = args.model_overrides();
        assert_eq!(overrides.model.as_deref(), Some("gpt-4o"));
        assert_eq!(overrides.use_ai, Some(false));
        assert!(!args.no_persist);
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = CliArgs::parse_from(["insurechat"]);
        assert_eq!(args.model_overrides(), ModelOverrides::default());
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::parse_from(["insurechat", "-c", "/etc/insurechat.toml"]);
        assert_eq!(
            args.resolve_config_path(),
            PathBuf::from("/etc/insurechat.toml")
        );
    }
}
