//! insurechat binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing and report how the configuration was loaded
//! 3. Load the knowledge base and open the transcript store
//! 4. Build the chat service (with an LLM provider when configured)
//! 5. Run the terminal loop

mod cli;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use insurechat_chat::{
    ChatError, ChatService, ChatSession, KnowledgeBase, LlmProvider, MockLlmProvider, SessionOptions,
};
use insurechat_core::config::{expand_home, InsureChatConfig, ProviderKind};
use insurechat_core::error::InsureChatError;
use insurechat_storage::{KeyValueStore, MemoryStore, SqliteStore};

use crate::cli::CliArgs;

/// Outcome of reading the configuration file.
///
/// Loading happens before tracing is up, so the outcome is logged later.
#[derive(Debug)]
enum ConfigLoad {
    Loaded(InsureChatConfig),
    Missing,
    Invalid(InsureChatError),
}

impl ConfigLoad {
    fn read(path: &Path) -> Self {
        if !path.exists() {
            return Self::Missing;
        }
        match InsureChatConfig::load(path) {
            Ok(config) => Self::Loaded(config),
            Err(e) => Self::Invalid(e),
        }
    }

    /// The loaded configuration, or defaults.
    fn config(&self) -> InsureChatConfig {
        match self {
            Self::Loaded(config) => config.clone(),
            Self::Missing | Self::Invalid(_) => InsureChatConfig::default(),
        }
    }

    fn report(&self, path: &Path) {
        match self {
            Self::Loaded(_) => tracing::info!(path = %path.display(), "Configuration loaded"),
            Self::Missing => {
                tracing::info!(path = %path.display(), "No configuration file; using defaults")
            }
            Self::Invalid(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Invalid configuration file; using defaults"
            ),
        }
    }
}

/// Open the SQLite transcript store, falling back to memory.
fn open_store(data_dir: &Path, persist: bool) -> Arc<dyn KeyValueStore> {
    if !persist {
        tracing::info!("Transcript persistence disabled");
        return Arc::new(MemoryStore::new());
    }

    let db_path = data_dir.join("insurechat.db");
    match SqliteStore::open(&db_path) {
        Ok(store) => {
            tracing::info!(path = %db_path.display(), "Transcript store opened");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(path = %db_path.display(), error = %e, "Failed to open transcript store; using memory");
            Arc::new(MemoryStore::new())
        }
    }
}

fn build_provider(kind: ProviderKind) -> Option<Arc<dyn LlmProvider>> {
    match kind {
        ProviderKind::None => None,
        ProviderKind::Mock => Some(Arc::new(MockLlmProvider::new())),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let loaded = ConfigLoad::read(&config_file);
    let mut config = loaded.config();
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.model = config.model.merged(&args.model_overrides());
    config.model.validate()?;
    if args.no_persist {
        config.session.persist = false;
    }

    // Tracing goes to stderr so it does not interleave with the chat.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting insurechat v{}", env!("CARGO_PKG_VERSION"));
    loaded.report(&config_file);

    // Knowledge base.
    let entries_path: Option<PathBuf> = config
        .knowledge
        .entries_path
        .as_deref()
        .map(expand_home);
    let knowledge = Arc::new(KnowledgeBase::load_or_builtin(entries_path.as_deref()));
    tracing::info!(entries = knowledge.len(), "Knowledge base ready");

    // Storage.
    let data_dir = config.general.resolved_data_dir();
    let store = open_store(&data_dir, config.session.persist);

    // Chat service.
    let mut service = ChatService::new(&config, Arc::clone(&knowledge));
    if config.model.use_ai {
        match build_provider(config.model.provider) {
            Some(provider) => service = service.with_provider(provider),
            None => tracing::info!("No LLM provider configured; answering from the knowledge base"),
        }
    }

    let session = ChatSession::new(
        Arc::new(service),
        knowledge,
        store,
        SessionOptions::from(&config.session),
    )
    .with_error_callback(Box::new(|e: &ChatError| {
        tracing::warn!(error = %e, "Chat turn failed");
    }));

    repl::run(session).await?;
    tracing::info!("Goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ConfigLoad::read(&dir.path().join("absent.toml"));
        assert!(matches!(loaded, ConfigLoad::Missing));
        assert_eq!(loaded.config().model.temperature, InsureChatConfig::default().model.temperature);
    }

    #[test]
    fn test_out_of_range_config_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\ntemperature = 5.0\n").unwrap();

        let loaded = ConfigLoad::read(&path);
        match &loaded {
            ConfigLoad::Invalid(e) => assert!(e.to_string().contains("temperature")),
            other => panic!("expected an invalid config, got {:?}", other),
        }
        assert!(loaded.config().model.temperature <= 2.0);
    }

    #[test]
    fn test_valid_config_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\ntemperature = 0.2\n").unwrap();

        let loaded = ConfigLoad::read(&path);
        assert!(matches!(loaded, ConfigLoad::Loaded(_)));
        assert_eq!(loaded.config().model.temperature, 0.2);
    }
}
