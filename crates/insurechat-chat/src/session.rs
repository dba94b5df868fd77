//! Session state manager.
//!
//! Owns the transcript, loading flag, error, suggestions and model override
//! for one conversation. Restores the transcript from a [`KeyValueStore`]
//! on construction and writes it back after every change. Every mutation
//! publishes a [`SessionState`] snapshot on a watch channel.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use insurechat_core::config::SessionConfig;
use insurechat_core::error::InsureChatError;
use insurechat_core::types::{ExtractedContext, KnowledgeEntry, Message};
use insurechat_storage::KeyValueStore;

use crate::context::rebuild_context;
use crate::error::ChatError;
use crate::knowledge::KnowledgeBase;
use crate::orchestrator::TurnHandler;
use crate::parser::QueryParser;
use crate::types::TurnRequest;

/// Snapshot consumed by presentation code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub messages: Vec<Message>,
    /// True while a turn is in flight.
    pub is_loading: bool,
    /// Message of the last failed turn, cleared when the next turn starts.
    pub error: Option<String>,
    /// Follow-ups offered by the latest assistant reply.
    pub suggestions: Vec<String>,
    pub model_override: Option<String>,
}

/// Persistence settings for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub storage_key: String,
    pub persist: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            persist: config.persist,
        }
    }
}

/// Called with the error of every failed turn.
pub type ErrorCallback = Box<dyn Fn(&ChatError) + Send + Sync>;

/// One conversation.
pub struct ChatSession {
    handler: Arc<dyn TurnHandler>,
    knowledge: Arc<KnowledgeBase>,
    store: Arc<dyn KeyValueStore>,
    options: SessionOptions,
    state: SessionState,
    context: ExtractedContext,
    on_error: Option<ErrorCallback>,
    tx: watch::Sender<SessionState>,
}

impl ChatSession {
    /// Create a session, restoring any persisted transcript.
    ///
    /// An unreadable or corrupt stored transcript is logged and ignored.
    pub fn new(
        handler: Arc<dyn TurnHandler>,
        knowledge: Arc<KnowledgeBase>,
        store: Arc<dyn KeyValueStore>,
        options: SessionOptions,
    ) -> Self {
        let messages = if options.persist {
            load_messages(store.as_ref(), &options.storage_key)
        } else {
            Vec::new()
        };
        let context = rebuild_context(&QueryParser::new(), &messages);

        let state = SessionState {
            messages,
            ..SessionState::default()
        };
        let (tx, _rx) = watch::channel(state.clone());

        Self {
            handler,
            knowledge,
            store,
            options,
            state,
            context,
            on_error: None,
            tx,
        }
    }

    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Receiver that sees a fresh snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    /// Context accumulated over the user messages of this session.
    pub fn context(&self) -> &ExtractedContext {
        &self.context
    }

    // -----------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------

    /// Append a user message and run a turn for it.
    ///
    /// Blank text is rejected before anything changes. When the turn fails
    /// the user message stays, the error is recorded and reported to the
    /// callback, and the error is returned.
    pub async fn send_message(&mut self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        self.state.messages.push(Message::user(text));
        self.begin_turn();
        self.run_turn(text.to_string()).await
    }

    /// Drop everything after the most recent user message and run its
    /// turn again. A transcript without user messages is left alone.
    pub async fn retry_last_message(&mut self) -> Result<(), ChatError> {
        let Some(idx) = self.state.messages.iter().rposition(|m| m.is_user()) else {
            debug!("Retry requested with no user message");
            return Ok(());
        };

        let text = self.state.messages[idx].content.clone();
        self.state.messages.truncate(idx + 1);
        self.begin_turn();
        self.run_turn(text).await
    }

    /// Clear the transcript, error, suggestions, model override and
    /// accumulated context, and delete the stored transcript.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.context = ExtractedContext::default();
        if self.options.persist {
            if let Err(e) = self.store.remove(&self.options.storage_key) {
                warn!(error = %e, "Failed to clear stored transcript");
            }
        }
        info!("Session reset");
        self.publish();
    }

    pub fn search_knowledge_base(&self, query: &str) -> Vec<KnowledgeEntry> {
        self.knowledge.search(query)
    }

    /// Model used for later turns; `None` or blank restores the configured
    /// model.
    pub fn set_model_override(&mut self, model: Option<String>) {
        self.state.model_override = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        debug!(model_override = ?self.state.model_override, "Model override set");
        self.publish();
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn begin_turn(&mut self) {
        self.state.is_loading = true;
        self.state.error = None;
        self.persist();
        self.publish();
    }

    async fn run_turn(&mut self, text: String) -> Result<(), ChatError> {
        let result = self
            .handler
            .handle_turn(TurnRequest {
                text: &text,
                history: &self.state.messages,
                context: &self.context,
                model_override: self.state.model_override.as_deref(),
            })
            .await;

        self.state.is_loading = false;
        match result {
            Ok(outcome) => {
                self.context = outcome.context;
                self.state.suggestions = outcome.reply.suggestions.clone().unwrap_or_default();
                self.state.messages.push(outcome.reply);
                debug!(
                    source = ?outcome.source,
                    messages = self.state.messages.len(),
                    "Assistant reply appended"
                );
                self.persist();
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Turn failed");
                self.state.error = Some(e.to_string());
                if let Some(callback) = &self.on_error {
                    callback(&e);
                }
                self.publish();
                Err(e)
            }
        }
    }

    fn persist(&self) {
        if !self.options.persist {
            return;
        }
        let result = serde_json::to_string(&self.state.messages)
            .map_err(InsureChatError::from)
            .and_then(|json| self.store.set(&self.options.storage_key, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist transcript");
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.state.clone());
    }
}

fn load_messages(store: &dyn KeyValueStore, key: &str) -> Vec<Message> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read stored transcript");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<Message>>(&raw) {
        Ok(messages) => {
            info!(messages = messages.len(), "Transcript restored");
            messages
        }
        Err(e) => {
            warn!(error = %e, "Stored transcript is corrupt; starting empty");
            Vec::new()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use insurechat_core::config::InsureChatConfig;
    use insurechat_core::types::{Category, PolicyType, Role};
    use insurechat_storage::MemoryStore;

    use crate::llm::MockLlmProvider;
    use crate::orchestrator::ChatService;
    use crate::types::TurnOutcome;

    const KEY: &str = "insurance_chat_messages";

    fn kb() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::builtin())
    }

    fn service() -> Arc<dyn TurnHandler> {
        Arc::new(ChatService::new(&InsureChatConfig::default(), kb()))
    }

    fn session_with(handler: Arc<dyn TurnHandler>, store: Arc<MemoryStore>) -> ChatSession {
        ChatSession::new(handler, kb(), store, SessionOptions::default())
    }

    struct FailingHandler;

    #[async_trait]
    impl TurnHandler for FailingHandler {
        async fn handle_turn(&self, _request: TurnRequest<'_>) -> Result<TurnOutcome, ChatError> {
            Err(ChatError::Storage("disk full".to_string()))
        }
    }

    /// Holds each turn until released, then delegates to the real service.
    struct GatedHandler {
        inner: Arc<dyn TurnHandler>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl TurnHandler for GatedHandler {
        async fn handle_turn(&self, request: TurnRequest<'_>) -> Result<TurnOutcome, ChatError> {
            self.release.notified().await;
            self.inner.handle_turn(request).await
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, InsureChatError> {
            Err(InsureChatError::Storage("unavailable".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), InsureChatError> {
            Err(InsureChatError::Storage("unavailable".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), InsureChatError> {
            Err(InsureChatError::Storage("unavailable".to_string()))
        }
    }

    // ---- Sending ----

    #[tokio::test]
    async fn test_send_appends_user_and_assistant() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session_with(service(), store.clone());
        session.send_message("What is a rider?").await.unwrap();

        let state = session.state();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(state.messages[1].category, Some(Category::Policy));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        assert!(!state.suggestions.is_empty());
        assert!(store.get(KEY).unwrap().unwrap().contains("What is a rider?"));
    }

    #[tokio::test]
    async fn test_user_message_visible_and_stored_while_in_flight() {
        let store = Arc::new(MemoryStore::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let handler = Arc::new(GatedHandler {
            inner: service(),
            release: Arc::clone(&release),
        });
        let mut session = session_with(handler, store.clone());
        let mut rx = session.subscribe();

        let turn = tokio::spawn(async move {
            session.send_message("What is a rider?").await.unwrap();
            session
        });

        rx.changed().await.unwrap();
        {
            let snapshot = rx.borrow_and_update();
            assert_eq!((snapshot.is_loading, snapshot.messages.len()), (true, 1));
            assert!(snapshot.error.is_none());
        }
        assert!(store.get(KEY).unwrap().unwrap().contains("What is a rider?"));

        release.notify_one();
        let session = turn.await.unwrap();
        assert!(!session.state().is_loading);
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_send_changes_nothing() {
        let mut session = session_with(service(), Arc::new(MemoryStore::new()));
        let result = session.send_message("  \n").await;
        assert!(matches!(result, Err(ChatError::EmptyMessage)));
        assert!(session.messages().is_empty());
        assert!(session.state().error.is_none());
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_user_message() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut session = session_with(Arc::new(FailingHandler), Arc::new(MemoryStore::new()))
            .with_error_callback(Box::new(move |_: &ChatError| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));

        assert!(session.send_message("Hello").await.is_err());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.state().error.as_deref(), Some("storage error: disk full"));
        assert!(!session.state().is_loading);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_too_long_message_fails_turn() {
        let mut config = InsureChatConfig::default();
        config.session.max_message_length = 5;
        let handler = Arc::new(ChatService::new(&config, kb()));
        let mut session = session_with(handler, Arc::new(MemoryStore::new()));

        let result = session.send_message("far too long").await;
        assert!(matches!(result, Err(ChatError::MessageTooLong(5))));
        assert_eq!(session.messages().len(), 1);
        assert!(session.state().error.is_some());
    }

    #[tokio::test]
    async fn test_context_accumulates_across_turns() {
        let mut session = session_with(service(), Arc::new(MemoryStore::new()));
        session.send_message("I want a $250k term life policy").await.unwrap();
        session.send_message("I'm 40 years old").await.unwrap();
        let ctx = session.context();
        assert_eq!(ctx.policy_type, Some(PolicyType::Term));
        assert_eq!(ctx.coverage_amount, Some(250_000.0));
        assert_eq!(ctx.age, Some(40));
    }

    // ---- Retry ----

    #[tokio::test]
    async fn test_retry_without_user_message_is_noop() {
        let mut session = session_with(service(), Arc::new(MemoryStore::new()));
        session.retry_last_message().await.unwrap();
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_retry_replaces_last_reply() {
        let mut session = session_with(service(), Arc::new(MemoryStore::new()));
        session.send_message("What is a rider?").await.unwrap();
        let first_id = session.messages()[1].id;

        session.retry_last_message().await.unwrap();
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].content, "What is a rider?");
        assert_ne!(session.messages()[1].id, first_id);
    }

    // ---- Reset ----

    #[tokio::test]
    async fn test_reset_clears_state_and_store() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session_with(service(), store.clone());
        session.set_model_override(Some("gpt-4o".to_string()));
        session.send_message("I want $500k of whole life").await.unwrap();

        session.reset();
        assert_eq!(session.state(), &SessionState::default());
        assert_eq!(session.context(), &ExtractedContext::default());
        assert!(store.get(KEY).unwrap().is_none());
    }

    // ---- Persistence ----

    #[tokio::test]
    async fn test_restore_rebuilds_context() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut session = session_with(service(), store.clone());
            session.send_message("I need $1M of universal life").await.unwrap();
        }

        let restored = session_with(service(), store);
        assert_eq!(restored.messages().len(), 2);
        assert_eq!(restored.context().policy_type, Some(PolicyType::Universal));
        assert_eq!(restored.context().coverage_amount, Some(1_000_000.0));
    }

    #[test]
    fn test_corrupt_transcript_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY, "{not json").unwrap();
        let session = session_with(service(), store);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_persist_disabled_leaves_store_alone() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY, "[]").unwrap();
        let options = SessionOptions {
            persist: false,
            ..SessionOptions::default()
        };
        let mut session = ChatSession::new(service(), kb(), store.clone(), options);
        session.send_message("Hello").await.unwrap();
        session.reset();
        assert_eq!(store.get(KEY).unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_store_failures_do_not_fail_turns() {
        let mut session =
            ChatSession::new(service(), kb(), Arc::new(BrokenStore), SessionOptions::default());
        session.send_message("Hello").await.unwrap();
        session.reset();
        assert!(session.messages().is_empty());
    }

    // ---- Model override ----

    #[tokio::test]
    async fn test_model_override_reaches_provider() {
        let provider = Arc::new(MockLlmProvider::new());
        let handler = Arc::new(
            ChatService::new(&InsureChatConfig::default(), kb()).with_provider(provider.clone()),
        );
        let mut session = session_with(handler, Arc::new(MemoryStore::new()));

        session.set_model_override(Some(" gpt-4o ".to_string()));
        session.send_message("Hello").await.unwrap();
        session.set_model_override(Some("".to_string()));
        assert!(session.state().model_override.is_none());
        session.send_message("Hello again").await.unwrap();

        let models: Vec<String> = provider.requests().into_iter().map(|r| r.model).collect();
        assert_eq!(models, vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);
    }

    // ---- Subscription ----

    #[tokio::test]
    async fn test_subscribers_see_snapshots() {
        let mut session = session_with(service(), Arc::new(MemoryStore::new()));
        let mut rx = session.subscribe();
        assert!(rx.borrow().messages.is_empty());

        session.send_message("Hello").await.unwrap();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.messages.len(), 2);
        assert!(!snapshot.is_loading);
    }
}
