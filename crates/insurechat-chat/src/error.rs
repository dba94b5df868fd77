//! Error types for the chat pipeline.

use insurechat_core::error::InsureChatError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("LLM provider error: {0}")]
    Provider(String),
    #[error("LLM provider timed out after {0}s")]
    ProviderTimeout(u64),
    #[error("no model configured")]
    ModelUnavailable,
    #[error("template error: {0}")]
    Template(String),
    #[error("invalid context: {0}")]
    InvalidContext(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Whether the orchestrator degrades to the knowledge base on this error
    /// instead of failing the turn.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            ChatError::Provider(_) | ChatError::ProviderTimeout(_) | ChatError::ModelUnavailable
        )
    }
}

impl From<InsureChatError> for ChatError {
    fn from(err: InsureChatError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
