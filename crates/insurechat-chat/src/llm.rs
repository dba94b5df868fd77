//! LLM provider seam.
//!
//! - `LlmProvider` is the async trait the chat service calls for AI
//!   replies. The transport behind it is left to implementors.
//! - `MockLlmProvider` returns scripted replies and records every request,
//!   for tests and for running the assistant without a network provider.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use insurechat_core::types::ExtractedContext;

use crate::error::ChatError;

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A language model that turns a prompt into reply text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Complete a prompt. Any error makes the caller fall back to the
    /// knowledge base.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError>;
}

const SYSTEM_PROMPT: &str = "You are a friendly life insurance assistant. Answer in plain language, \
in three or four sentences, using the customer's details when they are known. \
Do not quote exact prices and suggest speaking with a licensed agent for personal advice.";

/// Build the system prompt and user prompt for a question.
///
/// Known facts from the context are listed ahead of the question.
pub fn build_prompt(query: &str, context: &ExtractedContext) -> (String, String) {
    let mut facts = Vec::new();
    if let Some(policy) = context.policy_type {
        facts.push(format!("- Interested in: {}", policy.product_name()));
    }
    if let Some(amount) = context.coverage_amount {
        facts.push(format!("- Desired coverage: {}", crate::response::format_usd(amount)));
    }
    if let Some(age) = context.age {
        facts.push(format!("- Age: {}", age));
    }
    if let Some(health) = context.health_status {
        facts.push(format!("- Health: {}", health));
    }
    facts.push(format!("- Question category: {}", context.category));

    let prompt = format!(
        "Customer details:\n{}\n\nQuestion: {}",
        facts.join("\n"),
        query.trim()
    );
    (SYSTEM_PROMPT.to_string(), prompt)
}

// ---------------------------------------------------------------------------
// MockLlmProvider
// ---------------------------------------------------------------------------

const MOCK_DEFAULT_REPLY: &str = "That's a great question. The right choice depends on your budget, \
how long you need protection, and who relies on your income.";

/// Scripted provider.
///
/// Replies are consumed in order; once the script runs out the default
/// reply is returned. A scripted `Err` becomes [`ChatError::Provider`].
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<Result<String, String>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// A provider whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            fallback: Some(Err(message.to_string())),
            ..Self::default()
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .replies
            .lock()
            .map_err(|e| ChatError::Provider(format!("mock lock poisoned: {}", e)))?
            .pop_front();

        let reply = scripted
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Ok(MOCK_DEFAULT_REPLY.to_string()));
        reply.map_err(ChatError::Provider)
    }
}
