//! Chat service: the per-turn pipeline.
//!
//! Validates the text, categorizes it, folds the extracted context into the
//! session context and produces the assistant reply, through the LLM
//! provider when one is configured and through the knowledge base
//! otherwise or when the provider fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use insurechat_core::config::{InsureChatConfig, ModelConfig};
use insurechat_core::types::{ExtractedContext, Message};

use crate::error::ChatError;
use crate::followup::FollowUpGenerator;
use crate::knowledge::KnowledgeBase;
use crate::llm::{build_prompt, CompletionRequest, LlmProvider};
use crate::parser::QueryParser;
use crate::response::{GenerateRequest, ResponseGenerator};
use crate::types::{ReplySource, TurnOutcome, TurnRequest};

/// Produces the assistant side of one turn.
///
/// An `Err` fails the turn: the session keeps the user message, records the
/// error and appends no reply.
#[async_trait]
pub trait TurnHandler: Send + Sync {
    async fn handle_turn(&self, request: TurnRequest<'_>) -> Result<TurnOutcome, ChatError>;
}

/// Production [`TurnHandler`].
pub struct ChatService {
    parser: QueryParser,
    generator: ResponseGenerator,
    follow_ups: FollowUpGenerator,
    provider: Option<Arc<dyn LlmProvider>>,
    model: ModelConfig,
    max_message_length: usize,
}

impl ChatService {
    /// A service answering from the knowledge base only; attach a provider
    /// with [`ChatService::with_provider`].
    pub fn new(config: &InsureChatConfig, knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            parser: QueryParser::new(),
            generator: ResponseGenerator::new(Arc::clone(&knowledge)),
            follow_ups: FollowUpGenerator::new(knowledge, config.session.topic_questions),
            provider: None,
            model: config.model.clone(),
            max_message_length: config.session.max_message_length,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        info!(provider = provider.name(), model = %self.model.model, "LLM provider attached");
        self.provider = Some(provider);
        self
    }

    /// Whether turns try the provider before the knowledge base.
    pub fn ai_enabled(&self) -> bool {
        self.model.use_ai && self.provider.is_some()
    }

    /// Run the pipeline for one user message.
    pub async fn process(&self, request: TurnRequest<'_>) -> Result<TurnOutcome, ChatError> {
        let text = request.text;
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }

        let category = self.parser.categorize(text);
        let extracted = self.parser.extract_context(text, Some(category));
        let mut context = request.context.clone();
        context.merge_from(&extracted);

        let (content, suggestions, source) = if self.ai_enabled() {
            match self.ai_reply(text, &context, request.model_override).await {
                Ok(reply) => (
                    self.generator.enhance_reply(&reply, text, &context),
                    self.follow_ups.generate(text, category),
                    ReplySource::Ai,
                ),
                Err(e) if e.is_provider_failure() => {
                    warn!(error = %e, "LLM reply failed; answering from the knowledge base");
                    self.knowledge_reply(text, request.history, &context)
                }
                Err(e) => return Err(e),
            }
        } else {
            self.knowledge_reply(text, request.history, &context)
        };

        debug!(%category, source = ?source, suggestions = suggestions.len(), "Turn complete");

        Ok(TurnOutcome {
            reply: Message::assistant(content, category, suggestions),
            context,
            source,
        })
    }

    fn knowledge_reply(
        &self,
        text: &str,
        history: &[Message],
        context: &ExtractedContext,
    ) -> (String, Vec<String>, ReplySource) {
        let response = self.generator.generate_response(&GenerateRequest {
            user_query: text,
            previous_messages: history,
            user_data: Some(context),
        });
        debug!(confidence = response.confidence, "Knowledge base reply");
        (response.answer, response.suggestions, ReplySource::KnowledgeBase)
    }

    async fn ai_reply(
        &self,
        text: &str,
        context: &ExtractedContext,
        model_override: Option<&str>,
    ) -> Result<String, ChatError> {
        let provider = self.provider.as_ref().ok_or(ChatError::ModelUnavailable)?;
        let model = resolve_model(model_override, &self.model.model)
            .ok_or(ChatError::ModelUnavailable)?;

        let (system, prompt) = build_prompt(text, context);
        let completion = CompletionRequest {
            model: model.to_string(),
            system,
            prompt,
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
        };

        debug!(provider = provider.name(), model, "Requesting LLM reply");
        let reply = if self.model.request_timeout_secs > 0 {
            let limit = Duration::from_secs(self.model.request_timeout_secs);
            tokio::time::timeout(limit, provider.complete(&completion))
                .await
                .map_err(|_| ChatError::ProviderTimeout(self.model.request_timeout_secs))??
        } else {
            provider.complete(&completion).await?
        };

        if reply.trim().is_empty() {
            return Err(ChatError::Provider("empty reply".to_string()));
        }
        Ok(reply)
    }
}

#[async_trait]
impl TurnHandler for ChatService {
    async fn handle_turn(&self, request: TurnRequest<'_>) -> Result<TurnOutcome, ChatError> {
        self.process(request).await
    }
}

/// The override when set and non-blank, else the configured model.
fn resolve_model<'a>(model_override: Option<&'a str>, configured: &'a str) -> Option<&'a str> {
    model_override
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| Some(configured.trim()).filter(|m| !m.is_empty()))
}

// =============================================================================
// Tests
// =============================================================================
