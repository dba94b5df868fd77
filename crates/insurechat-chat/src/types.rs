//! Types shared across the chat pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use insurechat_core::types::{ExtractedContext, Message};

/// Fine-grained reading of what a query asks for, used by the
/// knowledge-base reply path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PolicyExplanation,
    TermDefinition,
    CoverageQuestion,
    HealthQuestion,
    ClaimsQuestion,
    GeneralInsuranceQuery,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::PolicyExplanation => "policy_explanation",
            Intent::TermDefinition => "term_definition",
            Intent::CoverageQuestion => "coverage_question",
            Intent::HealthQuestion => "health_question",
            Intent::ClaimsQuestion => "claims_question",
            Intent::GeneralInsuranceQuery => "general_insurance_query",
        }
    }

    /// Knowledge base topic answering this intent when the query names no
    /// term of its own.
    pub fn knowledge_topic(&self) -> &'static str {
        match self {
            Intent::PolicyExplanation => "policy",
            Intent::TermDefinition => "life insurance",
            Intent::CoverageQuestion => "coverage",
            Intent::HealthQuestion => "underwriting",
            Intent::ClaimsQuestion => "claim",
            Intent::GeneralInsuranceQuery => "life insurance",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated reply before it becomes a transcript message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    /// 0.0 to 1.0.
    pub confidence: f32,
    pub suggestions: Vec<String>,
}

/// Where an assistant reply came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// The LLM provider, enhanced with knowledge base facts.
    Ai,
    /// The template-driven response generator.
    KnowledgeBase,
}

/// Input for one user turn.
#[derive(Clone, Copy, Debug)]
pub struct TurnRequest<'a> {
    /// Text of the user message.
    pub text: &'a str,
    /// Transcript so far, ending with the user message for this turn.
    pub history: &'a [Message],
    /// Context accumulated over earlier turns of the session.
    pub context: &'a ExtractedContext,
    pub model_override: Option<&'a str>,
}

/// Result of a completed turn.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// The assistant message to append.
    pub reply: Message,
    /// Session context after folding in this turn's extraction.
    pub context: ExtractedContext,
    pub source: ReplySource,
}
