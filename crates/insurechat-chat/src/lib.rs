//! Conversational engine for the life insurance assistant.
//!
//! Categorizes questions, extracts policy facts, answers from an LLM
//! provider or the built-in knowledge base, and keeps per-session
//! transcript state.

pub mod context;
pub mod error;
pub mod followup;
pub mod knowledge;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod response;
pub mod session;
pub mod types;

pub use context::{rebuild_context, BackReferenceResolver};
pub use error::ChatError;
pub use followup::FollowUpGenerator;
pub use knowledge::KnowledgeBase;
pub use llm::{CompletionRequest, LlmProvider, MockLlmProvider};
pub use orchestrator::{ChatService, TurnHandler};
pub use parser::QueryParser;
pub use response::{GenerateRequest, ResponseGenerator};
pub use session::{ChatSession, ErrorCallback, SessionOptions, SessionState};
pub use types::{ChatResponse, Intent, ReplySource, TurnOutcome, TurnRequest};
