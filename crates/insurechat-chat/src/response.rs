//! Response generation without an LLM.
//!
//! Composes replies from knowledge base definitions, the extracted
//! context and the recent transcript, and scores how specific each reply
//! is. Also enhances LLM replies with one knowledge base sentence.

use std::sync::Arc;

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use insurechat_core::types::{Category, ExtractedContext, Message};

use crate::context::BackReferenceResolver;
use crate::error::ChatError;
use crate::knowledge::{KnowledgeBase, NO_INFORMATION_PHRASE};
use crate::parser::QueryParser;
use crate::types::ChatResponse;

// =============================================================================
// Constants
// =============================================================================

const MAX_SUGGESTIONS: usize = 3;

/// Words whose presence marks a reply as detailed; each adds 0.05.
const DETAIL_KEYWORDS: [&str; 6] = [
    "coverage",
    "premium",
    "benefit",
    "policy",
    "cash value",
    "beneficiary",
];

const APOLOGY_PHRASES: &[&str] = &["apologize", "sorry", "trouble"];

const ERROR_REPLY: &str = "I apologize, but I'm having trouble answering that right now. Please try rephrasing your question.";

/// Suggestions attached to the apology reply.
pub const GENERIC_SUGGESTIONS: [&str; 3] = [
    "What is life insurance?",
    "What types of policies are available?",
    "How do I choose the right coverage?",
];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").expect("Invalid placeholder regex"));

static GENERIC_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\byour (coverage|policy)\b").expect("Invalid generic phrase regex")
});

/// Canned follow-ups per category.
fn category_questions(category: Category) -> [&'static str; 3] {
    match category {
        Category::Basic => [
            "How much coverage do I need?",
            "What affects my premium?",
            "Which policy type fits my situation?",
        ],
        Category::Health => [
            "Will a pre-existing condition affect my premium?",
            "Do I need a medical exam?",
            "How does smoking affect life insurance rates?",
        ],
        Category::Policy => [
            "What is the difference between term and whole life insurance?",
            "Can I convert a term policy to whole life?",
            "What riders should I consider?",
        ],
        Category::Claims => [
            "How do I file a claim?",
            "How long does a claim payout take?",
            "Who can be a beneficiary?",
        ],
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// A `{{key}}` slot in a knowledge base template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    PolicyType,
    CoverageAmount,
    Age,
    HealthStatus,
    Category,
}

impl Placeholder {
    /// Parse a placeholder key; accepts snake_case and camelCase.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "policy_type" | "policyType" => Some(Placeholder::PolicyType),
            "coverage_amount" | "coverageAmount" => Some(Placeholder::CoverageAmount),
            "age" => Some(Placeholder::Age),
            "health_status" | "healthStatus" => Some(Placeholder::HealthStatus),
            "category" => Some(Placeholder::Category),
            _ => None,
        }
    }

    /// Text for this slot, or a neutral phrase when the fact is unknown.
    fn resolve(&self, context: &ExtractedContext) -> String {
        match self {
            Placeholder::PolicyType => context
                .policy_type
                .map(|pt| pt.product_name())
                .unwrap_or_else(|| "life insurance".to_string()),
            Placeholder::CoverageAmount => context
                .coverage_amount
                .map(format_usd)
                .unwrap_or_else(|| "your coverage amount".to_string()),
            Placeholder::Age => context
                .age
                .map(|a| a.to_string())
                .unwrap_or_else(|| "your age".to_string()),
            Placeholder::HealthStatus => context
                .health_status
                .map(|h| h.to_string())
                .unwrap_or_else(|| "your health profile".to_string()),
            Placeholder::Category => context.category.to_string(),
        }
    }
}

/// Replace every `{{key}}` in `template` from `context`.
///
/// Unknown keys are an error rather than being left in the text.
pub fn render_template(template: &str, context: &ExtractedContext) -> Result<String, ChatError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let placeholder = Placeholder::from_key(key.as_str())
            .ok_or_else(|| ChatError::Template(format!("unknown placeholder {{{{{}}}}}", key.as_str())))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(&placeholder.resolve(context));
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Format a dollar amount with thousands separators and no cents.
pub fn format_usd(amount: f64) -> String {
    let whole = amount.round().max(0.0) as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${}", grouped)
}

/// Specificity score for a reply.
///
/// 0.5 for the "no specific information" fallback, 0.3 for apologies,
/// otherwise 0.7 plus 0.05 per detail keyword present, capped at 0.95.
pub fn compute_confidence(text: &str) -> f32 {
    let lower = text.to_lowercase();
    if lower.contains(&NO_INFORMATION_PHRASE.to_lowercase()) {
        return 0.5;
    }
    if APOLOGY_PHRASES.iter().any(|p| lower.contains(p)) {
        return 0.3;
    }
    let found = DETAIL_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    (0.7 + 0.05 * found as f32).min(0.95)
}

// =============================================================================
// ResponseGenerator
// =============================================================================

/// Input for [`ResponseGenerator::generate_response`].
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub user_query: &'a str,
    /// Transcript so far; the last two messages are checked for
    /// back-references.
    pub previous_messages: &'a [Message],
    pub user_data: Option<&'a ExtractedContext>,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(user_query: &'a str) -> Self {
        Self {
            user_query,
            previous_messages: &[],
            user_data: None,
        }
    }
}

/// Template-driven reply generator backed by the knowledge base.
pub struct ResponseGenerator {
    knowledge: Arc<KnowledgeBase>,
    parser: QueryParser,
    resolver: BackReferenceResolver,
}

impl ResponseGenerator {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            knowledge,
            parser: QueryParser::new(),
            resolver: BackReferenceResolver,
        }
    }

    /// Produce a reply, confidence and up to three suggestions.
    ///
    /// Never fails: internal errors produce the apology reply with
    /// confidence 0.0.
    pub fn generate_response(&self, request: &GenerateRequest<'_>) -> ChatResponse {
        match self.try_generate(request) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Response generation failed; using apology reply");
                self.error_response()
            }
        }
    }

    /// The canned reply for failed generation.
    pub fn error_response(&self) -> ChatResponse {
        ChatResponse {
            answer: ERROR_REPLY.to_string(),
            confidence: 0.0,
            suggestions: GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn try_generate(&self, request: &GenerateRequest<'_>) -> Result<ChatResponse, ChatError> {
        let intent = self.parser.classify_intent(request.user_query);

        let base = match self.knowledge.find_mentioned(request.user_query) {
            Some(entry) => entry.definition.clone(),
            None => self
                .knowledge
                .find_relevant_information(intent.knowledge_topic()),
        };

        let empty = ExtractedContext::default();
        let context = request.user_data.unwrap_or(&empty);
        let text = self.apply_context(&base, context)?;
        let text = self
            .resolver
            .apply(&text, request.previous_messages, &self.knowledge);

        let suggestions = self.derive_suggestions(&text, context.category);
        let confidence = compute_confidence(&text);

        debug!(%intent, confidence, "Generated knowledge base reply");

        Ok(ChatResponse {
            answer: text,
            confidence,
            suggestions,
        })
    }

    /// Fill placeholders, personalize generic phrasing with the coverage
    /// amount, and merge policy features when the text lacks them.
    fn apply_context(&self, text: &str, context: &ExtractedContext) -> Result<String, ChatError> {
        let mut text = render_template(text, context)?;

        if let Some(amount) = context.coverage_amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ChatError::InvalidContext(format!(
                    "coverage amount must be positive, got {}",
                    amount
                )));
            }
            let formatted = format_usd(amount);
            text = GENERIC_PHRASE_RE
                .replace_all(&text, |caps: &regex::Captures<'_>| {
                    format!("your {} {}", formatted, &caps[1])
                })
                .into_owned();
        }

        if let Some(policy) = context.policy_type {
            let lower = text.to_lowercase();
            let features = policy.features().join(", ");
            let already_described = lower
                .contains(&policy.canonical_description().to_lowercase())
                || lower.contains(&features.to_lowercase());
            if !already_described {
                text.push_str(&format!(
                    "\n\nKey features of {}: {}. Best for: {}.",
                    policy.product_name(),
                    features,
                    policy.best_for().join(", ")
                ));
            }
        }

        Ok(text)
    }

    /// Knowledge base questions for the reply, topped up with the
    /// category's canned questions, unique and capped at three.
    fn derive_suggestions(&self, text: &str, category: Category) -> Vec<String> {
        let mut suggestions = self.knowledge.get_suggested_questions(text);
        suggestions.truncate(MAX_SUGGESTIONS);
        for question in category_questions(category) {
            if suggestions.len() >= MAX_SUGGESTIONS {
                break;
            }
            if !suggestions.iter().any(|s| s.eq_ignore_ascii_case(question)) {
                suggestions.push(question.to_string());
            }
        }
        suggestions
    }

    // -----------------------------------------------------------------
    // LLM reply enhancement
    // -----------------------------------------------------------------

    /// Append one knowledge sentence to an LLM reply.
    ///
    /// The sentence is the policy type's description when one is known,
    /// otherwise the first sentence of the entry the query names. Nothing
    /// is appended when the reply already contains it.
    pub fn enhance_reply(&self, reply: &str, query: &str, context: &ExtractedContext) -> String {
        let sentence = match context.policy_type {
            Some(policy) => Some(policy.canonical_description().to_string()),
            None => self
                .knowledge
                .find_mentioned(query)
                .map(|entry| first_sentence(&entry.definition).to_string()),
        };

        let reply = reply.trim_end();
        match sentence {
            Some(s) if !reply.to_lowercase().contains(&s.to_lowercase()) => {
                format!("{}\n\n{}", reply, s)
            }
            _ => reply.to_string(),
        }
    }
}

fn first_sentence(text: &str) -> &str {
    match text.find(". ") {
        Some(idx) => &text[..=idx],
        None => text,
    }
}

// =============================================================================
// Tests
// =============================================================================
