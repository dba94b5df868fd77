//! Conversation context across turns.
//!
//! Rebuilds the running context from a transcript and resolves pronoun
//! back-references ("tell me more about that") to knowledge base terms
//! named in the most recent messages.

use regex::Regex;
use std::sync::LazyLock;

use insurechat_core::types::{ExtractedContext, KnowledgeEntry, Message};

use crate::knowledge::KnowledgeBase;
use crate::parser::QueryParser;

/// Number of trailing messages scanned for back-references.
pub const BACK_REFERENCE_WINDOW: usize = 2;

static PRONOUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:this|that|it|these|those)\b").expect("Invalid pronoun regex")
});

/// Fold every user message of a transcript into one context, oldest first.
pub fn rebuild_context(parser: &QueryParser, messages: &[Message]) -> ExtractedContext {
    messages
        .iter()
        .filter(|m| m.is_user())
        .fold(ExtractedContext::default(), |mut acc, m| {
            acc.merge_from(&parser.extract_context(&m.content, None));
            acc
        })
}

// =============================================================================
// BackReferenceResolver
// =============================================================================

/// Resolves "this"/"that"/"it"/"these"/"those" to a known term.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackReferenceResolver;

impl BackReferenceResolver {
    /// Whether `text` contains a pronoun back-reference.
    pub fn has_back_reference(&self, text: &str) -> bool {
        PRONOUN_RE.is_match(text)
    }

    /// The term a back-reference most likely points at.
    ///
    /// Only the last [`BACK_REFERENCE_WINDOW`] messages are considered, and
    /// only when one of them contains a pronoun. They are scanned oldest
    /// first and the first message naming a term decides; within it the
    /// earliest entry of the knowledge base wins.
    pub fn resolve<'k>(
        &self,
        previous: &[Message],
        knowledge: &'k KnowledgeBase,
    ) -> Option<&'k KnowledgeEntry> {
        let window = &previous[previous.len().saturating_sub(BACK_REFERENCE_WINDOW)..];
        if !window.iter().any(|m| self.has_back_reference(&m.content)) {
            return None;
        }
        window
            .iter()
            .find_map(|m| knowledge.first_mentioned(&m.content))
    }

    /// Prefix `response` with "Regarding {term}, " when a back-reference
    /// resolves to a term the response does not already name.
    pub fn apply(&self, response: &str, previous: &[Message], knowledge: &KnowledgeBase) -> String {
        let Some(entry) = self.resolve(previous, knowledge) else {
            return response.to_string();
        };
        if response.to_lowercase().contains(&entry.term.to_lowercase()) {
            return response.to_string();
        }
        format!("Regarding {}, {}", entry.term, decapitalize(response))
    }
}

/// Lowercase the first character unless the first word is "I" or an
/// acronym.
fn decapitalize(text: &str) -> String {
    let first_word = text.split_whitespace().next().unwrap_or("");
    let is_acronym = first_word.chars().filter(|c| c.is_alphabetic()).count() > 1
        && first_word
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| c.is_uppercase());
    if first_word == "I" || first_word.starts_with("I'") || is_acronym {
        return text.to_string();
    }

    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================
