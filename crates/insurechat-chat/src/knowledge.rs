//! Static knowledge base of insurance terms.
//!
//! Loaded once at startup and never mutated. Lookups are case-insensitive
//! and respect table order.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use insurechat_core::error::InsureChatError;
use insurechat_core::types::{Category, KnowledgeEntry, PolicyType};

/// Opening of the reply used when no entry matches a topic.
pub const NO_INFORMATION_PHRASE: &str = "I don't have specific information";

/// Questions offered when nothing in the context matches an entry.
pub const DEFAULT_SUGGESTED_QUESTIONS: [&str; 3] = [
    "What types of life insurance are available?",
    "How much coverage do I need?",
    "How are premiums calculated?",
];

const MAX_RELATED: usize = 3;

/// In-memory table of terms, definitions and related terms.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KnowledgeBase {
    /// The built-in table, most specific terms first.
    pub fn builtin() -> Self {
        Self {
            entries: builtin_entries(),
        }
    }

    /// Build from caller-supplied entries.
    ///
    /// Rejects an empty table, blank terms and duplicate terms
    /// (case-insensitive).
    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Result<Self, InsureChatError> {
        if entries.is_empty() {
            return Err(InsureChatError::Knowledge(
                "knowledge base has no entries".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            let term = entry.term.trim().to_lowercase();
            if term.is_empty() {
                return Err(InsureChatError::Knowledge(
                    "entry with an empty term".to_string(),
                ));
            }
            if !seen.insert(term) {
                return Err(InsureChatError::Knowledge(format!(
                    "duplicate term: {}",
                    entry.term
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Load entries from a JSON array file.
    pub fn load(path: &Path) -> Result<Self, InsureChatError> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(&content)?;
        let kb = Self::from_entries(entries)?;
        info!(path = %path.display(), entries = kb.len(), "Knowledge base loaded");
        Ok(kb)
    }

    /// Load from `path` when given, falling back to the built-in table.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(kb) => kb,
            Err(e) => {
                warn!(
                    "Failed to load knowledge base from {}: {}. Using built-in entries.",
                    path.display(),
                    e
                );
                Self::builtin()
            }
        }
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -----------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------

    /// Entry for a topic: exact term match first, then the first entry in
    /// table order where the topic contains the term or the term contains
    /// the topic.
    pub fn lookup(&self, topic: &str) -> Option<&KnowledgeEntry> {
        let topic = topic.trim().to_lowercase();
        if topic.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|e| e.term.to_lowercase() == topic)
            .or_else(|| {
                self.entries.iter().find(|e| {
                    let term = e.term.to_lowercase();
                    topic.contains(&term) || term.contains(&topic)
                })
            })
    }

    /// Definition for a topic, or a fallback that suggests two topics.
    pub fn find_relevant_information(&self, topic: &str) -> String {
        match self.lookup(topic) {
            Some(entry) => entry.definition.clone(),
            None => format!(
                "{} about \"{}\". You could ask me about term life insurance or beneficiaries instead.",
                NO_INFORMATION_PHRASE,
                topic.trim()
            ),
        }
    }

    /// First entry, in table order, whose term occurs in `text`.
    pub fn first_mentioned(&self, text: &str) -> Option<&KnowledgeEntry> {
        let lower = text.to_lowercase();
        self.entries
            .iter()
            .find(|e| lower.contains(&e.term.to_lowercase()))
    }

    /// Most specific entry named in `text`: the longest term that occurs,
    /// earlier entries winning ties.
    pub fn find_mentioned(&self, text: &str) -> Option<&KnowledgeEntry> {
        let lower = text.to_lowercase();
        let mut best: Option<&KnowledgeEntry> = None;
        for entry in &self.entries {
            if !lower.contains(&entry.term.to_lowercase()) {
                continue;
            }
            if best.map_or(true, |b| entry.term.len() > b.term.len()) {
                best = Some(entry);
            }
        }
        best
    }

    // -----------------------------------------------------------------
    // Suggestions
    // -----------------------------------------------------------------

    /// Up to three "What is X?" questions drawn from the related terms of
    /// the first entry named in `context`, or the default questions.
    pub fn get_suggested_questions(&self, context: &str) -> Vec<String> {
        let related = self.get_related_topics(context);
        if related.is_empty() {
            return DEFAULT_SUGGESTED_QUESTIONS
                .iter()
                .map(|q| q.to_string())
                .collect();
        }
        related.iter().map(|t| format!("What is {}?", t)).collect()
    }

    /// Up to three related terms of the first entry named in `context`.
    pub fn get_related_topics(&self, context: &str) -> Vec<String> {
        self.first_mentioned(context)
            .map(|entry| {
                entry
                    .related_terms
                    .iter()
                    .take(MAX_RELATED)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------

    /// Every entry whose term, definition or a related term contains the
    /// query, in table order. A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<KnowledgeEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| {
                e.term.to_lowercase().contains(&needle)
                    || e.definition.to_lowercase().contains(&needle)
                    || e
                        .related_terms
                        .iter()
                        .any(|r| r.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }
}

fn policy_entry(policy: PolicyType, related: &[&str]) -> KnowledgeEntry {
    KnowledgeEntry::new(
        &policy.product_name(),
        policy.canonical_description(),
        Category::Policy,
        related,
    )
}

fn builtin_entries() -> Vec<KnowledgeEntry> {
    vec![
        policy_entry(PolicyType::Term, &["premium", "rider", "death benefit"]),
        policy_entry(PolicyType::Whole, &["cash value", "premium", "death benefit"]),
        policy_entry(
            PolicyType::Universal,
            &["cash value", "death benefit", "premium"],
        ),
        policy_entry(
            PolicyType::Variable,
            &["cash value", "universal life insurance", "rider"],
        ),
        KnowledgeEntry::new(
            "premium",
            "A premium is the amount you pay, monthly or annually, to keep your policy in force.",
            Category::Basic,
            &["underwriting", "term life insurance"],
        ),
        KnowledgeEntry::new(
            "beneficiary",
            "A beneficiary is the person or organization you name to receive the death benefit when the insured dies.",
            Category::Claims,
            &["death benefit", "claim"],
        ),
        KnowledgeEntry::new(
            "death benefit",
            "The death benefit is the lump sum paid to your beneficiaries once a claim is approved, and it is generally income-tax free.",
            Category::Claims,
            &["beneficiary", "claim", "contestability period"],
        ),
        KnowledgeEntry::new(
            "cash value",
            "Cash value is the savings component of permanent life insurance; it grows tax-deferred and you can borrow against it.",
            Category::Policy,
            &["whole life insurance", "universal life insurance"],
        ),
        KnowledgeEntry::new(
            "rider",
            "A rider is an optional add-on that changes or expands what a policy covers, such as a waiver of premium or an accelerated death benefit.",
            Category::Policy,
            &["premium", "death benefit"],
        ),
        KnowledgeEntry::new(
            "underwriting",
            "Underwriting is how the insurer evaluates your age, health and lifestyle to decide whether to offer coverage and at what price.",
            Category::Health,
            &["medical exam", "pre-existing condition"],
        ),
        KnowledgeEntry::new(
            "medical exam",
            "A medical exam is a short paramedical check of height, weight, blood pressure, and blood and urine samples used during underwriting.",
            Category::Health,
            &["underwriting", "pre-existing condition"],
        ),
        KnowledgeEntry::new(
            "pre-existing condition",
            "A pre-existing condition is a health issue diagnosed before you apply; it can raise your rate but rarely rules out coverage entirely.",
            Category::Health,
            &["underwriting", "medical exam"],
        ),
        KnowledgeEntry::new(
            "claim",
            "A claim is the formal request your beneficiaries submit, usually with a death certificate, to receive the death benefit.",
            Category::Claims,
            &["beneficiary", "death benefit", "contestability period"],
        ),
        KnowledgeEntry::new(
            "contestability period",
            "The contestability period is the first two years after a policy starts, during which the insurer may review a claim for misstatements on the application.",
            Category::Claims,
            &["claim", "underwriting"],
        ),
        KnowledgeEntry::new(
            "policy",
            "A life insurance policy is a contract: you pay premiums to keep your policy in force, and the insurer pays a death benefit to your beneficiaries.",
            Category::Basic,
            &["premium", "beneficiary", "rider"],
        ),
        KnowledgeEntry::new(
            "coverage",
            "Coverage is the amount your policy pays out; a common rule of thumb is 10 to 12 times your annual income.",
            Category::Basic,
            &["term life insurance", "premium"],
        ),
        KnowledgeEntry::new(
            "life insurance",
            "Life insurance is a contract that pays money to the people you choose when you die, helping them replace income and cover debts.",
            Category::Basic,
            &["term life insurance", "whole life insurance", "beneficiary"],
        ),
    ]
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::builtin()
    }

    // ---- Construction ----

    #[test]
    fn test_builtin_terms_are_unique() {
        let entries = builtin_entries();
        assert!(KnowledgeBase::from_entries(entries).is_ok());
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        let entries = vec![
            KnowledgeEntry::new("Rider", "a", Category::Policy, &[]),
            KnowledgeEntry::new("rider", "b", Category::Policy, &[]),
        ];
        let err = KnowledgeBase::from_entries(entries).unwrap_err();
        assert!(err.to_string().contains("duplicate term"));
    }

    #[test]
    fn test_from_entries_rejects_empty() {
        assert!(KnowledgeBase::from_entries(vec![]).is_err());
        let blank = vec![KnowledgeEntry::new("  ", "x", Category::Basic, &[])];
        assert!(KnowledgeBase::from_entries(blank).is_err());
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"[{"term":"annuity","definition":"An annuity pays income.","category":"policy","relatedTerms":["premium"]}]"#,
        )
        .unwrap();
        let kb = KnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.find_relevant_information("annuity"), "An annuity pays income.");
    }

    #[test]
    fn test_load_or_builtin_falls_back() {
        let kb = KnowledgeBase::load_or_builtin(Some(Path::new("/nonexistent/kb.json")));
        assert_eq!(kb.len(), builtin_entries().len());
        assert_eq!(KnowledgeBase::load_or_builtin(None).len(), kb.len());
    }

    // ---- find_relevant_information ----

    #[test]
    fn test_exact_match_case_insensitive() {
        let info = kb().find_relevant_information("BENEFICIARY");
        assert!(info.starts_with("A beneficiary is"));
    }

    #[test]
    fn test_exact_match_beats_earlier_partial() {
        // "life insurance" is a substring of earlier entries but matches
        // its own entry exactly.
        let info = kb().find_relevant_information("life insurance");
        assert!(info.starts_with("Life insurance is a contract"));
    }

    #[test]
    fn test_partial_match_topic_contains_term() {
        let info = kb().find_relevant_information("how riders work");
        assert!(info.starts_with("A rider is"));
    }

    #[test]
    fn test_partial_match_term_contains_topic() {
        let info = kb().find_relevant_information("term");
        assert!(info.starts_with("Term life insurance"));
    }

    #[test]
    fn test_no_match_fallback() {
        let info = kb().find_relevant_information("pet insurance");
        assert!(info.starts_with(NO_INFORMATION_PHRASE));
        assert!(info.contains("pet insurance"));
        assert!(info.contains("term life insurance"));
        assert!(info.contains("beneficiaries"));
    }

    #[test]
    fn test_blank_topic_fallback() {
        assert!(kb().find_relevant_information("  ").starts_with(NO_INFORMATION_PHRASE));
    }

    // ---- Mentions ----

    #[test]
    fn test_find_mentioned_prefers_longest() {
        let kb = kb();
        let entry = kb
            .find_mentioned("Is whole life insurance better than a plain policy?")
            .unwrap();
        assert_eq!(entry.term, "whole life insurance");
    }

    #[test]
    fn test_first_mentioned_uses_table_order() {
        let kb = kb();
        let entry = kb.first_mentioned("the policy has a rider").unwrap();
        assert_eq!(entry.term, "rider");
    }

    #[test]
    fn test_find_mentioned_none() {
        assert!(kb().find_mentioned("hello there").is_none());
    }

    // ---- Suggestions ----

    #[test]
    fn test_suggested_questions_from_related_terms() {
        let questions = kb().get_suggested_questions("Tell me about cash value");
        assert_eq!(
            questions,
            vec![
                "What is whole life insurance?".to_string(),
                "What is universal life insurance?".to_string(),
            ]
        );
    }

    #[test]
    fn test_suggested_questions_capped_at_three() {
        let questions = kb().get_suggested_questions("a claim was filed");
        assert_eq!(questions.len(), 3);
        assert!(questions.iter().all(|q| q.starts_with("What is ")));
    }

    #[test]
    fn test_suggested_questions_default() {
        let questions = kb().get_suggested_questions("hello");
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0], DEFAULT_SUGGESTED_QUESTIONS[0]);
    }

    #[test]
    fn test_related_topics_empty_when_no_match() {
        assert!(kb().get_related_topics("hello").is_empty());
        assert_eq!(
            kb().get_related_topics("what is a beneficiary"),
            vec!["death benefit".to_string(), "claim".to_string()]
        );
    }

    // ---- Search ----

    #[test]
    fn test_search_matches_term_definition_and_related() {
        let results = kb().search("cash value");
        let terms: Vec<&str> = results.iter().map(|e| e.term.as_str()).collect();
        // Definition match, term match and related-term match.
        assert!(terms.contains(&"whole life insurance"));
        assert!(terms.contains(&"cash value"));
        assert!(terms.contains(&"variable life insurance"));
    }

    #[test]
    fn test_search_table_order_and_idempotent() {
        let kb = kb();
        let first = kb.search("term life");
        let second = kb.search("term life");
        assert_eq!(first, second);
        assert_eq!(first[0].term, "term life insurance");
    }

    #[test]
    fn test_search_blank_query() {
        assert!(kb().search("   ").is_empty());
    }

    #[test]
    fn test_search_no_results() {
        assert!(kb().search("cryptocurrency").is_empty());
    }
}
