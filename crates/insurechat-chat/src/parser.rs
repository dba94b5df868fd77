//! Rule-based query parser.
//!
//! Categorizes queries, classifies intent for the knowledge-base reply
//! path, and extracts policy type, coverage amount, age and health status
//! from raw user input to produce an [`ExtractedContext`].

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use insurechat_core::types::{Category, ExtractedContext, HealthStatus, PolicyType};

use crate::types::Intent;

// =============================================================================
// Keyword tables
// =============================================================================

// Category keywords, checked health -> claims -> policy. Health keywords
// match whole words only.
static HEALTH_KEYWORDS: &[&str] = &[
    "health",
    "healthy",
    "medical",
    "diabetes",
    "smoker",
    "smoking",
    "pre-existing",
    "preexisting",
    "blood pressure",
    "cancer",
    "heart",
    "medication",
    "exam",
];

static CLAIMS_KEYWORDS: &[&str] = &[
    "claim",
    "beneficiary",
    "beneficiaries",
    "payout",
    "pay out",
    "death benefit",
];

static POLICY_KEYWORDS: &[&str] = &[
    "policy",
    "policies",
    "term life",
    "whole life",
    "universal life",
    "variable life",
    "premium",
    "rider",
    "coverage",
];

// Intent keyword groups, checked in declaration order.
static INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::PolicyExplanation,
        &["how does", "how do", "explain", "tell me about"],
    ),
    (
        Intent::TermDefinition,
        &["what is", "what's", "what are", "define", "meaning of", "difference between"],
    ),
    (
        Intent::CoverageQuestion,
        &["how much", "coverage", "amount", "afford", "cost"],
    ),
    (
        Intent::HealthQuestion,
        &["health", "medical", "smok", "condition", "underwriting"],
    ),
    (
        Intent::ClaimsQuestion,
        &["claim", "payout", "beneficiar", "file"],
    ),
];

// Health status groups, checked pre-existing -> smoker -> good health.
static PRE_EXISTING_KEYWORDS: &[&str] = &[
    "pre-existing",
    "preexisting",
    "diabetes",
    "cancer",
    "heart disease",
    "high blood pressure",
    "asthma",
    "chronic",
];

static SMOKER_KEYWORDS: &[&str] = &["smoker", "smoke", "smoking", "tobacco", "vape", "vaping"];

static GOOD_HEALTH_KEYWORDS: &[&str] = &[
    "good health",
    "excellent health",
    "healthy",
    "non-smoker",
    "nonsmoker",
    "don't smoke",
    "do not smoke",
    "never smoked",
];

// Phrases that negate smoking; stripped before the smoker group is checked.
static NON_SMOKER_PHRASES: &[&str] = &[
    "non-smoker",
    "nonsmoker",
    "non smoker",
    "don't smoke",
    "do not smoke",
    "never smoked",
];

// =============================================================================
// Compiled regexes
// =============================================================================

// `$500,000`, `$250k`, `$1.5M`, `$2 million`, or `300 thousand dollars`.
static COVERAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$\s?(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(k|m|thousand|million)?\b|(\d+(?:\.\d+)?)\s*(thousand|million)\s+dollars",
    )
    .expect("Invalid coverage regex")
});

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[\s-]*(?:years?[\s-]+old|year-old|yo)\b")
        .expect("Invalid age regex")
});

// =============================================================================
// QueryParser
// =============================================================================

/// Rule-based parser for insurance questions.
///
/// Every operation is infallible: text that matches nothing yields the
/// `Basic` category, the general intent, or an empty context.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser;

impl QueryParser {
    pub fn new() -> Self {
        Self
    }

    // -----------------------------------------------------------------
    // Categorization
    // -----------------------------------------------------------------

    /// Map a query to exactly one category.
    ///
    /// Health keywords win over claims keywords, which win over policy
    /// keywords. Anything else is `Basic`.
    pub fn categorize(&self, query: &str) -> Category {
        let lower = query.to_lowercase();

        if HEALTH_KEYWORDS.iter().any(|word| contains_word(&lower, word)) {
            Category::Health
        } else if contains_any(&lower, CLAIMS_KEYWORDS) {
            Category::Claims
        } else if contains_any(&lower, POLICY_KEYWORDS) {
            Category::Policy
        } else {
            Category::Basic
        }
    }

    // -----------------------------------------------------------------
    // Intent classification
    // -----------------------------------------------------------------

    /// Classify the intent of a query for knowledge-base lookup.
    pub fn classify_intent(&self, query: &str) -> Intent {
        let lower = query.to_lowercase();
        INTENT_KEYWORDS
            .iter()
            .find(|(_, keywords)| contains_any(&lower, keywords))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::GeneralInsuranceQuery)
    }

    // -----------------------------------------------------------------
    // Context extraction
    // -----------------------------------------------------------------

    /// Extract structured facts from a query.
    ///
    /// When `category` is `None` the query is categorized first.
    pub fn extract_context(&self, query: &str, category: Option<Category>) -> ExtractedContext {
        let lower = query.to_lowercase();
        let context = ExtractedContext {
            category: category.unwrap_or_else(|| self.categorize(query)),
            policy_type: self.extract_policy_type(&lower),
            coverage_amount: self.extract_coverage_amount(query),
            age: self.extract_age(query),
            health_status: self.extract_health_status(&lower),
        };
        debug!(
            category = %context.category,
            policy_type = ?context.policy_type,
            coverage_amount = ?context.coverage_amount,
            age = ?context.age,
            health_status = ?context.health_status,
            "Extracted context"
        );
        context
    }

    /// First policy type, in detection order, whose phrase appears in the
    /// lowercased text.
    pub fn extract_policy_type(&self, lower: &str) -> Option<PolicyType> {
        PolicyType::DETECTION_ORDER
            .into_iter()
            .find(|pt| lower.contains(pt.phrase()))
    }

    /// First dollar amount in the text, normalized to a plain number.
    ///
    /// Non-positive or unparseable amounts yield `None`.
    pub fn extract_coverage_amount(&self, text: &str) -> Option<f64> {
        let caps = COVERAGE_RE.captures(text)?;

        let (digits, suffix) = match caps.get(1) {
            Some(amount) => (amount.as_str(), caps.get(2).map(|m| m.as_str())),
            None => (caps.get(3)?.as_str(), caps.get(4).map(|m| m.as_str())),
        };

        let base: f64 = digits.replace(',', "").parse().ok()?;
        let multiplier = match suffix.map(|s| s.to_lowercase()).as_deref() {
            Some("k") | Some("thousand") => 1_000.0,
            Some("m") | Some("million") => 1_000_000.0,
            _ => 1.0,
        };

        let amount = base * multiplier;
        (amount.is_finite() && amount > 0.0).then_some(amount)
    }

    /// Age stated as "40 years old", "40-year-old" or "40yo".
    ///
    /// Only ages strictly between 0 and 120 are accepted.
    pub fn extract_age(&self, text: &str) -> Option<u8> {
        let caps = AGE_RE.captures(text)?;
        let age: u8 = caps.get(1)?.as_str().parse().ok()?;
        (age > 0 && age < 120).then_some(age)
    }

    /// Health status from the first matching keyword group.
    pub fn extract_health_status(&self, lower: &str) -> Option<HealthStatus> {
        if contains_any(lower, PRE_EXISTING_KEYWORDS) {
            return Some(HealthStatus::PreExistingCondition);
        }

        let mut smoker_text = lower.to_string();
        for phrase in NON_SMOKER_PHRASES {
            smoker_text = smoker_text.replace(phrase, " ");
        }
        if contains_any(&smoker_text, SMOKER_KEYWORDS) {
            return Some(HealthStatus::Smoker);
        }

        if contains_any(lower, GOOD_HEALTH_KEYWORDS) {
            return Some(HealthStatus::GoodHealth);
        }

        None
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// `word` appears with no letter or digit on either side, optionally
/// followed by a plural `s`.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let rest = &haystack[start + word.len()..];
        let after = rest.strip_prefix('s').unwrap_or(rest).chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

// =============================================================================
// Tests
// =============================================================================
