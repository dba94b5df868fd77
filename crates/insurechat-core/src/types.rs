use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse intent bucket for a user query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// General questions; the fallback bucket.
    #[default]
    Basic,
    /// Medical history, smoking, exams.
    Health,
    /// Policy types, premiums, riders.
    Policy,
    /// Filing claims and payouts.
    Claims,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Basic => "basic",
            Category::Health => "health",
            Category::Policy => "policy",
            Category::Claims => "claims",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Life insurance product family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Term,
    Whole,
    Universal,
    Variable,
}

impl PolicyType {
    /// Detection order. The first policy type whose phrase appears in a
    /// query wins, even if a later phrase is also present.
    pub const DETECTION_ORDER: [PolicyType; 4] = [
        PolicyType::Term,
        PolicyType::Whole,
        PolicyType::Universal,
        PolicyType::Variable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Term => "term",
            PolicyType::Whole => "whole",
            PolicyType::Universal => "universal",
            PolicyType::Variable => "variable",
        }
    }

    /// The phrase that identifies this policy type in free text.
    pub fn phrase(&self) -> &'static str {
        match self {
            PolicyType::Term => "term life",
            PolicyType::Whole => "whole life",
            PolicyType::Universal => "universal life",
            PolicyType::Variable => "variable life",
        }
    }

    /// Full product name, e.g. "term life insurance".
    pub fn product_name(&self) -> String {
        format!("{} insurance", self.phrase())
    }

    /// One-sentence description shared by the knowledge base and the
    /// reply enhancement step.
    pub fn canonical_description(&self) -> &'static str {
        match self {
            PolicyType::Term => {
                "Term life insurance provides coverage for a specific period, typically 10, 20, or 30 years, and pays out only if the insured dies during that term."
            }
            PolicyType::Whole => {
                "Whole life insurance provides lifelong coverage with fixed premiums and builds cash value over time."
            }
            PolicyType::Universal => {
                "Universal life insurance is permanent coverage with flexible premiums and an adjustable death benefit."
            }
            PolicyType::Variable => {
                "Variable life insurance is permanent coverage whose cash value is invested in market sub-accounts and can rise or fall."
            }
        }
    }

    pub fn features(&self) -> &'static [&'static str] {
        match self {
            PolicyType::Term => &[
                "affordable premiums",
                "a fixed coverage period",
                "no cash value",
            ],
            PolicyType::Whole => &[
                "lifetime coverage",
                "guaranteed cash value growth",
                "fixed premiums",
            ],
            PolicyType::Universal => &[
                "flexible premiums",
                "an adjustable death benefit",
                "interest-earning cash value",
            ],
            PolicyType::Variable => &[
                "investment sub-accounts",
                "market-linked cash value",
                "permanent coverage",
            ],
        }
    }

    pub fn best_for(&self) -> &'static [&'static str] {
        match self {
            PolicyType::Term => &[
                "young families",
                "mortgage protection",
                "income replacement",
            ],
            PolicyType::Whole => &["estate planning", "lifelong dependents"],
            PolicyType::Universal => &["changing financial needs", "long-term planning"],
            PolicyType::Variable => &["experienced investors", "higher risk tolerance"],
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health classification inferred from a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    PreExistingCondition,
    Smoker,
    GoodHealth,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::PreExistingCondition => "pre-existing condition",
            HealthStatus::Smoker => "smoker",
            HealthStatus::GoodHealth => "good health",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Structs
// =============================================================================

/// Structured facts inferred from free text.
///
/// Recomputed for every message. Absent facts stay `None`; a query with no
/// dollar amount has no coverage amount rather than a zero one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContext {
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<PolicyType>,
    /// Positive dollar amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_amount: Option<f64>,
    /// Age in years, strictly between 0 and 120.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<HealthStatus>,
}

impl ExtractedContext {
    /// Fold a newer extraction into this one.
    ///
    /// Last write wins per key: facts present in `newer` replace ours, facts
    /// absent from `newer` are kept. The category always follows `newer`.
    pub fn merge_from(&mut self, newer: &ExtractedContext) {
        self.category = newer.category;
        if newer.policy_type.is_some() {
            self.policy_type = newer.policy_type;
        }
        if newer.coverage_amount.is_some() {
            self.coverage_amount = newer.coverage_amount;
        }
        if newer.age.is_some() {
            self.age = newer.age;
        }
        if newer.health_status.is_some() {
            self.health_status = newer.health_status;
        }
    }

    /// True when no fact beyond the category is known.
    pub fn has_no_facts(&self) -> bool {
        self.policy_type.is_none()
            && self.coverage_amount.is_none()
            && self.age.is_none()
            && self.health_status.is_none()
    }
}

/// One entry in the conversation transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl Message {
    /// A user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            category: None,
            suggestions: None,
        }
    }

    /// An assistant reply stamped with the current time.
    pub fn assistant(
        content: impl Into<String>,
        category: Category,
        suggestions: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            category: Some(category),
            suggestions: Some(suggestions),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// A static knowledge base row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    pub term: String,
    pub definition: String,
    pub category: Category,
    #[serde(default)]
    pub related_terms: Vec<String>,
}

impl KnowledgeEntry {
    pub fn new(term: &str, definition: &str, category: Category, related: &[&str]) -> Self {
        Self {
            term: term.to_string(),
            definition: definition.to_string(),
            category,
            related_terms: related.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Enum serialization ----

    #[test]
    fn test_category_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Category::Claims).unwrap(), "\"claims\"");
        let parsed: Category = serde_json::from_str("\"health\"").unwrap();
        assert_eq!(parsed, Category::Health);
    }

    #[test]
    fn test_category_default_is_basic() {
        assert_eq!(Category::default(), Category::Basic);
    }

    #[test]
    fn test_policy_type_serializes_short_name() {
        assert_eq!(serde_json::to_string(&PolicyType::Term).unwrap(), "\"term\"");
        assert_eq!(PolicyType::Universal.to_string(), "universal");
    }

    #[test]
    fn test_policy_type_detection_order() {
        assert_eq!(PolicyType::DETECTION_ORDER[0], PolicyType::Term);
        assert_eq!(PolicyType::DETECTION_ORDER[3], PolicyType::Variable);
    }

    #[test]
    fn test_policy_descriptions_name_the_product() {
        for pt in PolicyType::DETECTION_ORDER {
            let desc = pt.canonical_description().to_lowercase();
            assert!(desc.starts_with(&pt.product_name()), "{}", desc);
            assert!(!pt.features().is_empty());
            assert!(!pt.best_for().is_empty());
        }
    }

    #[test]
    fn test_health_status_display() {
        assert_eq!(
            HealthStatus::PreExistingCondition.to_string(),
            "pre-existing condition"
        );
        assert_eq!(HealthStatus::GoodHealth.to_string(), "good health");
    }

    // ---- ExtractedContext ----

    #[test]
    fn test_merge_last_write_wins() {
        let mut acc = ExtractedContext {
            category: Category::Policy,
            policy_type: Some(PolicyType::Term),
            coverage_amount: Some(250_000.0),
            age: Some(30),
            health_status: None,
        };
        let newer = ExtractedContext {
            category: Category::Health,
            policy_type: None,
            coverage_amount: Some(500_000.0),
            age: None,
            health_status: Some(HealthStatus::Smoker),
        };
        acc.merge_from(&newer);
        assert_eq!(acc.category, Category::Health);
        assert_eq!(acc.policy_type, Some(PolicyType::Term));
        assert_eq!(acc.coverage_amount, Some(500_000.0));
        assert_eq!(acc.age, Some(30));
        assert_eq!(acc.health_status, Some(HealthStatus::Smoker));
    }

    #[test]
    fn test_context_has_no_facts() {
        assert!(ExtractedContext::default().has_no_facts());
        let ctx = ExtractedContext {
            age: Some(40),
            ..ExtractedContext::default()
        };
        assert!(!ctx.has_no_facts());
    }

    #[test]
    fn test_context_omits_absent_fields() {
        let json = serde_json::to_string(&ExtractedContext::default()).unwrap();
        assert_eq!(json, r#"{"category":"basic"}"#);
    }

    // ---- Message ----

    #[test]
    fn test_message_constructors() {
        let user = Message::user("hello");
        assert!(user.is_user());
        assert!(user.category.is_none());

        let reply = Message::assistant("hi", Category::Policy, vec!["Next?".to_string()]);
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.category, Some(Category::Policy));
        assert_eq!(reply.suggestions.as_deref().map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_message_timestamp_is_iso8601() {
        let msg = Message::user("hello");
        let value = serde_json::to_value(&msg).unwrap();
        let ts = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_message_without_id_gets_one() {
        let json = r#"{"role":"user","content":"hi","timestamp":"2024-05-01T12:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_ne!(msg.id, Uuid::nil());
        assert_eq!(msg.content, "hi");
        assert!(msg.suggestions.is_none());
    }

    // ---- KnowledgeEntry ----

    #[test]
    fn test_knowledge_entry_camel_case() {
        let entry = KnowledgeEntry::new("rider", "An add-on.", Category::Policy, &["premium"]);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["relatedTerms"][0], "premium");
        assert_eq!(value["category"], "policy");
    }
}
