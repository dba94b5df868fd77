//! Follow-up question generation for AI replies.

use std::sync::Arc;

use insurechat_core::types::Category;

use crate::knowledge::KnowledgeBase;

const MAX_FOLLOW_UPS: usize = 3;

fn category_follow_ups(category: Category) -> [&'static str; 2] {
    match category {
        Category::Basic => [
            "How much life insurance do I need?",
            "How are premiums calculated?",
        ],
        Category::Health => [
            "Do I need a medical exam to get covered?",
            "How do health conditions affect my rates?",
        ],
        Category::Policy => [
            "Which policy type is right for me?",
            "Can I add riders to my policy?",
        ],
        Category::Claims => [
            "What documents do I need to file a claim?",
            "How quickly are death benefits paid?",
        ],
    }
}

/// Builds up to three follow-up questions for a turn.
#[derive(Debug, Clone)]
pub struct FollowUpGenerator {
    knowledge: Arc<KnowledgeBase>,
    topic_questions: usize,
}

impl FollowUpGenerator {
    /// `topic_questions` caps how many knowledge-base "What is X?"
    /// questions lead the list.
    pub fn new(knowledge: Arc<KnowledgeBase>, topic_questions: usize) -> Self {
        Self {
            knowledge,
            topic_questions,
        }
    }

    /// Related-topic questions for the query, then the category's
    /// questions, de-duplicated case-insensitively. Never fewer than two,
    /// since every category has canned questions.
    pub fn generate(&self, query: &str, category: Category) -> Vec<String> {
        let mut questions: Vec<String> = self
            .knowledge
            .get_related_topics(query)
            .into_iter()
            .take(self.topic_questions)
            .map(|topic| format!("What is {}?", topic))
            .collect();

        for question in category_follow_ups(category) {
            push_unique(&mut questions, question);
        }

        questions.truncate(MAX_FOLLOW_UPS);
        questions
    }
}

fn push_unique(questions: &mut Vec<String>, candidate: &str) {
    let lower = candidate.to_lowercase();
    if !questions.iter().any(|q| q.to_lowercase() == lower) {
        questions.push(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(topic_questions: usize) -> FollowUpGenerator {
        FollowUpGenerator::new(Arc::new(KnowledgeBase::builtin()), topic_questions)
    }

    #[test]
    fn test_topics_lead_then_category() {
        let questions = generator(2).generate("Tell me about cash value", Category::Policy);
        assert_eq!(
            questions,
            vec![
                "What is whole life insurance?".to_string(),
                "What is universal life insurance?".to_string(),
                "Which policy type is right for me?".to_string(),
            ]
        );
    }

    #[test]
    fn test_topic_questions_limit() {
        let questions = generator(1).generate("a claim was filed", Category::Claims);
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0], "What is beneficiary?");
        assert_eq!(questions[1], "What documents do I need to file a claim?");
    }

    #[test]
    fn test_no_topics_uses_category() {
        let questions = generator(2).generate("hello", Category::Health);
        assert_eq!(questions.len(), 2);
        assert!(questions[0].contains("medical exam"));
    }

    #[test]
    fn test_every_category_yields_questions() {
        for category in [
            Category::Basic,
            Category::Health,
            Category::Policy,
            Category::Claims,
        ] {
            assert_eq!(generator(0).generate("hello", category).len(), 2);
        }
    }

    #[test]
    fn test_zero_topic_questions() {
        let questions = generator(0).generate("Tell me about cash value", Category::Basic);
        assert_eq!(
            questions,
            vec![
                "How much life insurance do I need?".to_string(),
                "How are premiums calculated?".to_string(),
            ]
        );
    }

    #[test]
    fn test_push_unique_case_insensitive() {
        let mut qs = vec!["What is a rider?".to_string()];
        push_unique(&mut qs, "WHAT IS A RIDER?");
        assert_eq!(qs.len(), 1);
    }
}
