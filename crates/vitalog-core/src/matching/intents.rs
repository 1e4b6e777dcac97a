use std::sync::Arc;

use crate::rules::{IntentRule, RuleRepository, RuleStoreError};

#[derive(Clone)]
pub struct IntentMatcher {
    repo: Arc<dyn RuleRepository>,
}

impl IntentMatcher {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self { repo }
    }

    /// Reads the intent corpus and returns the first rule triggered by `utterance`.
    #[tracing::instrument(skip_all)]
    pub async fn find_match(&self, utterance: &str) -> Result<Option<IntentRule>, RuleStoreError> {
        let rules = self.repo.all_intent_rules().await?;
        Ok(first_match(rules, utterance))
    }
}

/// First rule, in the given order, with a pattern contained in the lower-cased
/// utterance. Rules without a pattern list are skipped.
pub fn first_match(rules: impl IntoIterator<Item = IntentRule>, utterance: &str) -> Option<IntentRule> {
    let haystack = utterance.to_lowercase();
    rules.into_iter().find(|rule| {
        let Some(patterns) = &rule.patterns else {
            tracing::warn!(tag = %rule.tag, "intent rule has no pattern list; skipping");
            return false;
        };
        patterns
            .iter()
            .any(|pattern| haystack.contains(&pattern.to_lowercase()))
    })
}
