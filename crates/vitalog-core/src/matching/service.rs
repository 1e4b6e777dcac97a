use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatbotConfig;
use crate::constants::DEFAULT_FALLBACK_TAG;
use crate::rules::{RuleRepository, RuleStoreError};

use super::intents::IntentMatcher;
use super::interactions::{InteractionChecker, InteractionReport};
use super::selector::ResponseSelector;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("rule store error: {0}")]
    Repository(#[from] RuleStoreError),
}

impl MatchError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, MatchError::InvalidInput(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// Chatbot replies and drug interaction checks over one rule store.
/// Nothing is carried between calls; every call reads the corpus afresh.
#[derive(Clone)]
pub struct MatchService {
    repo: Arc<dyn RuleRepository>,
    checker: InteractionChecker,
    matcher: IntentMatcher,
    selector: ResponseSelector,
    fallback_tag: String,
}

impl MatchService {
    pub fn new(repo: Arc<dyn RuleRepository>, selector: ResponseSelector) -> Self {
        Self {
            checker: InteractionChecker::new(repo.clone()),
            matcher: IntentMatcher::new(repo.clone()),
            repo,
            selector,
            fallback_tag: DEFAULT_FALLBACK_TAG.to_string(),
        }
    }

    pub fn from_config(repo: Arc<dyn RuleRepository>, config: &ChatbotConfig) -> Self {
        let selector = ResponseSelector::default().with_apology(config.apology.clone());
        Self::new(repo, selector).with_fallback_tag(config.fallback_tag.clone())
    }

    pub fn with_fallback_tag(mut self, tag: impl Into<String>) -> Self {
        self.fallback_tag = tag.into();
        self
    }

    #[tracing::instrument(skip_all)]
    pub async fn reply(&self, message: &str) -> Result<ChatReply, MatchError> {
        if message.trim().is_empty() {
            tracing::debug!("rejecting empty chatbot message");
            return Err(MatchError::InvalidInput("no message provided".into()));
        }

        let response = match self.matcher.find_match(message).await? {
            Some(rule) => match self.selector.select(&rule) {
                Some(response) => {
                    tracing::debug!(tag = %rule.tag, "intent matched");
                    response
                }
                None => {
                    tracing::warn!(tag = %rule.tag, "matched intent has no responses");
                    self.selector.apology().to_string()
                }
            },
            None => {
                let fallback = self.repo.find_intent_rule_by_tag(&self.fallback_tag).await?;
                if fallback.as_ref().is_none_or(|rule| !rule.has_responses()) {
                    tracing::warn!(tag = %self.fallback_tag, "fallback intent missing or empty");
                }
                self.selector.select_fallback(fallback.as_ref())
            }
        };

        Ok(ChatReply { response })
    }

    pub async fn check_interactions<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<InteractionReport, MatchError> {
        Ok(self.checker.check(names).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_APOLOGY;
    use crate::matching::selector::SeededRandom;
    use crate::rules::{MemoryRuleRepository, NewInteractionRule, NewIntentRule};
    use serde_json::json;

    fn service(repo: &MemoryRuleRepository) -> MatchService {
        MatchService::new(
            Arc::new(repo.clone()),
            ResponseSelector::new(Arc::new(SeededRandom::new(1))),
        )
    }

    #[tokio::test]
    async fn empty_message_is_a_client_error() {
        let repo = MemoryRuleRepository::new();
        let svc = service(&repo);

        for message in ["", "   ", "\n"] {
            let err = svc.reply(message).await.expect_err("empty message rejected");
            assert!(err.is_client_error());
        }
        assert_eq!(repo.read_count(), 0);
    }

    #[tokio::test]
    async fn matched_intent_replies_from_its_responses() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule::new("greeting", &["hello"], &["Hi!", "Hey!"]));
        repo.add_intent_rule(NewIntentRule::new("default_fallback", &[], &["sorry"]));

        let reply = service(&repo).reply("Hello doctor").await.expect("reply");
        assert!(["Hi!", "Hey!"].contains(&reply.response.as_str()));
    }

    #[tokio::test]
    async fn unmatched_message_uses_fallback_rule() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule::new("greeting", &["hello"], &["Hi!"]));
        repo.add_intent_rule(NewIntentRule::new("default_fallback", &[], &["sorry"]));

        let reply = service(&repo).reply("what is this").await.expect("reply");
        assert_eq!(reply.response, "sorry");
    }

    #[tokio::test]
    async fn missing_fallback_rule_yields_apology() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule::new("greeting", &["hello"], &["Hi!"]));

        let reply = service(&repo).reply("what is this").await.expect("reply");
        assert_eq!(reply.response, DEFAULT_APOLOGY);
    }

    #[tokio::test]
    async fn empty_fallback_rule_yields_apology() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule::new("default_fallback", &[], &[]));

        let reply = service(&repo).reply("what is this").await.expect("reply");
        assert_eq!(reply.response, DEFAULT_APOLOGY);
    }

    #[tokio::test]
    async fn malformed_fallback_responses_yield_apology() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule {
            tag: "default_fallback".into(),
            patterns: json!([]),
            responses: json!({"text": "not a list"}),
        });

        let reply = service(&repo).reply("what is this").await.expect("reply");
        assert_eq!(reply.response, DEFAULT_APOLOGY);
    }

    #[tokio::test]
    async fn matched_rule_without_responses_yields_apology() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule::new("silent", &["hello"], &[]));
        repo.add_intent_rule(NewIntentRule::new("default_fallback", &[], &["sorry"]));

        let reply = service(&repo).reply("hello").await.expect("reply");
        assert_eq!(reply.response, DEFAULT_APOLOGY);
    }

    #[tokio::test]
    async fn configured_fallback_tag_and_apology_are_honoured() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule::new("catch_all", &[], &["try rephrasing"]));
        let config = ChatbotConfig {
            fallback_tag: "catch_all".into(),
            apology: "offline".into(),
        };

        let svc = MatchService::from_config(Arc::new(repo.clone()), &config);
        assert_eq!(svc.reply("???").await.expect("reply").response, "try rephrasing");

        let empty_repo = MemoryRuleRepository::new();
        let svc = MatchService::from_config(Arc::new(empty_repo), &config);
        assert_eq!(svc.reply("???").await.expect("reply").response, "offline");
    }

    #[tokio::test]
    async fn storage_failure_is_not_a_client_error() {
        let repo = MemoryRuleRepository::new();
        repo.fail_with("timeout");

        let err = service(&repo).reply("hello").await.expect_err("storage error");
        assert!(!err.is_client_error());
        assert!(matches!(err, MatchError::Repository(RuleStoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn interaction_path_delegates_to_checker() {
        let repo = MemoryRuleRepository::new();
        repo.add_interaction_rule(NewInteractionRule {
            medications: vec!["Aspirin".into(), "Warfarin".into()],
            warning: "bleeding risk".into(),
        });
        let svc = service(&repo);

        let report = svc
            .check_interactions(&["ibuprofen", "warfarin", "ASPIRIN"])
            .await
            .expect("check");
        assert_eq!(report, InteractionReport::found("bleeding risk".into()));

        let names: Vec<String> = vec!["Aspirin".into()];
        let report = svc.check_interactions(&names).await.expect("check");
        assert_eq!(report, InteractionReport::none());
    }
}
