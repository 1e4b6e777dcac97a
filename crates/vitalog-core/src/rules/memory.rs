use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::repositories::{RuleRepository, RuleStoreError};
use super::types::{
    InteractionRule, IntentRule, MedicationPair, NewInteractionRule, NewIntentRule,
    decode_patterns, decode_responses,
};

#[derive(Debug, Default)]
struct Corpus {
    interactions: Vec<InteractionRule>,
    intents: Vec<IntentRule>,
    failure: Option<String>,
}

/// Rule store held in process memory. Clones share the same corpus.
#[derive(Debug, Default, Clone)]
pub struct MemoryRuleRepository {
    corpus: Arc<Mutex<Corpus>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interaction_rule(&self, new_rule: NewInteractionRule) -> InteractionRule {
        let rule = InteractionRule {
            id: Uuid::new_v4().to_string(),
            medications: new_rule.medications,
            warning: new_rule.warning,
            created_at: Utc::now(),
        };
        self.lock().interactions.push(rule.clone());
        rule
    }

    pub fn add_intent_rule(&self, new_rule: NewIntentRule) -> IntentRule {
        let rule = IntentRule {
            id: Uuid::new_v4().to_string(),
            tag: new_rule.tag,
            patterns: decode_patterns(&new_rule.patterns),
            responses: decode_responses(&new_rule.responses),
            created_at: Utc::now(),
        };
        self.lock().intents.push(rule.clone());
        rule
    }

    /// Makes every subsequent read fail with `RuleStoreError::Unavailable`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Number of repository reads served (or refused) so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Corpus> {
        // A poisoned lock only means another test thread panicked mid-push.
        self.corpus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> Result<std::sync::MutexGuard<'_, Corpus>, RuleStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let corpus = self.lock();
        match &corpus.failure {
            Some(message) => Err(RuleStoreError::Unavailable(message.clone())),
            None => Ok(corpus),
        }
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn find_interaction_rule(
        &self,
        pair: &MedicationPair,
    ) -> Result<Option<InteractionRule>, RuleStoreError> {
        let corpus = self.read()?;
        Ok(corpus
            .interactions
            .iter()
            .find(|rule| rule.matches(pair))
            .cloned())
    }

    async fn all_intent_rules(&self) -> Result<Vec<IntentRule>, RuleStoreError> {
        Ok(self.read()?.intents.clone())
    }

    async fn find_intent_rule_by_tag(
        &self,
        tag: &str,
    ) -> Result<Option<IntentRule>, RuleStoreError> {
        let corpus = self.read()?;
        Ok(corpus.intents.iter().find(|rule| rule.tag == tag).cloned())
    }
}
