//! Loading rule corpora from JSON documents.
//!
//! The document shape mirrors what administrators hand over:
//!
//! ```json
//! {
//!   "interactions": [{"medications": ["Warfarin", "Aspirin"], "warning": "..."}],
//!   "intents": [{"tag": "greeting", "patterns": ["hi"], "responses": ["Hello!"]}]
//! }
//! ```

use std::{collections::HashSet, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::rules::{NewInteractionRule, NewIntentRule, RuleStoreError, SqlRuleRepository};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RuleCorpus {
    #[serde(default)]
    pub interactions: Vec<NewInteractionRule>,
    #[serde(default)]
    pub intents: Vec<NewIntentRule>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read corpus file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid corpus document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("interaction #{index} names {count} medication(s); at least two are required")]
    TooFewMedications { index: usize, count: usize },
    #[error("intent tag {0:?} appears more than once")]
    DuplicateTag(String),
    #[error("failed to store rule: {0}")]
    Store(#[from] RuleStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub interactions: usize,
    pub intents: usize,
}

impl RuleCorpus {
    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Rejects documents the store would refuse part-way through.
    pub fn validate(&self) -> Result<(), SeedError> {
        for (index, rule) in self.interactions.iter().enumerate() {
            if rule.medications.len() < 2 {
                return Err(SeedError::TooFewMedications {
                    index,
                    count: rule.medications.len(),
                });
            }
        }

        let mut tags = HashSet::new();
        for rule in &self.intents {
            if !tags.insert(rule.tag.as_str()) {
                return Err(SeedError::DuplicateTag(rule.tag.clone()));
            }
        }
        Ok(())
    }

    /// Appends every rule in document order, so the corpus order after seeding
    /// follows the file. Either the whole document is stored or nothing is.
    pub async fn store(self, repo: &SqlRuleRepository) -> Result<SeedSummary, SeedError> {
        self.validate()?;
        let (interactions, intents) = repo.import(self.interactions, self.intents).await?;
        Ok(SeedSummary {
            interactions: interactions.len(),
            intents: intents.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::migrations::run_migrations;
    use crate::rules::{MedicationPair, RuleRepository};
    use tempfile::TempDir;

    const CORPUS: &str = r#"{
        "interactions": [
            {"medications": ["Warfarin", "Aspirin"], "warning": "Increased bleeding risk."}
        ],
        "intents": [
            {"tag": "greeting", "patterns": ["hello", "hi"], "responses": ["Hello! How can I help?"]},
            {"tag": "no_patterns", "responses": ["unused"]},
            {"tag": "default_fallback", "patterns": [], "responses": ["Sorry, I did not understand."]}
        ]
    }"#;

    #[test]
    fn missing_sections_default_to_empty() {
        let corpus = RuleCorpus::from_json("{}").expect("parse");
        assert!(corpus.interactions.is_empty());
        assert!(corpus.intents.is_empty());
    }

    #[test]
    fn invalid_document_is_reported() {
        let err = RuleCorpus::from_json("{\"interactions\": 3}").expect_err("invalid");
        assert!(matches!(err, SeedError::Json(_)));
    }

    async fn setup_repo() -> (SqlRuleRepository, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::new(&dir.path().join("seed.sqlite"))
            .await
            .expect("create db");
        run_migrations(&db).await.expect("migrations");
        (SqlRuleRepository::new(db), dir)
    }

    async fn stored_counts(repo: &SqlRuleRepository) -> (bool, usize) {
        let has_ab = repo
            .find_interaction_rule(&MedicationPair::new("a", "b"))
            .await
            .expect("query")
            .is_some();
        let intents = repo.all_intent_rules().await.expect("list").len();
        (has_ab, intents)
    }

    #[tokio::test]
    async fn store_writes_rules_in_document_order() {
        let (repo, _dir) = setup_repo().await;

        let summary = RuleCorpus::from_json(CORPUS)
            .expect("parse")
            .store(&repo)
            .await
            .expect("store");
        assert_eq!(summary, SeedSummary { interactions: 1, intents: 3 });

        let tags: Vec<String> = repo
            .all_intent_rules()
            .await
            .expect("list")
            .into_iter()
            .map(|rule| rule.tag)
            .collect();
        assert_eq!(tags, vec!["greeting", "no_patterns", "default_fallback"]);

        let no_patterns = repo
            .find_intent_rule_by_tag("no_patterns")
            .await
            .expect("query")
            .expect("present");
        assert_eq!(no_patterns.patterns, None);

        assert!(
            repo.find_interaction_rule(&MedicationPair::new("aspirin", "warfarin"))
                .await
                .expect("query")
                .is_some()
        );
    }

    #[tokio::test]
    async fn invalid_interaction_leaves_store_untouched() {
        let (repo, _dir) = setup_repo().await;
        let corpus = RuleCorpus::from_json(
            r#"{
                "interactions": [
                    {"medications": ["A", "B"], "warning": "ab"},
                    {"medications": ["Solo"], "warning": "invalid"}
                ],
                "intents": [{"tag": "greeting", "patterns": ["hi"], "responses": ["Hello"]}]
            }"#,
        )
        .expect("parse");

        let err = corpus.store(&repo).await.expect_err("invalid corpus");
        assert!(matches!(
            err,
            SeedError::TooFewMedications { index: 1, count: 1 }
        ));
        assert_eq!(stored_counts(&repo).await, (false, 0));

        let fixed = RuleCorpus::from_json(
            r#"{
                "interactions": [{"medications": ["A", "B"], "warning": "ab"}],
                "intents": [{"tag": "greeting", "patterns": ["hi"], "responses": ["Hello"]}]
            }"#,
        )
        .expect("parse");
        let summary = fixed.store(&repo).await.expect("reseed");
        assert_eq!(summary, SeedSummary { interactions: 1, intents: 1 });
        assert_eq!(stored_counts(&repo).await, (true, 1));
    }

    #[tokio::test]
    async fn duplicate_tags_in_document_are_rejected_before_writing() {
        let (repo, _dir) = setup_repo().await;
        let corpus = RuleCorpus::from_json(
            r#"{
                "interactions": [{"medications": ["A", "B"], "warning": "ab"}],
                "intents": [
                    {"tag": "greeting", "patterns": ["hi"], "responses": ["Hello"]},
                    {"tag": "greeting", "patterns": ["hey"], "responses": ["Yo"]}
                ]
            }"#,
        )
        .expect("parse");

        let err = corpus.store(&repo).await.expect_err("duplicate tag");
        assert!(matches!(err, SeedError::DuplicateTag(tag) if tag == "greeting"));
        assert_eq!(stored_counts(&repo).await, (false, 0));
    }

    #[tokio::test]
    async fn tag_clash_with_existing_corpus_rolls_back_whole_document() {
        let (repo, _dir) = setup_repo().await;
        RuleCorpus::from_json(
            r#"{"intents": [{"tag": "greeting", "patterns": ["hi"], "responses": ["Hello"]}]}"#,
        )
        .expect("parse")
        .store(&repo)
        .await
        .expect("first seed");

        let err = RuleCorpus::from_json(
            r#"{
                "interactions": [{"medications": ["A", "B"], "warning": "ab"}],
                "intents": [{"tag": "greeting", "patterns": ["hey"], "responses": ["Yo"]}]
            }"#,
        )
        .expect("parse")
        .store(&repo)
        .await
        .expect_err("existing tag");
        assert!(matches!(err, SeedError::Store(_)));
        assert_eq!(stored_counts(&repo).await, (false, 1));
    }
}
