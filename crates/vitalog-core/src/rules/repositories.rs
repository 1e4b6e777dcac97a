use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Row, params};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{Database, DbError};

use super::types::{
    InteractionRule, IntentRule, MedicationPair, NewInteractionRule, NewIntentRule,
    decode_patterns, decode_responses, normalize_name,
};

const INTENT_RULE_COLUMNS: &str = "id, tag, patterns_json, responses_json, created_at";

#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("sql error: {0}")]
    Sql(#[from] libsql::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
    #[error("interaction rule must name at least two medications")]
    TooFewMedications,
    #[error("rule not found: {0}")]
    NotFound(String),
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the interaction and intent corpora.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// First interaction rule, in corpus order, that names both sides of `pair`.
    async fn find_interaction_rule(
        &self,
        pair: &MedicationPair,
    ) -> Result<Option<InteractionRule>, RuleStoreError>;

    /// Every intent rule in corpus order.
    async fn all_intent_rules(&self) -> Result<Vec<IntentRule>, RuleStoreError>;

    async fn find_intent_rule_by_tag(
        &self,
        tag: &str,
    ) -> Result<Option<IntentRule>, RuleStoreError>;
}

/// libsql-backed rule store. Corpus order is insertion order.
#[derive(Clone)]
pub struct SqlRuleRepository {
    db: Database,
}

impl SqlRuleRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_interaction_rule(
        &self,
        new_rule: NewInteractionRule,
    ) -> Result<InteractionRule, RuleStoreError> {
        let tx = self.db.write_transaction().await?;
        let rule = insert_interaction_rule(&tx, new_rule).await?;
        tx.commit().await?;
        Ok(rule)
    }

    pub async fn create_intent_rule(
        &self,
        new_rule: NewIntentRule,
    ) -> Result<IntentRule, RuleStoreError> {
        let conn = self.db.connection().await?;
        insert_intent_rule(&conn, new_rule).await
    }

    /// Appends every rule inside one write transaction, interactions first.
    /// Any failure leaves the corpora exactly as they were.
    pub async fn import(
        &self,
        interactions: Vec<NewInteractionRule>,
        intents: Vec<NewIntentRule>,
    ) -> Result<(Vec<InteractionRule>, Vec<IntentRule>), RuleStoreError> {
        let tx = self.db.write_transaction().await?;

        let mut stored_interactions = Vec::with_capacity(interactions.len());
        for rule in interactions {
            stored_interactions.push(insert_interaction_rule(&tx, rule).await?);
        }
        let mut stored_intents = Vec::with_capacity(intents.len());
        for rule in intents {
            stored_intents.push(insert_intent_rule(&tx, rule).await?);
        }

        tx.commit().await?;
        Ok((stored_interactions, stored_intents))
    }

    pub async fn delete_intent_rule(&self, tag: &str) -> Result<(), RuleStoreError> {
        let conn = self.db.connection().await?;
        let affected = conn
            .execute("DELETE FROM intent_rules WHERE tag = ?1", params![tag])
            .await?;
        if affected == 0 {
            return Err(RuleStoreError::NotFound(tag.to_string()));
        }
        Ok(())
    }

    async fn load_interaction_rule(
        &self,
        conn: &Connection,
        id: String,
        warning: String,
        created_at: String,
    ) -> Result<InteractionRule, RuleStoreError> {
        let mut rows = conn
            .query(
                "SELECT name FROM interaction_rule_medications
                 WHERE rule_id = ?1
                 ORDER BY position",
                params![id.clone()],
            )
            .await?;
        let mut medications = Vec::new();
        while let Some(row) = rows.next().await? {
            medications.push(row.get::<String>(0)?);
        }

        Ok(InteractionRule {
            id,
            medications,
            warning,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

#[async_trait]
impl RuleRepository for SqlRuleRepository {
    async fn find_interaction_rule(
        &self,
        pair: &MedicationPair,
    ) -> Result<Option<InteractionRule>, RuleStoreError> {
        let (first, second) = pair.keys();
        let conn = self.db.connection().await?;
        let mut rows = conn
            .query(
                "SELECT r.id, r.warning, r.created_at
                 FROM interaction_rules r
                 WHERE EXISTS (
                     SELECT 1 FROM interaction_rule_medications m
                     WHERE m.rule_id = r.id AND m.name_key = ?1
                 )
                 AND EXISTS (
                     SELECT 1 FROM interaction_rule_medications m
                     WHERE m.rule_id = r.id AND m.name_key = ?2
                 )
                 ORDER BY r.rowid
                 LIMIT 1",
                params![first, second],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let id: String = row.get(0)?;
        let warning: String = row.get(1)?;
        let created_at: String = row.get(2)?;
        drop(rows);

        self.load_interaction_rule(&conn, id, warning, created_at)
            .await
            .map(Some)
    }

    async fn all_intent_rules(&self) -> Result<Vec<IntentRule>, RuleStoreError> {
        let conn = self.db.connection().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {INTENT_RULE_COLUMNS} FROM intent_rules ORDER BY rowid"),
                (),
            )
            .await?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push(row_to_intent_rule(row)?);
        }
        Ok(rules)
    }

    async fn find_intent_rule_by_tag(
        &self,
        tag: &str,
    ) -> Result<Option<IntentRule>, RuleStoreError> {
        let conn = self.db.connection().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {INTENT_RULE_COLUMNS} FROM intent_rules WHERE tag = ?1"),
                params![tag],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row_to_intent_rule(row).map(Some),
            None => Ok(None),
        }
    }
}

async fn insert_interaction_rule(
    conn: &Connection,
    new_rule: NewInteractionRule,
) -> Result<InteractionRule, RuleStoreError> {
    if new_rule.medications.len() < 2 {
        return Err(RuleStoreError::TooFewMedications);
    }

    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO interaction_rules (id, warning, created_at) VALUES (?1, ?2, ?3)",
        params![id.clone(), new_rule.warning.clone(), now.clone()],
    )
    .await?;
    for (position, name) in new_rule.medications.iter().enumerate() {
        conn.execute(
            "INSERT INTO interaction_rule_medications (rule_id, position, name, name_key)
             VALUES (?1, ?2, ?3, ?4)",
            params![id.clone(), position as i64, name.clone(), normalize_name(name)],
        )
        .await?;
    }

    Ok(InteractionRule {
        id,
        medications: new_rule.medications,
        warning: new_rule.warning,
        created_at: parse_timestamp(&now)?,
    })
}

async fn insert_intent_rule(
    conn: &Connection,
    new_rule: NewIntentRule,
) -> Result<IntentRule, RuleStoreError> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let patterns_json = json_column(&new_rule.patterns)?;
    let responses_json = json_column(&new_rule.responses)?;
    let mut rows = conn
        .query(
            &format!(
                "INSERT INTO intent_rules (id, tag, patterns_json, responses_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {INTENT_RULE_COLUMNS}"
            ),
            params![id, new_rule.tag.clone(), patterns_json, responses_json, now],
        )
        .await?;

    match rows.next().await? {
        Some(row) => row_to_intent_rule(row),
        None => Err(RuleStoreError::NotFound(new_rule.tag)),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RuleStoreError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn json_column(value: &Value) -> Result<Option<String>, RuleStoreError> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(value)?))
}

/// Decodes a stored JSON column. Unparseable text reads as a missing field.
fn stored_json(tag: &str, column: &str, raw: Option<String>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(tag, column, error = %err, "ignoring unparseable intent rule field");
            Value::Null
        }
    }
}

fn row_to_intent_rule(row: Row) -> Result<IntentRule, RuleStoreError> {
    let tag: String = row.get(1)?;
    let patterns_json: Option<String> = row.get(2)?;
    let responses_json: Option<String> = row.get(3)?;
    let created_at: String = row.get(4)?;

    let patterns = decode_patterns(&stored_json(&tag, "patterns", patterns_json));
    let responses = decode_responses(&stored_json(&tag, "responses", responses_json));

    Ok(IntentRule {
        id: row.get(0)?,
        tag,
        patterns,
        responses,
        created_at: parse_timestamp(&created_at)?,
    })
}
