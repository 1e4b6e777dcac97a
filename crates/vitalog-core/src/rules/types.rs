use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A drug display name compared case-insensitively.
///
/// Only the surrounding whitespace is trimmed; inner whitespace and punctuation
/// are compared as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicationName(String);

impl MedicationName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Comparison form used for rule lookups.
    pub fn key(&self) -> String {
        normalize_name(&self.0)
    }
}

impl PartialEq for MedicationName {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MedicationName {}

impl fmt::Display for MedicationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MedicationName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MedicationName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Unordered pair of medications being checked against the interaction corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicationPair {
    pub first: MedicationName,
    pub second: MedicationName,
}

impl MedicationPair {
    pub fn new(first: impl Into<MedicationName>, second: impl Into<MedicationName>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn keys(&self) -> (String, String) {
        (self.first.key(), self.second.key())
    }

    /// Both sides name the same medication once normalized.
    pub fn is_self_pair(&self) -> bool {
        self.first.key() == self.second.key()
    }

    /// True when `names` contains an entry equal to each side of the pair.
    pub fn is_covered_by<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let (first, second) = self.keys();
        let mut has_first = false;
        let mut has_second = false;
        for name in names {
            let key = normalize_name(name);
            has_first |= key == first;
            has_second |= key == second;
            if has_first && has_second {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRule {
    pub id: String,
    pub medications: Vec<String>,
    pub warning: String,
    pub created_at: DateTime<Utc>,
}

impl InteractionRule {
    pub fn matches(&self, pair: &MedicationPair) -> bool {
        pair.is_covered_by(self.medications.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInteractionRule {
    pub medications: Vec<String>,
    pub warning: String,
}

/// A chatbot intent. `patterns` is `None` when the stored document had no
/// pattern list at all (or something other than a list); such rules never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRule {
    pub id: String,
    pub tag: String,
    pub patterns: Option<Vec<String>>,
    pub responses: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl IntentRule {
    pub fn has_responses(&self) -> bool {
        !self.responses.is_empty()
    }
}

/// Intent document as written by administrators. Kept as raw JSON so the store
/// accepts whatever shape it is handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIntentRule {
    pub tag: String,
    #[serde(default)]
    pub patterns: Value,
    #[serde(default)]
    pub responses: Value,
}

impl NewIntentRule {
    pub fn new(tag: impl Into<String>, patterns: &[&str], responses: &[&str]) -> Self {
        Self {
            tag: tag.into(),
            patterns: Value::from(patterns.to_vec()),
            responses: Value::from(responses.to_vec()),
        }
    }
}

/// Reads a pattern list from a stored document. Anything other than a JSON array
/// yields `None`; non-string elements are dropped.
pub fn decode_patterns(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| string_items(items))
}

/// Reads a response list; malformed documents decode to an empty list.
pub fn decode_responses(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| string_items(items))
        .unwrap_or_default()
}

fn string_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}
