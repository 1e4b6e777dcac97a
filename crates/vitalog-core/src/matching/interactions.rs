use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::rules::{MedicationPair, RuleRepository, RuleStoreError};

/// Result of an interaction check. `warnings` holds at most one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionReport {
    pub has_interaction: bool,
    pub warnings: Vec<String>,
}

impl InteractionReport {
    pub fn none() -> Self {
        Self {
            has_interaction: false,
            warnings: Vec::new(),
        }
    }

    pub fn found(warning: String) -> Self {
        Self {
            has_interaction: true,
            warnings: vec![warning],
        }
    }
}

/// Index pairs `(i, j)` with `i < j`, outer index ascending, then inner.
pub fn pairs(len: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len).flat_map(move |i| (i + 1..len).map(move |j| (i, j)))
}

#[derive(Clone)]
pub struct InteractionChecker {
    repo: Arc<dyn RuleRepository>,
}

impl InteractionChecker {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self { repo }
    }

    /// Looks up every pair of `names` in order and stops at the first pair with
    /// a rule. Fewer than two names never reach the repository, and a name
    /// repeated in the list is never paired with itself.
    #[tracing::instrument(skip_all, fields(medications = names.len()))]
    pub async fn check<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<InteractionReport, RuleStoreError> {
        if names.len() < 2 {
            return Ok(InteractionReport::none());
        }

        for (i, j) in pairs(names.len()) {
            let pair = MedicationPair::new(names[i].as_ref(), names[j].as_ref());
            if pair.is_self_pair() {
                continue;
            }
            if let Some(rule) = self.repo.find_interaction_rule(&pair).await? {
                tracing::debug!(rule_id = %rule.id, first = i, second = j, "interaction found");
                return Ok(InteractionReport::found(rule.warning));
            }
        }

        Ok(InteractionReport::none())
    }
}
