use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::DEFAULT_APOLOGY;
use crate::rules::IntentRule;

/// Source of uniformly distributed indices.
pub trait RandomSource: Send + Sync {
    /// Returns a value in `0..len`. `len` is never zero.
    fn index(&self, len: usize) -> usize;
}

/// Uses the calling thread's generator, so concurrent requests share nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Deterministic generator for tests and reproducible runs.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..len)
    }
}

#[derive(Clone)]
pub struct ResponseSelector {
    random: Arc<dyn RandomSource>,
    apology: String,
}

impl Default for ResponseSelector {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRandom))
    }
}

impl ResponseSelector {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self {
            random,
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }

    pub fn with_apology(mut self, apology: impl Into<String>) -> Self {
        self.apology = apology.into();
        self
    }

    pub fn apology(&self) -> &str {
        &self.apology
    }

    /// Picks one of the rule's responses uniformly; `None` if it has none.
    pub fn select(&self, rule: &IntentRule) -> Option<String> {
        if rule.responses.is_empty() {
            return None;
        }
        let index = self.random.index(rule.responses.len());
        rule.responses.get(index).cloned()
    }

    /// Reply used when no intent matched: a response of the fallback rule, or
    /// the apology when that rule is absent or has nothing to say.
    pub fn select_fallback(&self, fallback: Option<&IntentRule>) -> String {
        fallback
            .and_then(|rule| self.select(rule))
            .unwrap_or_else(|| self.apology.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rule(responses: &[&str]) -> IntentRule {
        IntentRule {
            id: "id".into(),
            tag: "tag".into(),
            patterns: Some(vec!["x".into()]),
            responses: responses.iter().map(|r| r.to_string()).collect(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn select_stays_within_response_set_and_reaches_every_entry() {
        let selector = ResponseSelector::new(Arc::new(SeededRandom::new(7)));
        let rule = rule(&["one", "two", "three"]);
        let allowed: HashSet<&str> = ["one", "two", "three"].into_iter().collect();

        let mut seen = HashSet::new();
        for _ in 0..300 {
            let picked = selector.select(&rule).expect("non-empty responses");
            assert!(allowed.contains(picked.as_str()), "unexpected response {picked}");
            seen.insert(picked);
        }
        assert_eq!(seen.len(), 3, "every response should be reachable");
    }

    #[test]
    fn thread_random_reaches_every_entry() {
        let selector = ResponseSelector::default();
        let rule = rule(&["a", "b"]);

        let seen: HashSet<String> = (0..200)
            .filter_map(|_| selector.select(&rule))
            .collect();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let rule = rule(&["a", "b", "c", "d"]);
        let first = ResponseSelector::new(Arc::new(SeededRandom::new(42)));
        let second = ResponseSelector::new(Arc::new(SeededRandom::new(42)));

        let a: Vec<_> = (0..20).map(|_| first.select(&rule)).collect();
        let b: Vec<_> = (0..20).map(|_| second.select(&rule)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn select_on_empty_responses_is_none() {
        let selector = ResponseSelector::default();
        assert_eq!(selector.select(&rule(&[])), None);
    }

    #[test]
    fn fallback_uses_rule_responses_when_present() {
        let selector = ResponseSelector::default();
        assert_eq!(selector.select_fallback(Some(&rule(&["sorry"]))), "sorry");
    }

    #[test]
    fn fallback_apologises_when_rule_missing_or_empty() {
        let selector = ResponseSelector::default().with_apology("offline");
        assert_eq!(selector.select_fallback(None), "offline");
        assert_eq!(selector.select_fallback(Some(&rule(&[]))), "offline");
    }

    #[test]
    fn default_apology_is_used_without_override() {
        let selector = ResponseSelector::default();
        assert_eq!(selector.select_fallback(None), DEFAULT_APOLOGY);
    }
}
