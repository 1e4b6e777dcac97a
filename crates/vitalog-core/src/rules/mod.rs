pub mod memory;
pub mod repositories;
pub mod types;

pub use memory::MemoryRuleRepository;
pub use repositories::{RuleRepository, RuleStoreError, SqlRuleRepository};
pub use types::{
    InteractionRule, IntentRule, MedicationName, MedicationPair, NewInteractionRule,
    NewIntentRule,
};
