pub mod config;
pub mod constants;
pub mod db;
pub mod drugs;
pub mod matching;
pub mod migrations;
pub mod rules;
pub mod seed;
pub mod telemetry;

pub use config::{ChatbotConfig, Config};
pub use constants::{DEFAULT_APOLOGY, DEFAULT_FALLBACK_TAG};
pub use db::{Database, DatabaseLocation, DbError};
pub use drugs::{AuthenticDrug, DrugError, DrugRepository, NewAuthenticDrug, VerificationResult};
pub use matching::{
    ChatReply, InteractionChecker, InteractionReport, IntentMatcher, MatchError, MatchService,
    RandomSource, ResponseSelector, SeededRandom, ThreadRandom,
};
pub use rules::{
    InteractionRule, IntentRule, MedicationName, MedicationPair, MemoryRuleRepository,
    NewInteractionRule, NewIntentRule, RuleRepository, RuleStoreError, SqlRuleRepository,
};
pub use telemetry::{TelemetryError, TelemetryGuard, init_logging, init_telemetry};
