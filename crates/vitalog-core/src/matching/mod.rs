//! Rule matching: pairwise drug interaction checks and chatbot intent replies.

pub mod intents;
pub mod interactions;
pub mod selector;
pub mod service;

pub use intents::{IntentMatcher, first_match};
pub use interactions::{InteractionChecker, InteractionReport, pairs};
pub use selector::{RandomSource, ResponseSelector, SeededRandom, ThreadRandom};
pub use service::{ChatReply, MatchError, MatchService};
