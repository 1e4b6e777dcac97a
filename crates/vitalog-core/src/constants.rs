/// Tag of the intent rule consulted when no other intent matches.
pub const DEFAULT_FALLBACK_TAG: &str = "default_fallback";

/// Last-resort chatbot reply when the fallback rule is missing or has no responses.
pub const DEFAULT_APOLOGY: &str =
    "Sorry, I'm having a technical difficulty and cannot respond right now.";
