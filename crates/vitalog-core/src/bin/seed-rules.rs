//! Loads a JSON rule corpus into the configured database.
//!
//! Usage: `seed-rules <corpus.json>` (reads `CONFIG_PATH`, default `config.toml`).

use std::env;
use std::error::Error;

use vitalog_core::migrations::run_migrations;
use vitalog_core::seed::RuleCorpus;
use vitalog_core::{Config, Database, SqlRuleRepository, init_logging};

type AnyError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let corpus_path = env::args()
        .nth(1)
        .ok_or("usage: seed-rules <corpus.json>")?;
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    init_logging(&config.app.env)?;

    let db = Database::from_paths(&config.paths).await?;
    run_migrations(&db).await?;

    let corpus = RuleCorpus::load(&corpus_path)?;
    let summary = corpus.store(&SqlRuleRepository::new(db)).await?;
    tracing::info!(
        interactions = summary.interactions,
        intents = summary.intents,
        corpus = %corpus_path,
        "rule corpus seeded"
    );
    Ok(())
}
