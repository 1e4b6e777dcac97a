//! libsql handle shared by the rule store and the drug registry.

use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use libsql::{Builder, Connection, Database as LibSqlDatabase, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::config::PathsConfig;

const AUTH_TOKEN_VAR: &str = "LIBSQL_AUTH_TOKEN";
const REMOTE_SCHEMES: [&str; 3] = ["libsql://", "http://", "https://"];

/// How long a local connection waits on a locked file before reporting busy.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to open database: {0}")]
    Build(libsql::Error),
    #[error("failed to open connection: {0}")]
    Connect(libsql::Error),
    #[error("failed to prepare connection: {0}")]
    Statement(libsql::Error),
    #[error("failed to begin write transaction: {0}")]
    Begin(libsql::Error),
    #[error("remote database {0} requires LIBSQL_AUTH_TOKEN")]
    MissingAuthToken(String),
}

/// Where the store lives once a configured path has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Local(PathBuf),
    Remote { url: String, auth_token: String },
}

impl DatabaseLocation {
    /// URLs become remote locations authenticated through `LIBSQL_AUTH_TOKEN`.
    /// Anything else is a local file with a leading `~` expanded.
    pub fn resolve(configured: &Path) -> Result<Self, DbError> {
        let raw = configured.to_string_lossy();
        if REMOTE_SCHEMES.iter().any(|scheme| raw.starts_with(scheme)) {
            let auth_token = env::var(AUTH_TOKEN_VAR)
                .ok()
                .filter(|token| !token.is_empty())
                .ok_or_else(|| DbError::MissingAuthToken(raw.to_string()))?;
            return Ok(Self::Remote {
                url: raw.into_owned(),
                auth_token,
            });
        }

        Ok(Self::Local(PathBuf::from(shellexpand::tilde(&raw).as_ref())))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Cloning is cheap; clones share one libsql database.
#[derive(Clone)]
pub struct Database {
    inner: Arc<LibSqlDatabase>,
    remote: bool,
}

impl Database {
    pub async fn new(database_path: &Path) -> Result<Self, DbError> {
        Self::open(DatabaseLocation::resolve(database_path)?).await
    }

    pub async fn from_paths(paths: &PathsConfig) -> Result<Self, DbError> {
        Self::new(&paths.database).await
    }

    pub async fn open(location: DatabaseLocation) -> Result<Self, DbError> {
        let remote = location.is_remote();
        let inner = match location {
            DatabaseLocation::Local(path) => {
                tracing::debug!(path = %path.display(), "opening local rule store");
                Builder::new_local(path).build().await
            }
            DatabaseLocation::Remote { url, auth_token } => {
                tracing::debug!(%url, "opening remote rule store");
                Builder::new_remote(url, auth_token).build().await
            }
        }
        .map_err(DbError::Build)?;

        Ok(Self {
            inner: Arc::new(inner),
            remote,
        })
    }

    /// Connection with foreign keys enforced. Local connections also wait up to
    /// [`BUSY_TIMEOUT`] for a competing writer instead of failing immediately.
    pub async fn connection(&self) -> Result<Connection, DbError> {
        let conn = self.inner.connect().map_err(DbError::Connect)?;
        if !self.remote {
            conn.busy_timeout(BUSY_TIMEOUT).map_err(DbError::Statement)?;
        }
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(DbError::Statement)?;
        Ok(conn)
    }

    /// Opens an `IMMEDIATE` transaction so the write lock is taken up front.
    /// Dropping the transaction without committing rolls everything back.
    pub async fn write_transaction(&self) -> Result<Transaction, DbError> {
        let conn = self.connection().await?;
        conn.transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(DbError::Begin)
    }

    pub async fn health_check(&self) -> Result<(), DbError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query("SELECT 1", ())
            .await
            .map_err(DbError::Statement)?;
        rows.next().await.map_err(DbError::Statement)?;
        Ok(())
    }
}
