//! Drug authenticity lookup by QR code identifier.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::{Row, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Database, DbError};

const AUTHENTIC_DRUG_COLUMNS: &str = "qr_code_id, product_name, batch, expiration_date, created_at";

#[derive(Debug, Error)]
pub enum DrugError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("sql error: {0}")]
    Sql(#[from] libsql::Error),
    #[error("date parse error: {0}")]
    DateParse(#[from] chrono::ParseError),
    #[error("drug already registered: {0}")]
    AlreadyRegistered(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticDrug {
    pub qr_code_id: String,
    pub product_name: String,
    pub batch: String,
    pub expiration_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthenticDrug {
    pub qr_code_id: String,
    pub product_name: String,
    pub batch: String,
    pub expiration_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub authentic: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AuthenticDrug>,
}

impl VerificationResult {
    pub fn from_lookup(found: Option<AuthenticDrug>) -> Self {
        match found {
            Some(drug) => Self {
                authentic: true,
                message: "Authentic medication.".into(),
                data: Some(drug),
            },
            None => Self {
                authentic: false,
                message: "Product not found in our registry. Possible counterfeit.".into(),
                data: None,
            },
        }
    }
}

#[derive(Clone)]
pub struct DrugRepository {
    db: Database,
}

impl DrugRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers a drug. A second registration of the same QR code is
    /// rejected by the primary key and reported as `AlreadyRegistered`.
    pub async fn create(&self, new_drug: NewAuthenticDrug) -> Result<AuthenticDrug, DrugError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let qr_code_id = new_drug.qr_code_id.clone();
        let conn = self.db.connection().await?;
        let inserted = conn
            .execute(
                &format!(
                    "INSERT INTO authentic_drugs ({AUTHENTIC_DRUG_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![
                    new_drug.qr_code_id,
                    new_drug.product_name.clone(),
                    new_drug.batch.clone(),
                    new_drug.expiration_date.to_string(),
                    now.clone()
                ],
            )
            .await;

        match inserted {
            Ok(_) => Ok(AuthenticDrug {
                qr_code_id,
                product_name: new_drug.product_name,
                batch: new_drug.batch,
                expiration_date: new_drug.expiration_date,
                created_at: DateTime::parse_from_rfc3339(&now)?.with_timezone(&Utc),
            }),
            Err(err) if is_constraint_violation(&err) => {
                Err(DrugError::AlreadyRegistered(qr_code_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_by_qr_code(
        &self,
        qr_code_id: &str,
    ) -> Result<Option<AuthenticDrug>, DrugError> {
        let conn = self.db.connection().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {AUTHENTIC_DRUG_COLUMNS} FROM authentic_drugs WHERE qr_code_id = ?1"
                ),
                params![qr_code_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row_to_drug(row).map(Some),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, qr_code_id: &str) -> Result<VerificationResult, DrugError> {
        let found = self.find_by_qr_code(qr_code_id).await?;
        tracing::info!(authentic = found.is_some(), "drug verification");
        Ok(VerificationResult::from_lookup(found))
    }
}

fn is_constraint_violation(err: &libsql::Error) -> bool {
    let code = match err {
        libsql::Error::SqliteFailure(code, _) => *code,
        libsql::Error::RemoteSqliteFailure(code, _, _) => *code,
        _ => return false,
    };
    code & 0xff == libsql::ffi::SQLITE_CONSTRAINT
}

fn row_to_drug(row: Row) -> Result<AuthenticDrug, DrugError> {
    let expiration_date: String = row.get(3)?;
    let created_at: String = row.get(4)?;

    Ok(AuthenticDrug {
        qr_code_id: row.get(0)?,
        product_name: row.get(1)?,
        batch: row.get(2)?,
        expiration_date: NaiveDate::parse_from_str(&expiration_date, "%Y-%m-%d")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
    })
}
