//! Delete several students in one statement
//!
//! Ids that do not exist are skipped; `deleted_count` reports how many rows
//! actually went away so the audit trail can reconcile it against the
//! requested ids.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::audit::MAX_AUDIT_QUERY_LIMIT;
use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::validation::{validate_identifier, InputValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteStudentsCommand {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteStudentsResponse {
    pub deleted: Vec<String>,
    pub deleted_count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum BulkDeleteStudentsError {
    #[error("ids must contain at least one id")]
    Empty,
    #[error("At most {0} ids can be deleted at once")]
    TooMany(i64),
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<BulkDeleteStudentsError> for AppError {
    fn from(err: BulkDeleteStudentsError) -> Self {
        match err {
            BulkDeleteStudentsError::Database(e) => AppError::Database(DbError::Sqlx(e)),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl Request<Result<BulkDeleteStudentsResponse, BulkDeleteStudentsError>>
    for BulkDeleteStudentsCommand
{
}

impl BulkDeleteStudentsCommand {
    pub fn validate(&self) -> Result<(), BulkDeleteStudentsError> {
        if self.ids.is_empty() {
            return Err(BulkDeleteStudentsError::Empty);
        }
        if self.ids.len() as i64 > MAX_AUDIT_QUERY_LIMIT {
            return Err(BulkDeleteStudentsError::TooMany(MAX_AUDIT_QUERY_LIMIT));
        }
        for id in &self.ids {
            validate_identifier(id, "ids")?;
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(requested = command.ids.len()))]
pub async fn handle(
    pool: PgPool,
    command: BulkDeleteStudentsCommand,
) -> Result<BulkDeleteStudentsResponse, BulkDeleteStudentsError> {
    command.validate()?;

    let ids: Vec<String> = command.ids.iter().map(|id| id.trim().to_string()).collect();
    let deleted: Vec<String> =
        sqlx::query_scalar("DELETE FROM students WHERE id = ANY($1) RETURNING id")
            .bind(&ids)
            .fetch_all(&pool)
            .await?;

    if deleted.len() < ids.len() {
        tracing::warn!(
            requested = ids.len(),
            deleted = deleted.len(),
            "Bulk student delete skipped missing ids"
        );
    }

    Ok(BulkDeleteStudentsResponse {
        deleted_count: deleted.len() as i64,
        deleted,
    })
}
