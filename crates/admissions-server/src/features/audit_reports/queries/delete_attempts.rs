//! Delete attempts for one target
//!
//! Every record naming the id, either as the single target or as a member of
//! a bulk target list.

use mediator::Request;
use serde::{Deserialize, Serialize};

use super::{trail_limit, AuditTrailResponse};
use crate::audit::{AuditFilter, AuditRepository, Page};
use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::validation::{validate_identifier, InputValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAttemptsQuery {
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteAttemptsError {
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<DeleteAttemptsError> for AppError {
    fn from(err: DeleteAttemptsError) -> Self {
        match err {
            DeleteAttemptsError::Validation(e) => e.into(),
            DeleteAttemptsError::Database(e) => AppError::Database(e),
        }
    }
}

impl Request<Result<AuditTrailResponse, DeleteAttemptsError>> for DeleteAttemptsQuery {}

#[tracing::instrument(skip(repo))]
pub async fn handle(
    repo: &dyn AuditRepository,
    query: DeleteAttemptsQuery,
) -> Result<AuditTrailResponse, DeleteAttemptsError> {
    validate_identifier(&query.target_id, "id")?;
    let limit = trail_limit(query.limit)?;

    let filter = AuditFilter::default().target_id(query.target_id.trim());
    let records = repo.find(&filter, Page::first(limit)).await?;
    let total = repo.count(&filter).await?;

    tracing::debug!(target_id = %query.target_id, count = records.len(), "Loaded delete attempts");

    Ok(AuditTrailResponse::new(records, total, None))
}
