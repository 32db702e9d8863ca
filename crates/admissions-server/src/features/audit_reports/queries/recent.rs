//! Recent deletes query
//!
//! Delete activity inside a "last N hours" window, optionally narrowed to
//! one resource kind.

use chrono::{Duration, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};

use super::AuditTrailResponse;
use crate::audit::{AuditFilter, AuditRepository, Page, ResourceType, MAX_AUDIT_QUERY_LIMIT};
use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::validation::{parse_enum, validate_hours, InputValidationError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDeletesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecentDeletesError {
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<RecentDeletesError> for AppError {
    fn from(err: RecentDeletesError) -> Self {
        match err {
            RecentDeletesError::Validation(e) => e.into(),
            RecentDeletesError::Database(e) => AppError::Database(e),
        }
    }
}

impl Request<Result<AuditTrailResponse, RecentDeletesError>> for RecentDeletesQuery {}

impl RecentDeletesQuery {
    pub fn validate(&self, default_hours: i64) -> Result<AuditFilter, RecentDeletesError> {
        let hours = validate_hours(self.hours.unwrap_or(default_hours))?;
        let mut filter = AuditFilter {
            since: Some(Utc::now() - Duration::hours(hours)),
            ..Default::default()
        };
        if let Some(ref kind) = self.resource_type {
            filter = filter.resource_type(parse_enum::<ResourceType>(kind, "resourceType")?);
        }
        Ok(filter)
    }
}

#[tracing::instrument(skip(repo))]
pub async fn handle(
    repo: &dyn AuditRepository,
    query: RecentDeletesQuery,
    default_hours: i64,
) -> Result<AuditTrailResponse, RecentDeletesError> {
    let filter = query.validate(default_hours)?;

    let records = repo.find(&filter, Page::first(MAX_AUDIT_QUERY_LIMIT)).await?;
    let total = repo.count(&filter).await?;

    Ok(AuditTrailResponse::new(records, total, filter.since))
}
