//! Deletes issued from one client address within a window

use chrono::{Duration, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};

use super::{trail_limit, AuditTrailResponse};
use crate::audit::{AuditFilter, AuditRepository, Page};
use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::validation::{validate_hours, validate_ip, InputValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpActivityQuery {
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum IpActivityError {
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<IpActivityError> for AppError {
    fn from(err: IpActivityError) -> Self {
        match err {
            IpActivityError::Validation(e) => e.into(),
            IpActivityError::Database(e) => AppError::Database(e),
        }
    }
}

impl Request<Result<AuditTrailResponse, IpActivityError>> for IpActivityQuery {}

#[tracing::instrument(skip(repo))]
pub async fn handle(
    repo: &dyn AuditRepository,
    query: IpActivityQuery,
    default_hours: i64,
) -> Result<AuditTrailResponse, IpActivityError> {
    validate_ip(&query.ip_address)?;
    let hours = validate_hours(query.hours.unwrap_or(default_hours))?;
    let limit = trail_limit(query.limit)?;

    let since = Utc::now() - Duration::hours(hours);
    let filter = AuditFilter {
        since: Some(since),
        ..Default::default()
    }
    .ip(query.ip_address.trim());

    let records = repo.find(&filter, Page::first(limit)).await?;
    let total = repo.count(&filter).await?;

    Ok(AuditTrailResponse::new(records, total, Some(since)))
}
