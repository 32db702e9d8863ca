//! Deletes performed by one user

use mediator::Request;
use serde::{Deserialize, Serialize};

use super::{trail_limit, AuditTrailResponse};
use crate::audit::{AuditFilter, AuditRepository, Page};
use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::validation::{validate_identifier, InputValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityQuery {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserActivityError {
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<UserActivityError> for AppError {
    fn from(err: UserActivityError) -> Self {
        match err {
            UserActivityError::Validation(e) => e.into(),
            UserActivityError::Database(e) => AppError::Database(e),
        }
    }
}

impl Request<Result<AuditTrailResponse, UserActivityError>> for UserActivityQuery {}

#[tracing::instrument(skip(repo))]
pub async fn handle(
    repo: &dyn AuditRepository,
    query: UserActivityQuery,
) -> Result<AuditTrailResponse, UserActivityError> {
    validate_identifier(&query.user_id, "userId")?;
    let limit = trail_limit(query.limit)?;

    let filter = AuditFilter::default().user_id(query.user_id.trim());
    let records = repo.find(&filter, Page::first(limit)).await?;
    let total = repo.count(&filter).await?;

    Ok(AuditTrailResponse::new(records, total, None))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{seeded, Seed};
    use super::*;
    use crate::audit::ResourceType;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_only_the_users_records_newest_first() {
        let now = Utc::now();
        let repo = seeded(&[
            Seed {
                kind: ResourceType::Student,
                target: "S1",
                user: Some("u1"),
                ip: "10.0.0.1",
                outcome: Some(true),
                at: now - Duration::hours(3),
            },
            Seed {
                kind: ResourceType::Gallery,
                target: "G1",
                user: Some("u2"),
                ip: "10.0.0.1",
                outcome: Some(true),
                at: now - Duration::hours(2),
            },
            Seed {
                kind: ResourceType::Course,
                target: "C1",
                user: Some("u1"),
                ip: "10.0.0.1",
                outcome: Some(false),
                at: now - Duration::hours(1),
            },
        ])
        .await;

        let response = handle(
            &repo,
            UserActivityQuery {
                user_id: "u1".to_string(),
                limit: None,
            },
        )
        .await
        .unwrap();

        let targets: Vec<_> = response
            .records
            .iter()
            .filter_map(|r| r.target_id.as_deref())
            .collect();
        assert_eq!(targets, vec!["C1", "S1"]);
    }

    #[tokio::test]
    async fn test_empty_user_id_is_rejected() {
        let repo = seeded(&[]).await;
        let err = handle(
            &repo,
            UserActivityQuery {
                user_id: String::new(),
                limit: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserActivityError::Validation(_)));
    }
}
