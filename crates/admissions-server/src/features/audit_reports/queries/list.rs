//! Paginated audit log listing with the full filter set

use admissions_common::time::parse_range;
use admissions_common::AdmissionsError;
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::api::response::PaginationMeta;
use crate::audit::{AuditAction, AuditFilter, AuditRecord, AuditRepository, ResourceType};
use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::pagination::PaginationParams;
use crate::features::shared::validation::{
    parse_enum, validate_identifier, validate_ip, InputValidationError,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAuditLogsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAuditLogsResponse {
    pub items: Vec<AuditRecord>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum ListAuditLogsError {
    #[error("{0}")]
    InvalidPagination(&'static str),
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error(transparent)]
    InvalidDate(#[from] AdmissionsError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<ListAuditLogsError> for AppError {
    fn from(err: ListAuditLogsError) -> Self {
        match err {
            ListAuditLogsError::Database(e) => AppError::Database(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl Request<Result<ListAuditLogsResponse, ListAuditLogsError>> for ListAuditLogsQuery {}

impl ListAuditLogsQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.limit)
    }

    /// Check every parameter and build the store filter
    pub fn validate(&self) -> Result<AuditFilter, ListAuditLogsError> {
        self.pagination()
            .validate()
            .map_err(ListAuditLogsError::InvalidPagination)?;

        let (since, until) = parse_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        let mut filter = AuditFilter::between(since, until);

        if let Some(ref kind) = self.resource_type {
            filter = filter.resource_type(parse_enum::<ResourceType>(kind, "resourceType")?);
        }
        if let Some(ref action) = self.action {
            filter = filter.action(parse_enum::<AuditAction>(action, "action")?);
        }
        if let Some(success) = self.success {
            filter = filter.success(success);
        }
        if let Some(ref user_id) = self.user_id {
            validate_identifier(user_id, "userId")?;
            filter = filter.user_id(user_id.trim());
        }
        if let Some(ref ip) = self.ip_address {
            validate_ip(ip)?;
            filter = filter.ip(ip.trim());
        }

        Ok(filter)
    }
}

#[tracing::instrument(skip(repo))]
pub async fn handle(
    repo: &dyn AuditRepository,
    query: ListAuditLogsQuery,
) -> Result<ListAuditLogsResponse, ListAuditLogsError> {
    let filter = query.validate()?;
    let pagination = query.pagination();

    let items = repo.find(&filter, pagination.to_page()).await?;
    let total = repo.count(&filter).await?;

    Ok(ListAuditLogsResponse {
        items,
        pagination: pagination.meta(total),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{seeded, Seed};
    use super::*;
    use chrono::{Duration, Utc};

    fn seeds() -> Vec<Seed<'static>> {
        let now = Utc::now();
        (0..25)
            .map(|i| Seed {
                kind: if i % 5 == 0 {
                    ResourceType::User
                } else {
                    ResourceType::Student
                },
                target: "T",
                user: Some(if i % 2 == 0 { "u-even" } else { "u-odd" }),
                ip: "10.1.1.1",
                outcome: Some(i % 3 != 0),
                at: now - Duration::minutes(i),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pagination_metadata() {
        let repo = seeded(&seeds()).await;

        let response = handle(
            &repo,
            ListAuditLogsQuery {
                page: Some(2),
                limit: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(response.items.len(), 10);
        assert_eq!(response.pagination.total, 25);
        assert_eq!(response.pagination.pages, 3);
        assert!(response.pagination.has_next);
        assert!(response.items[0].timestamp >= response.items[9].timestamp);
    }

    #[tokio::test]
    async fn test_combined_filters() {
        let repo = seeded(&seeds()).await;

        let response = handle(
            &repo,
            ListAuditLogsQuery {
                resource_type: Some("User".to_string()),
                success: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // i in {0, 15}: multiples of 5 and of 3
        assert_eq!(response.pagination.total, 2);
        assert!(response
            .items
            .iter()
            .all(|r| r.resource_type == ResourceType::User && !r.result.success));

        let by_action = handle(
            &repo,
            ListAuditLogsQuery {
                action: Some("DELETE_SUCCESS".to_string()),
                user_id: Some("u-even".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(by_action
            .items
            .iter()
            .all(|r| r.action == AuditAction::DeleteSuccess));
    }

    #[test]
    fn test_validation_errors() {
        let inverted = ListAuditLogsQuery {
            start_date: Some("2026-05-02".to_string()),
            end_date: Some("2026-05-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ListAuditLogsError::InvalidDate(_))
        ));

        let bad_page = ListAuditLogsQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            bad_page.validate(),
            Err(ListAuditLogsError::InvalidPagination(_))
        ));

        let bad_action = ListAuditLogsQuery {
            action: Some("DELETE_EVERYTHING".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            bad_action.validate(),
            Err(ListAuditLogsError::Validation(_))
        ));
    }
}
