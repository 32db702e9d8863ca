//! Delete statistics over an optional date range
//!
//! Totals are derived from the per-resource-type aggregation so that the
//! headline counts and the breakdown always agree. `failed` includes
//! attempts that never received a terminal outcome; `pending` counts those
//! separately.

use admissions_common::time::parse_range;
use admissions_common::AdmissionsError;
use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditFilter, AuditRecord, AuditRepository, GroupKey, Page};
use crate::config::AuditConfig;
use crate::db::DbError;
use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Sizes of the ranked sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsSettings {
    pub top_users: usize,
    pub recent_attempts: i64,
}

impl From<&AuditConfig> for StatisticsSettings {
    fn from(config: &AuditConfig) -> Self {
        Self {
            top_users: config.top_users,
            recent_attempts: config.recent_attempts,
        }
    }
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        (&AuditConfig::default()).into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeStats {
    pub resource_type: String,
    pub count: i64,
    pub successful: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUser {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub count: i64,
    pub successful: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatistics {
    pub period: StatisticsPeriod,
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub pending: i64,
    /// Percentage with two decimals; 0 when there are no records
    pub success_rate: f64,
    pub by_resource_type: Vec<ResourceTypeStats>,
    pub top_users: Vec<TopUser>,
    pub recent_attempts: Vec<AuditRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error(transparent)]
    InvalidDate(#[from] AdmissionsError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<StatisticsError> for AppError {
    fn from(err: StatisticsError) -> Self {
        match err {
            StatisticsError::InvalidDate(e) => e.into(),
            StatisticsError::Database(e) => AppError::Database(e),
        }
    }
}

impl Request<Result<AuditStatistics, StatisticsError>> for StatisticsQuery {}

/// `successful / total * 100` rounded to two decimals
pub fn success_rate(successful: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = successful as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[tracing::instrument(skip(repo))]
pub async fn handle(
    repo: &dyn AuditRepository,
    query: StatisticsQuery,
    settings: StatisticsSettings,
) -> Result<AuditStatistics, StatisticsError> {
    let (start, end) = parse_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let filter = AuditFilter::between(start, end);

    let by_kind = repo.aggregate(&filter, GroupKey::ResourceType).await?;
    let by_actor = repo.aggregate(&filter, GroupKey::Actor).await?;
    let recent_attempts = repo
        .find(&filter, Page::first(settings.recent_attempts))
        .await?;

    let total = by_kind.iter().map(|g| g.count).sum();
    let successful = by_kind.iter().map(|g| g.successful).sum();
    let failed = by_kind.iter().map(|g| g.failed).sum();
    let pending = by_kind.iter().map(|g| g.pending).sum();

    let by_resource_type = by_kind
        .into_iter()
        .map(|g| ResourceTypeStats {
            resource_type: g.key.unwrap_or_default(),
            count: g.count,
            successful: g.successful,
            failed: g.failed,
        })
        .collect();

    let top_users = by_actor
        .into_iter()
        .take(settings.top_users)
        .map(|g| TopUser {
            user_id: g.key,
            email: g.first_actor.email,
            role: g.first_actor.role,
            full_name: g.first_actor.full_name,
            count: g.count,
            successful: g.successful,
            failed: g.failed,
        })
        .collect();

    tracing::debug!(total, successful, failed, "Computed delete statistics");

    Ok(AuditStatistics {
        period: StatisticsPeriod { start, end },
        total,
        successful,
        failed,
        pending,
        success_rate: success_rate(successful, total),
        by_resource_type,
        top_users,
        recent_attempts,
    })
}
