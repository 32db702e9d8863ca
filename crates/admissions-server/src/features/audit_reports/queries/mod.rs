pub mod delete_attempts;
pub mod ip_activity;
pub mod list;
pub mod recent;
pub mod statistics;
pub mod user_activity;

pub use delete_attempts::{DeleteAttemptsError, DeleteAttemptsQuery};
pub use ip_activity::{IpActivityError, IpActivityQuery};
pub use list::{ListAuditLogsError, ListAuditLogsQuery, ListAuditLogsResponse};
pub use recent::{RecentDeletesError, RecentDeletesQuery};
pub use statistics::{
    AuditStatistics, ResourceTypeStats, StatisticsError, StatisticsQuery, StatisticsSettings,
    TopUser,
};
pub use user_activity::{UserActivityError, UserActivityQuery};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditRecord, DEFAULT_AUDIT_QUERY_LIMIT, MAX_AUDIT_QUERY_LIMIT};
use crate::features::shared::validation::{validate_range, InputValidationError};

/// Records returned by the trail queries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrailResponse {
    pub records: Vec<AuditRecord>,
    /// Number of records returned
    pub count: usize,
    /// Number of records matching the filter, which may exceed `count`
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl AuditTrailResponse {
    pub fn new(records: Vec<AuditRecord>, total: i64, since: Option<DateTime<Utc>>) -> Self {
        Self {
            count: records.len(),
            records,
            total,
            since,
        }
    }
}

/// Trail query limit, defaulting to 100 and bounded by 1000
pub(crate) fn trail_limit(limit: Option<i64>) -> Result<i64, InputValidationError> {
    match limit {
        Some(limit) => validate_range(limit, "limit", 1, MAX_AUDIT_QUERY_LIMIT),
        None => Ok(DEFAULT_AUDIT_QUERY_LIMIT),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::audit::{
        ActorSnapshot, AuditAction, AuditRecord, AuditResult, MemoryAuditRepository,
        NewAuditRecord, RequestDetails, ResourceType,
    };
    use chrono::{DateTime, Utc};

    pub struct Seed<'a> {
        pub kind: ResourceType,
        pub target: &'a str,
        pub user: Option<&'a str>,
        pub ip: &'a str,
        pub outcome: Option<bool>,
        pub at: DateTime<Utc>,
    }

    pub fn record(seed: &Seed<'_>) -> AuditRecord {
        let mut record = NewAuditRecord::builder(seed.kind)
            .target_id(seed.target)
            .performed_by(ActorSnapshot {
                user_id: seed.user.map(str::to_string),
                full_name: seed.user.map(|u| format!("{} name", u)),
                ..Default::default()
            })
            .request_details(RequestDetails {
                method: "DELETE".to_string(),
                url: format!("/api/v1/x/{}", seed.target),
                ip: seed.ip.to_string(),
                ..Default::default()
            })
            .timestamp(seed.at)
            .build()
            .into_record();

        if let Some(success) = seed.outcome {
            record.action = AuditAction::terminal(false, success);
            record.result = AuditResult {
                success,
                status_code: Some(if success { 200 } else { 500 }),
                ..Default::default()
            };
            record.updated_at = Some(seed.at);
        }
        record
    }

    pub async fn seeded(seeds: &[Seed<'_>]) -> MemoryAuditRepository {
        let repo = MemoryAuditRepository::new();
        for seed in seeds {
            repo.seed(record(seed)).await;
        }
        repo
    }
}
