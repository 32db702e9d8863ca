//! Offline delete investigation
//!
//! A single read-only pass over the audit trail and the business
//! collections. Only the startup connectivity check can fail the run; a
//! section that cannot be read becomes a warning in the report.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::lookup::CollectionLookup;
use super::report::{
    BulkFinding, CascadeFinding, Explanation, InvestigationReport, OrphanFinding, Reconciliation,
};
use super::InvestigationError;
use crate::audit::{
    AuditAction, AuditFilter, AuditRecord, AuditRepository, Page, ResourceType,
    DEFAULT_AUDIT_QUERY_LIMIT, MAX_AUDIT_QUERY_LIMIT,
};
use crate::db::DbResult;
use crate::features::shared::validation::{validate_hours, validate_identifier};

/// Kinds whose deletion is always part of the direct trail
pub const SENSITIVE_KINDS: [ResourceType; 2] = [ResourceType::User, ResourceType::Student];

pub const DEFAULT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestigationParams {
    pub hours_ago: i64,
    /// Actor or subject id; matched as target and as performer
    pub subject_id: Option<String>,
}

impl Default for InvestigationParams {
    fn default() -> Self {
        Self {
            hours_ago: DEFAULT_WINDOW_HOURS,
            subject_id: None,
        }
    }
}

impl InvestigationParams {
    /// Params from raw command-line input
    ///
    /// Never fails: an unusable window falls back to
    /// [`DEFAULT_WINDOW_HOURS`] and an unusable subject is dropped. Each
    /// fallback is returned as a notice for the operator.
    pub fn from_args(hours_ago: Option<&str>, subject_id: Option<&str>) -> (Self, Vec<String>) {
        let mut params = Self::default();
        let mut notices = Vec::new();

        if let Some(raw) = hours_ago.map(str::trim).filter(|s| !s.is_empty()) {
            match raw.parse::<i64>().map_err(|e| e.to_string()).and_then(|h| {
                validate_hours(h).map_err(|e| e.to_string())
            }) {
                Ok(hours) => params.hours_ago = hours,
                Err(reason) => {
                    warn!(value = %raw, %reason, "Unusable window, using default");
                    notices.push(format!(
                        "ignoring window '{}' ({}); using {} hours",
                        raw, reason, DEFAULT_WINDOW_HOURS
                    ));
                },
            }
        }

        if let Some(raw) = subject_id.map(str::trim).filter(|s| !s.is_empty()) {
            match validate_identifier(raw, "actorId") {
                Ok(()) => params.subject_id = Some(raw.to_string()),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Unusable subject id, ignoring it");
                    notices.push(format!("ignoring actor id '{}' ({})", raw, e));
                },
            }
        }

        (params, notices)
    }
}

pub struct DeletionAnalyzer {
    audit: Arc<dyn AuditRepository>,
    lookup: Arc<dyn CollectionLookup>,
}

impl DeletionAnalyzer {
    pub fn new(audit: Arc<dyn AuditRepository>, lookup: Arc<dyn CollectionLookup>) -> Self {
        Self { audit, lookup }
    }

    /// Verify both stores answer before any section runs
    pub async fn connect(&self) -> Result<(), InvestigationError> {
        self.lookup
            .ping()
            .await
            .map_err(InvestigationError::Connectivity)?;
        self.audit
            .count(&AuditFilter::default())
            .await
            .map_err(InvestigationError::Connectivity)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn investigate(
        &self,
        params: InvestigationParams,
    ) -> Result<InvestigationReport, InvestigationError> {
        let hours = validate_hours(params.hours_ago)?;
        let subject = match params.subject_id {
            Some(ref id) => {
                validate_identifier(id, "actorId")?;
                Some(id.trim().to_string())
            },
            None => None,
        };

        let since = Utc::now() - Duration::hours(hours);
        let mut report = InvestigationReport::new(hours, since, subject.clone());

        let trail_read = match self.direct_trail(since, subject.as_deref()).await {
            Ok(trail) => {
                report.direct_trail = trail;
                true
            },
            Err(e) => {
                warn!(error = %e, "Direct trail unavailable");
                report.warnings.push(format!("direct trail: {}", e));
                false
            },
        };

        let orphans_read = match self.orphans(since).await {
            Ok(orphans) => {
                report.orphans = orphans;
                true
            },
            Err(e) => {
                warn!(error = %e, "Orphan detection unavailable");
                report.warnings.push(format!("orphan detection: {}", e));
                false
            },
        };

        match self.cascades(since).await {
            Ok(cascades) => report.cascades = cascades,
            Err(e) => {
                warn!(error = %e, "Cascade surfacing unavailable");
                report.warnings.push(format!("cascading deletes: {}", e));
            },
        }

        match self.bulk_deletes(since).await {
            Ok(bulk) => report.bulk_deletes = bulk,
            Err(e) => {
                warn!(error = %e, "Bulk surfacing unavailable");
                report.warnings.push(format!("bulk deletes: {}", e));
            },
        }

        if trail_read && orphans_read && report.direct_trail.is_empty() && report.orphans.is_empty()
        {
            report.explanations = Explanation::ALL.to_vec();
        }

        info!(
            trail = report.direct_trail.len(),
            orphans = report.orphans.len(),
            cascades = report.cascades.len(),
            bulk = report.bulk_deletes.len(),
            warnings = report.warnings.len(),
            "Investigation finished"
        );

        Ok(report)
    }

    async fn direct_trail(
        &self,
        since: DateTime<Utc>,
        subject: Option<&str>,
    ) -> DbResult<Vec<AuditRecord>> {
        let window = AuditFilter {
            since: Some(since),
            ..Default::default()
        };

        let mut records = fetch_all(
            self.audit.as_ref(),
            &window.clone().resource_types(SENSITIVE_KINDS),
        )
        .await?;

        if let Some(subject) = subject {
            // Deletes of the subject are looked up without a window
            let as_target = AuditFilter::default().target_id(subject);
            records.extend(fetch_all(self.audit.as_ref(), &as_target).await?);

            let as_actor = window.user_id(subject);
            records.extend(fetch_all(self.audit.as_ref(), &as_actor).await?);
        }

        let mut seen = HashSet::new();
        records.retain(|r| seen.insert(r.id));
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn orphans(&self, since: DateTime<Utc>) -> DbResult<Vec<OrphanFinding>> {
        let students = self.lookup.students_with_parent_since(since).await?;
        debug!(candidates = students.len(), "Checking student parents");

        let mut orphans = Vec::new();
        for student in students {
            let Some(parent_id) = student.user_id.clone() else {
                continue;
            };
            if self.lookup.find_user(&parent_id).await?.is_some() {
                continue;
            }

            let parent_trail = self
                .audit
                .find(
                    &AuditFilter::default().target_id(parent_id.as_str()),
                    Page::first(DEFAULT_AUDIT_QUERY_LIMIT),
                )
                .await?;

            orphans.push(OrphanFinding {
                child_id: student.id,
                missing_parent_id: parent_id,
                child_full_name: student.full_name,
                child_email: student.email,
                child_application_number: student.application_number,
                child_created_at: student.created_at,
                parent_trail,
            });
        }
        Ok(orphans)
    }

    async fn cascades(&self, since: DateTime<Utc>) -> DbResult<Vec<CascadeFinding>> {
        let cascading: Vec<ResourceType> = ResourceType::ALL
            .into_iter()
            .filter(|k| !k.cascades_to().is_empty())
            .collect();

        let filter = AuditFilter {
            since: Some(since),
            ..Default::default()
        }
        .resource_types(cascading)
        .success(true);

        let records = fetch_all(self.audit.as_ref(), &filter).await?;
        Ok(records
            .into_iter()
            .map(|record| CascadeFinding {
                cascades_to: record.resource_type.cascades_to().to_vec(),
                record,
            })
            .collect())
    }

    async fn bulk_deletes(&self, since: DateTime<Utc>) -> DbResult<Vec<BulkFinding>> {
        let filter = AuditFilter {
            since: Some(since),
            ..Default::default()
        }
        .actions([AuditAction::BulkDeleteAttempt, AuditAction::BulkDeleteSuccess]);

        let records = fetch_all(self.audit.as_ref(), &filter).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let requested = record.target_ids.len();
                let deleted_count = record.result.deleted_count;
                BulkFinding {
                    reconciliation: Reconciliation::of(requested, deleted_count),
                    requested,
                    deleted_count,
                    record,
                }
            })
            .collect())
    }
}

/// Every record matching `filter`, newest first
async fn fetch_all(
    repo: &dyn AuditRepository,
    filter: &AuditFilter,
) -> DbResult<Vec<AuditRecord>> {
    let mut records = Vec::new();
    let mut offset = 0;
    loop {
        let page = repo
            .find(filter, Page::new(offset, MAX_AUDIT_QUERY_LIMIT))
            .await?;
        let fetched = page.len() as i64;
        records.extend(page);
        if fetched < MAX_AUDIT_QUERY_LIMIT {
            break;
        }
        offset += fetched;
    }
    Ok(records)
}
