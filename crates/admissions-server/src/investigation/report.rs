//! Investigation report and its plain-text rendering

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::audit::{AuditRecord, ResourceType};

/// How a bulk delete's reported count compares to the ids it named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Reconciliation {
    /// `deletedCount` equals the number of requested ids
    Matched,
    /// Fewer rows went away than were requested
    Partial { missing: i64 },
    /// More rows went away than were requested
    Excess { extra: i64 },
    /// No `deletedCount` was recorded
    Unreported,
}

impl Reconciliation {
    pub fn of(requested: usize, deleted_count: Option<i64>) -> Self {
        let Some(deleted) = deleted_count else {
            return Reconciliation::Unreported;
        };
        let requested = requested as i64;
        match deleted.cmp(&requested) {
            std::cmp::Ordering::Equal => Reconciliation::Matched,
            std::cmp::Ordering::Less => Reconciliation::Partial {
                missing: requested - deleted,
            },
            std::cmp::Ordering::Greater => Reconciliation::Excess {
                extra: deleted - requested,
            },
        }
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconciliation::Matched => write!(f, "count matches"),
            Reconciliation::Partial { missing } => write!(f, "{} requested id(s) not deleted", missing),
            Reconciliation::Excess { extra } => write!(f, "{} more row(s) deleted than requested", extra),
            Reconciliation::Unreported => write!(f, "no deleted count recorded"),
        }
    }
}

/// A child record whose parent no longer resolves
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanFinding {
    pub child_id: String,
    pub missing_parent_id: String,
    pub child_full_name: Option<String>,
    pub child_email: Option<String>,
    pub child_application_number: Option<String>,
    pub child_created_at: DateTime<Utc>,
    /// Audit records naming the missing parent, newest first
    pub parent_trail: Vec<AuditRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeFinding {
    pub record: AuditRecord,
    pub cascades_to: Vec<ResourceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFinding {
    pub record: AuditRecord,
    pub requested: usize,
    pub deleted_count: Option<i64>,
    pub reconciliation: Reconciliation,
}

/// Possible causes offered when the trail explains nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Explanation {
    PreAuditEra,
    OutOfBand,
    ExternalTooling,
}

impl Explanation {
    pub const ALL: [Explanation; 3] = [
        Explanation::PreAuditEra,
        Explanation::OutOfBand,
        Explanation::ExternalTooling,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Explanation::PreAuditEra => {
                "The record was deleted before delete auditing was enabled, or outside the window"
            },
            Explanation::OutOfBand => {
                "The record was removed directly in the database, bypassing the API"
            },
            Explanation::ExternalTooling => {
                "A script, migration or admin tool deleted it without going through audited routes"
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationReport {
    pub generated_at: DateTime<Utc>,
    pub window_hours: i64,
    pub since: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub direct_trail: Vec<AuditRecord>,
    pub orphans: Vec<OrphanFinding>,
    pub cascades: Vec<CascadeFinding>,
    pub bulk_deletes: Vec<BulkFinding>,
    pub explanations: Vec<Explanation>,
    /// Sections that could not be read, with the reason
    pub warnings: Vec<String>,
}

impl InvestigationReport {
    pub fn new(window_hours: i64, since: DateTime<Utc>, subject_id: Option<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            window_hours,
            since,
            subject_id,
            direct_trail: Vec::new(),
            orphans: Vec::new(),
            cascades: Vec::new(),
            bulk_deletes: Vec::new(),
            explanations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Orphans plus bulk deletes whose counts do not reconcile
    pub fn anomaly_count(&self) -> usize {
        self.orphans.len()
            + self
                .bulk_deletes
                .iter()
                .filter(|b| !matches!(b.reconciliation, Reconciliation::Matched))
                .count()
    }
}

fn actor(record: &AuditRecord) -> String {
    let by = &record.performed_by;
    match (&by.user_id, &by.email) {
        (Some(id), Some(email)) => format!("{} <{}>", id, email),
        (Some(id), None) => id.clone(),
        (None, Some(email)) => email.clone(),
        (None, None) => "anonymous".to_string(),
    }
}

fn target(record: &AuditRecord) -> String {
    match &record.target_id {
        Some(id) => id.clone(),
        None if !record.target_ids.is_empty() => format!("[{}]", record.target_ids.join(", ")),
        None => "-".to_string(),
    }
}

fn write_record(f: &mut fmt::Formatter<'_>, record: &AuditRecord) -> fmt::Result {
    writeln!(
        f,
        "  {}  {:<20} {:<12} {:<24} by {} from {} ({})",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.action,
        record.resource_type,
        target(record),
        actor(record),
        record.request_details.ip,
        record
            .result
            .status_code
            .map(|s| s.to_string())
            .unwrap_or_else(|| "pending".to_string()),
    )
}

impl fmt::Display for InvestigationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Delete investigation")?;
        writeln!(
            f,
            "Window: last {} hour(s), since {}",
            self.window_hours,
            self.since.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        if let Some(ref subject) = self.subject_id {
            writeln!(f, "Subject: {}", subject)?;
        }
        writeln!(f)?;

        writeln!(f, "1. Direct audit trail ({})", self.direct_trail.len())?;
        if self.direct_trail.is_empty() {
            writeln!(f, "  no matching delete records")?;
        }
        for record in &self.direct_trail {
            write_record(f, record)?;
        }
        writeln!(f)?;

        writeln!(f, "2. Orphaned references ({})", self.orphans.len())?;
        if self.orphans.is_empty() {
            writeln!(f, "  none")?;
        }
        for orphan in &self.orphans {
            writeln!(
                f,
                "  Student {} references missing User {} (created {})",
                orphan.child_id,
                orphan.missing_parent_id,
                orphan.child_created_at.format("%Y-%m-%d %H:%M:%S")
            )?;
            if let Some(ref name) = orphan.child_full_name {
                writeln!(f, "    name: {}", name)?;
            }
            if let Some(ref email) = orphan.child_email {
                writeln!(f, "    email: {}", email)?;
            }
            if let Some(ref number) = orphan.child_application_number {
                writeln!(f, "    application: {}", number)?;
            }
            if orphan.parent_trail.is_empty() {
                writeln!(f, "    no audit record names the parent")?;
            }
            for record in &orphan.parent_trail {
                write_record(f, record)?;
            }
        }
        writeln!(f)?;

        writeln!(f, "3. Cascading deletes ({})", self.cascades.len())?;
        if self.cascades.is_empty() {
            writeln!(f, "  none")?;
        }
        for cascade in &self.cascades {
            write_record(f, &cascade.record)?;
            let kinds: Vec<&str> = cascade.cascades_to.iter().map(|k| k.as_str()).collect();
            writeln!(f, "    may also have removed: {}", kinds.join(", "))?;
        }
        writeln!(f)?;

        writeln!(f, "4. Bulk deletes ({})", self.bulk_deletes.len())?;
        if self.bulk_deletes.is_empty() {
            writeln!(f, "  none")?;
        }
        for bulk in &self.bulk_deletes {
            write_record(f, &bulk.record)?;
            writeln!(
                f,
                "    requested {}, deleted {}: {}",
                bulk.requested,
                bulk.deleted_count
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                bulk.reconciliation
            )?;
        }

        if !self.explanations.is_empty() {
            writeln!(f)?;
            writeln!(f, "No audit trail and no orphans found. Possible explanations:")?;
            for explanation in &self.explanations {
                writeln!(f, "  - {}", explanation.description())?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  ! {}", warning)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NewAuditRecord;

    #[test]
    fn test_reconciliation() {
        assert_eq!(Reconciliation::of(2, Some(2)), Reconciliation::Matched);
        assert_eq!(
            Reconciliation::of(3, Some(1)),
            Reconciliation::Partial { missing: 2 }
        );
        assert_eq!(Reconciliation::of(1, Some(4)), Reconciliation::Excess { extra: 3 });
        assert_eq!(Reconciliation::of(2, None), Reconciliation::Unreported);
    }

    #[test]
    fn test_rendering_lists_sections() {
        let mut report = InvestigationReport::new(24, Utc::now(), Some("U1".to_string()));
        let record = NewAuditRecord::builder(ResourceType::Student)
            .target_ids(["A", "B"])
            .build()
            .into_record();
        report.bulk_deletes.push(BulkFinding {
            requested: 2,
            deleted_count: Some(1),
            reconciliation: Reconciliation::of(2, Some(1)),
            record,
        });
        report.explanations = Explanation::ALL.to_vec();

        let text = report.to_string();
        assert!(text.contains("Subject: U1"));
        assert!(text.contains("4. Bulk deletes (1)"));
        assert!(text.contains("[A, B]"));
        assert!(text.contains("1 requested id(s) not deleted"));
        assert!(text.contains("bypassing the API"));
        assert_eq!(report.anomaly_count(), 1);
    }
}
