//! Forensic investigation of deletions
//!
//! Cross-references the delete-audit trail with the live `users` and
//! `students` collections to explain why records went missing:
//!
//! 1. Direct trail of sensitive deletes and of the queried subject
//! 2. Students whose user no longer exists
//! 3. Successful deletes of kinds that cascade
//! 4. Bulk deletes, with `deletedCount` reconciled against the ids
//!
//! Nothing here writes.

mod analyzer;
mod lookup;
mod report;

pub use analyzer::{
    DeletionAnalyzer, InvestigationParams, DEFAULT_WINDOW_HOURS, SENSITIVE_KINDS,
};
pub use lookup::{
    CollectionLookup, MemoryCollectionLookup, PgCollectionLookup, StudentRecord, UserRecord,
};
pub use report::{
    BulkFinding, CascadeFinding, Explanation, InvestigationReport, OrphanFinding, Reconciliation,
};

use crate::db::DbError;
use crate::features::shared::validation::InputValidationError;

#[derive(Debug, thiserror::Error)]
pub enum InvestigationError {
    #[error("Invalid investigation parameters: {0}")]
    InvalidParams(#[from] InputValidationError),
    #[error("Store unreachable: {0}")]
    Connectivity(DbError),
}
