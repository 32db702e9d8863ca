//! Operator read API over the delete-audit trail
//!
//! All routes require an elevated caller. The full listing and the
//! statistics need a super admin.

pub mod queries;
pub mod routes;

use std::sync::Arc;

use crate::audit::AuditRepository;
use crate::config::AuditConfig;

pub use routes::audit_report_routes;

/// State shared by the report handlers
#[derive(Clone)]
pub struct AuditReportState {
    pub repo: Arc<dyn AuditRepository>,
    pub settings: AuditConfig,
}

impl AuditReportState {
    pub fn new(repo: Arc<dyn AuditRepository>, settings: AuditConfig) -> Self {
        Self { repo, settings }
    }
}
