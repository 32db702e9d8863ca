//! Feature modules of the admissions API
//!
//! Each feature is a vertical slice with its own commands or queries and
//! routes.
//!
//! # Features
//!
//! - **audit_reports**: Operator read API over the delete-audit trail
//! - **students**: Single and bulk student deletes
//! - **users**: User deletes, cascading to students
//!
//! Commands and queries are marked as `mediator` requests and handled by a
//! plain `handle` function per slice.

pub mod audit_reports;
pub mod shared;
pub mod students;
pub mod users;

use axum::Router;

use crate::audit::DeleteAuditLogger;
use audit_reports::AuditReportState;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for the business collections
    pub db: sqlx::PgPool,
    /// Write side of the delete-audit trail
    pub logger: DeleteAuditLogger,
    /// Read side of the delete-audit trail
    pub reports: AuditReportState,
}

/// Creates the API router with all feature routes mounted
///
/// - `/audit` - Delete-audit reports
/// - `/users` - User deletes
/// - `/students` - Student deletes
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest(
            "/audit",
            audit_reports::audit_report_routes().with_state(state.reports.clone()),
        )
        .nest(
            "/users",
            users::users_routes(&state.logger).with_state(state.db.clone()),
        )
        .nest(
            "/students",
            students::students_routes(&state.logger).with_state(state.db.clone()),
        )
}
