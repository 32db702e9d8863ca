//! Audit report routes
//!
//! - `GET /api/v1/audit/recent` - Deletes in the last N hours
//! - `GET /api/v1/audit/delete-attempts/:id` - Attempts against one target
//! - `GET /api/v1/audit/user/:user_id` - Deletes performed by one user
//! - `GET /api/v1/audit/ip/:ip_address` - Deletes issued from one address
//! - `GET /api/v1/audit` - Filtered, paginated listing
//! - `GET /api/v1/audit/statistics` - Aggregated counts

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::queries::{
    self, AuditStatistics, AuditTrailResponse, DeleteAttemptsQuery, IpActivityQuery,
    ListAuditLogsQuery, RecentDeletesQuery, StatisticsQuery, StatisticsSettings,
    UserActivityQuery,
};
use super::AuditReportState;
use crate::api::response::ApiResponse;
use crate::audit::AuditRecord;
use crate::error::ApiResult;
use crate::middleware::identity::{ElevatedOperator, SuperAdminOperator};

pub fn audit_report_routes() -> Router<AuditReportState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/statistics", get(statistics))
        .route("/recent", get(recent_deletes))
        .route("/delete-attempts/:id", get(delete_attempts))
        .route("/user/:user_id", get(user_activity))
        .route("/ip/:ip_address", get(ip_activity))
}

#[derive(Debug, Default, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct WindowParams {
    hours: Option<i64>,
    limit: Option<i64>,
}

#[tracing::instrument(skip(state, operator), fields(operator = %operator.0.user_id))]
async fn recent_deletes(
    operator: ElevatedOperator,
    State(state): State<AuditReportState>,
    Query(query): Query<RecentDeletesQuery>,
) -> ApiResult<ApiResponse<AuditTrailResponse>> {
    let response = queries::recent::handle(
        state.repo.as_ref(),
        query,
        state.settings.recent_window_hours,
    )
    .await?;
    Ok(ApiResponse::success(response))
}

#[tracing::instrument(skip(state, operator, params), fields(operator = %operator.0.user_id))]
async fn delete_attempts(
    operator: ElevatedOperator,
    State(state): State<AuditReportState>,
    Path(target_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<ApiResponse<AuditTrailResponse>> {
    let query = DeleteAttemptsQuery {
        target_id,
        limit: params.limit,
    };
    let response = queries::delete_attempts::handle(state.repo.as_ref(), query).await?;
    Ok(ApiResponse::success(response))
}

#[tracing::instrument(skip(state, operator, params), fields(operator = %operator.0.user_id))]
async fn user_activity(
    operator: ElevatedOperator,
    State(state): State<AuditReportState>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<ApiResponse<AuditTrailResponse>> {
    let query = UserActivityQuery {
        user_id,
        limit: params.limit,
    };
    let response = queries::user_activity::handle(state.repo.as_ref(), query).await?;
    Ok(ApiResponse::success(response))
}

#[tracing::instrument(skip(state, operator, params), fields(operator = %operator.0.user_id))]
async fn ip_activity(
    operator: ElevatedOperator,
    State(state): State<AuditReportState>,
    Path(ip_address): Path<String>,
    Query(params): Query<WindowParams>,
) -> ApiResult<ApiResponse<AuditTrailResponse>> {
    let query = IpActivityQuery {
        ip_address,
        hours: params.hours,
        limit: params.limit,
    };
    let response = queries::ip_activity::handle(
        state.repo.as_ref(),
        query,
        state.settings.recent_window_hours,
    )
    .await?;
    Ok(ApiResponse::success(response))
}

#[tracing::instrument(skip(state, operator), fields(operator = %operator.0.user_id))]
async fn list_audit_logs(
    operator: SuperAdminOperator,
    State(state): State<AuditReportState>,
    Query(query): Query<ListAuditLogsQuery>,
) -> ApiResult<ApiResponse<Vec<AuditRecord>>> {
    let response = queries::list::handle(state.repo.as_ref(), query).await?;
    Ok(ApiResponse::success_with_meta(
        response.items,
        json!({ "pagination": response.pagination }),
    ))
}

#[tracing::instrument(skip(state, operator), fields(operator = %operator.0.user_id))]
async fn statistics(
    operator: SuperAdminOperator,
    State(state): State<AuditReportState>,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<ApiResponse<AuditStatistics>> {
    let settings = StatisticsSettings::from(&state.settings);
    let response = queries::statistics::handle(state.repo.as_ref(), query, settings).await?;
    Ok(ApiResponse::success(response))
}
