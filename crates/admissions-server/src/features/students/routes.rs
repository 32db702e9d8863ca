//! Student delete routes
//!
//! - `DELETE /api/v1/students/:id` - Delete one student
//! - `DELETE /api/v1/students` - Bulk delete, body `{"ids": [...]}`
//!
//! Both run behind the delete-audit layer.

use axum::{
    extract::{Path, State},
    routing::delete,
    Json, Router,
};
use sqlx::PgPool;

use super::commands::{
    BulkDeleteStudentsCommand, BulkDeleteStudentsResponse, DeleteStudentCommand,
    DeleteStudentResponse,
};
use crate::api::response::ApiResponse;
use crate::audit::{audit_delete_layer, DeleteAuditLogger, ResourceType};
use crate::error::ApiResult;
use crate::middleware::identity::ElevatedOperator;

pub fn students_routes(logger: &DeleteAuditLogger) -> Router<PgPool> {
    Router::new()
        .route("/", delete(bulk_delete_students))
        .route("/:id", delete(delete_student))
        .route_layer(audit_delete_layer(logger, ResourceType::Student))
}

#[tracing::instrument(skip(pool, operator), fields(operator = %operator.0.user_id))]
async fn delete_student(
    operator: ElevatedOperator,
    State(pool): State<PgPool>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<DeleteStudentResponse>> {
    let response = super::commands::delete::handle(pool, DeleteStudentCommand { id }).await?;

    tracing::info!(student_id = %response.id, "Student deleted via API");

    Ok(ApiResponse::success(response))
}

#[tracing::instrument(skip(pool, operator, command), fields(operator = %operator.0.user_id))]
async fn bulk_delete_students(
    operator: ElevatedOperator,
    State(pool): State<PgPool>,
    Json(command): Json<BulkDeleteStudentsCommand>,
) -> ApiResult<ApiResponse<BulkDeleteStudentsResponse>> {
    let response = super::commands::bulk_delete::handle(pool, command).await?;

    tracing::info!(deleted_count = response.deleted_count, "Students bulk deleted via API");

    Ok(ApiResponse::success(response))
}
