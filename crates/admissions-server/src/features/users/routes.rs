//! User delete route
//!
//! `DELETE /api/v1/users/:id` removes the user and its students, behind the
//! delete-audit layer.

use axum::{
    extract::{Path, State},
    routing::delete,
    Router,
};
use sqlx::PgPool;

use super::commands::{DeleteUserCommand, DeleteUserResponse};
use crate::api::response::ApiResponse;
use crate::audit::{audit_delete_layer, DeleteAuditLogger, ResourceType};
use crate::error::ApiResult;
use crate::middleware::identity::SuperAdminOperator;

pub fn users_routes(logger: &DeleteAuditLogger) -> Router<PgPool> {
    Router::new()
        .route("/:id", delete(delete_user))
        .route_layer(audit_delete_layer(logger, ResourceType::User))
}

#[tracing::instrument(skip(pool, operator), fields(operator = %operator.0.user_id))]
async fn delete_user(
    operator: SuperAdminOperator,
    State(pool): State<PgPool>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<DeleteUserResponse>> {
    let response = super::commands::delete::handle(pool, DeleteUserCommand { id }).await?;

    tracing::info!(
        user_id = %response.id,
        deleted_count = response.deleted_count,
        "User deleted via API"
    );

    Ok(ApiResponse::success(response))
}
