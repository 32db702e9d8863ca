pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;

use crate::audit::{AuditStore, DeleteAuditLogger};
use crate::config::Config;
use crate::db;
use crate::features::{self, audit_reports::AuditReportState, FeatureState};
use crate::middleware::{
    cors_layer,
    identity::{client_ip, identity},
    tracing_layer,
};

/// Application state shared across top-level handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub audit: AuditStore,
}

/// Assemble the full application router
///
/// Layers from innermost to outermost: identity, client address, request
/// tracing, CORS. The delete-audit layer sits on the delete routes
/// themselves.
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = FeatureState {
        db: state.db.clone(),
        logger: DeleteAuditLogger::new(state.audit.clone()),
        reports: AuditReportState::new(state.audit.repository(), config.audit),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", features::router(feature_state))
        .layer(from_fn(identity))
        .layer(from_fn_with_state(config.server.trust_proxy, client_ip))
        .layer(tracing_layer())
        .layer(cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Admissions Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check pinging the database
async fn health(State(state): State<AppState>) -> Response {
    match db::health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "unreachable"
                })),
            )
                .into_response()
        },
    }
}
