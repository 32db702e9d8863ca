//! HTTP tests against the fully assembled application
//!
//! The audit trail is in memory. The database pool never connects, so
//! these exercise everything in front of the delete handlers: identity,
//! authorization, the delete-audit layer and the reporting API.

use admissions_server::{
    audit::{AuditAction, AuditRecord, ResourceType},
    config::Config,
};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request, StatusCode},
};
use serde_json::json;
use std::net::SocketAddr;
use tower::ServiceExt;

mod helpers;

use helpers::*;

// ============================================================================
// Delete Auditing
// ============================================================================

#[tokio::test]
async fn test_unauthenticated_delete_is_audited_as_failure() {
    let (app, repo) = memory_app();

    let response = app
        .oneshot(anonymous(Method::DELETE, "/api/v1/students/S1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let records = settled(&repo).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.action, AuditAction::DeleteFailed);
    assert_eq!(record.resource_type, ResourceType::Student);
    assert_eq!(record.target_id.as_deref(), Some("S1"));
    assert!(record.performed_by.user_id.is_none());
    assert!(!record.result.success);
    assert_eq!(record.result.status_code, Some(401));
    assert_eq!(record.result.error.as_deref(), Some("Authentication required"));
}

#[tokio::test]
async fn test_underprivileged_bulk_delete_is_audited() {
    let (app, repo) = memory_app();

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/v1/students")
        .header("content-type", "application/json")
        .header("x-user-id", "staff-7")
        .header("x-user-role", "staff")
        .body(Body::from(json!({"ids": ["S1", "S2", "S3"]}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let records = settled(&repo).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.action, AuditAction::BulkDeleteFailed);
    assert_eq!(record.target_ids, vec!["S1", "S2", "S3"]);
    assert!(record.target_id.is_none());
    assert_eq!(record.performed_by.user_id.as_deref(), Some("staff-7"));
    assert_eq!(record.performed_by.role.as_deref(), Some("staff"));
    assert_eq!(record.result.status_code, Some(403));
}

#[tokio::test]
async fn test_user_delete_requires_super_admin() {
    let (app, repo) = memory_app();

    let response = app
        .oneshot(as_user(Method::DELETE, "/api/v1/users/U1", "admin-1", "admin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let records = settled(&repo).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource_type, ResourceType::User);
    assert_eq!(records[0].action, AuditAction::DeleteFailed);
    assert_eq!(records[0].metadata["route"], json!("/api/v1/users/:id"));
}

#[tokio::test]
async fn test_forwarded_client_ip_is_captured() {
    let (app, repo) = memory_app();

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/v1/students/S9")
        .header("x-forwarded-for", "198.51.100.23, 10.0.0.2")
        .header("user-agent", "registrar-console/1.4")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let records = settled(&repo).await;
    assert_eq!(records.len(), 1);
    let details = &records[0].request_details;
    assert_eq!(details.ip, "198.51.100.23");
    assert_eq!(details.method, "DELETE");
    assert_eq!(details.url, "/api/v1/students/S9");
    assert_eq!(details.user_agent.as_deref(), Some("registrar-console/1.4"));
}

fn delete_from_peer(uri: &str) -> Request<Body> {
    let peer: SocketAddr = "10.1.2.3:51000".parse().unwrap();
    let mut request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("x-forwarded-for", "198.51.100.23")
        .body(Body::empty())
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

#[tokio::test]
async fn test_peer_address_wins_unless_proxy_is_trusted() {
    let (app, repo) = memory_app();
    app.oneshot(delete_from_peer("/api/v1/students/S1"))
        .await
        .unwrap();
    let records = settled(&repo).await;
    assert_eq!(records[0].request_details.ip, "10.1.2.3");

    let mut config = Config::default();
    config.server.trust_proxy = true;
    let (app, repo) = memory_app_with_config(&config);
    app.oneshot(delete_from_peer("/api/v1/students/S1"))
        .await
        .unwrap();
    let records = settled(&repo).await;
    assert_eq!(records[0].request_details.ip, "198.51.100.23");
}

#[tokio::test]
async fn test_reads_are_not_audited() {
    let (app, repo) = memory_app();

    let response = app
        .oneshot(as_user(Method::GET, "/api/v1/audit/recent", "admin-1", "admin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(repo.snapshot().await.is_empty());
}

// ============================================================================
// Reporting API
// ============================================================================

#[tokio::test]
async fn test_reporting_sees_recorded_deletes() {
    let (app, repo) = memory_app();

    app.clone()
        .oneshot(as_user(Method::DELETE, "/api/v1/students/S1", "staff-1", "staff"))
        .await
        .unwrap();
    let recorded: Vec<AuditRecord> = settled(&repo).await;
    assert_eq!(recorded.len(), 1);

    let response = app
        .clone()
        .oneshot(as_user(
            Method::GET,
            "/api/v1/audit/delete-attempts/S1",
            "admin-1",
            "admin",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["records"][0]["action"], "DELETE_FAILED");
    assert_eq!(body["data"]["records"][0]["performedBy"]["userId"], "staff-1");

    let response = app
        .oneshot(as_user(Method::GET, "/api/v1/audit/user/staff-1", "admin-1", "admin"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn test_reporting_privileges() {
    let (app, _repo) = memory_app();

    let cases = [
        ("/api/v1/audit/recent", None, StatusCode::UNAUTHORIZED),
        ("/api/v1/audit/recent", Some("staff"), StatusCode::FORBIDDEN),
        ("/api/v1/audit/recent", Some("admin"), StatusCode::OK),
        ("/api/v1/audit", Some("admin"), StatusCode::FORBIDDEN),
        ("/api/v1/audit", Some("super_admin"), StatusCode::OK),
        ("/api/v1/audit/statistics", Some("admin"), StatusCode::FORBIDDEN),
        ("/api/v1/audit/statistics", Some("super-admin"), StatusCode::OK),
    ];

    for (uri, role, expected) in cases {
        let request = match role {
            Some(role) => as_user(Method::GET, uri, "operator-1", role),
            None => anonymous(Method::GET, uri),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected, "{} as {:?}", uri, role);
    }
}

#[tokio::test]
async fn test_statistics_over_recorded_deletes() {
    let (app, repo) = memory_app();

    for id in ["S1", "S2"] {
        app.clone()
            .oneshot(anonymous(Method::DELETE, &format!("/api/v1/students/{}", id)))
            .await
            .unwrap();
    }
    let records = settled(&repo).await;
    assert_eq!(records.len(), 2);

    let response = app
        .oneshot(as_user(
            Method::GET,
            "/api/v1/audit/statistics",
            "root-1",
            "super_admin",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["successful"], 0);
    assert_eq!(body["data"]["failed"], 2);
    assert_eq!(body["data"]["successRate"], 0.0);
}

// ============================================================================
// Service Endpoints
// ============================================================================

#[tokio::test]
async fn test_root_describes_service() {
    let (app, _repo) = memory_app();

    let response = app.oneshot(anonymous(Method::GET, "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["name"], "Admissions Server");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let (app, _repo) = memory_app();

    let response = app.oneshot(anonymous(Method::GET, "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["database"], "unreachable");
}
