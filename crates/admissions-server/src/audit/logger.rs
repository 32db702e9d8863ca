//! Two-phase delete logger
//!
//! Phase one writes an ATTEMPT record and hands back its correlation id.
//! Phase two applies the terminal outcome to that record. Neither phase
//! reports failure to the caller.

use axum::http::{request::Parts, HeaderMap};
use axum::extract::{ConnectInfo, OriginalUri};
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{
    ActorSnapshot, AuditAction, AuditRecord, AuditResult, Metadata, NewAuditRecord,
    RequestDetails, ResourceType, ResultUpdate, CAPTURED_HEADERS,
};
use super::store::AuditStore;
use crate::middleware::identity::{AuthenticatedActor, ClientIp};

/// Value stored when no source yields a client address
pub const UNKNOWN_IP: &str = "unknown";

/// Transport facts about the request, captured before the handler runs
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    /// Address resolved by a proxy-aware layer ([`ClientIp`])
    pub resolved_ip: Option<IpAddr>,
    /// Socket peer address
    pub remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.to_string(),
            // Nested routers see a stripped uri
            url: parts
                .extensions
                .get::<OriginalUri>()
                .map(|OriginalUri(uri)| uri.to_string())
                .unwrap_or_else(|| parts.uri.to_string()),
            headers: parts.headers.clone(),
            resolved_ip: parts.extensions.get::<ClientIp>().map(|ip| ip.0),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    pub fn client_ip(&self) -> String {
        resolve_client_ip(self.resolved_ip, &self.headers, self.remote_addr)
    }

    fn user_agent(&self) -> Option<String> {
        header_str(&self.headers, "user-agent").map(str::to_string)
    }

    fn into_details(self) -> RequestDetails {
        RequestDetails {
            ip: self.client_ip(),
            user_agent: self.user_agent(),
            headers: capture_headers(&self.headers),
            method: self.method,
            url: self.url,
        }
    }
}

/// Everything phase one needs to describe a delete
#[derive(Debug, Clone)]
pub struct DeleteContext {
    pub resource_type: ResourceType,
    pub target_id: Option<String>,
    pub target_ids: Vec<String>,
    pub actor: Option<ActorSnapshot>,
    pub request: RequestContext,
    pub metadata: Metadata,
}

impl DeleteContext {
    pub fn new(resource_type: ResourceType, request: RequestContext) -> Self {
        Self {
            resource_type,
            target_id: None,
            target_ids: Vec::new(),
            actor: None,
            request,
            metadata: Metadata::new(),
        }
    }

    /// Build from request parts; the actor comes from [`AuthenticatedActor`]
    pub fn from_parts(resource_type: ResourceType, parts: &Parts) -> Self {
        let mut ctx = Self::new(resource_type, RequestContext::from_parts(parts));
        ctx.actor = parts
            .extensions
            .get::<AuthenticatedActor>()
            .map(AuthenticatedActor::snapshot);
        ctx
    }

    pub fn is_bulk(&self) -> bool {
        !self.target_ids.is_empty()
    }
}

/// Terminal facts about a delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub deleted_count: Option<i64>,
    pub error: Option<String>,
    pub status_code: Option<u16>,
    pub is_bulk: bool,
}

/// Writes the two phases of a delete audit
#[derive(Debug, Clone)]
pub struct DeleteAuditLogger {
    store: AuditStore,
}

impl DeleteAuditLogger {
    pub fn new(store: AuditStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &AuditStore {
        &self.store
    }

    /// Phase one: persist the ATTEMPT record
    ///
    /// Returns the correlation id, or `None` when the store rejected the
    /// write. A non-empty `target_ids` makes the record a bulk attempt.
    pub async fn log_delete_attempt(&self, ctx: DeleteContext) -> Option<Uuid> {
        let resource_type = ctx.resource_type;
        let bulk = ctx.is_bulk();

        let mut builder = NewAuditRecord::builder(resource_type)
            .target_ids(ctx.target_ids)
            .performed_by(ctx.actor.unwrap_or_else(ActorSnapshot::anonymous))
            .request_details(ctx.request.into_details());
        if let Some(target) = ctx.target_id {
            builder = builder.target_id(target);
        }
        for (key, value) in ctx.metadata {
            builder = builder.metadata(key, value);
        }
        let record = builder.build();

        debug!(
            audit_id = %record.id,
            action = %record.action,
            %resource_type,
            ip = %record.request_details.ip,
            "Logging delete attempt"
        );

        let id = self.store.create(record).await;
        if id.is_none() {
            warn!(%resource_type, bulk, "Delete attempt was not recorded");
        }
        id
    }

    /// Phase two: apply the terminal outcome
    ///
    /// A `None` correlation id means phase one failed; nothing is written.
    /// A second call for the same id overwrites the first outcome.
    pub async fn log_delete_result(
        &self,
        correlation_id: Option<Uuid>,
        outcome: DeleteOutcome,
    ) -> Option<AuditRecord> {
        let id = correlation_id?;
        let action = AuditAction::terminal(outcome.is_bulk, outcome.success);

        let update = ResultUpdate {
            action,
            result: AuditResult {
                success: outcome.success,
                message: outcome.message,
                deleted_count: outcome.deleted_count,
                error: outcome.error,
                status_code: outcome.status_code,
            },
            updated_at: Utc::now(),
        };

        let record = self.store.update(id, update).await;
        if let Some(ref record) = record {
            info!(
                audit_id = %id,
                %action,
                resource_type = %record.resource_type,
                status = ?record.result.status_code,
                "Delete audited"
            );
        }
        record
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address by precedence
///
/// 1. address resolved upstream, 2. first `X-Forwarded-For` entry,
/// 3. `X-Real-IP`, 4. socket peer, 5. `"unknown"`.
pub fn resolve_client_ip(
    resolved: Option<IpAddr>,
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
) -> String {
    if let Some(ip) = resolved {
        return ip.to_string();
    }

    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    if let Some(ip) = header_str(headers, "x-real-ip") {
        return ip.to_string();
    }

    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// The fixed header selection stored on each record
pub fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    CAPTURED_HEADERS
        .iter()
        .filter_map(|name| header_str(headers, name).map(|v| (name.to_string(), v.to_string())))
        .collect()
}

/// Convenience for callers that record a free-form reason
pub fn metadata_entry(key: &str, value: impl Into<JsonValue>) -> (String, JsonValue) {
    (key.to_string(), value.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::models::{AuditFilter, AuditState, Page};
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_ip_precedence() {
        let remote: SocketAddr = "192.0.2.1:5555".parse().unwrap();
        let resolved: IpAddr = "198.51.100.7".parse().unwrap();
        let all = headers(&[
            ("x-forwarded-for", "203.0.113.5, 10.0.0.1"),
            ("x-real-ip", "203.0.113.99"),
        ]);

        assert_eq!(resolve_client_ip(Some(resolved), &all, Some(remote)), "198.51.100.7");
        assert_eq!(resolve_client_ip(None, &all, Some(remote)), "203.0.113.5");

        let real_only = headers(&[("x-real-ip", "203.0.113.99")]);
        assert_eq!(resolve_client_ip(None, &real_only, Some(remote)), "203.0.113.99");

        assert_eq!(resolve_client_ip(None, &HeaderMap::new(), Some(remote)), "192.0.2.1");
        assert_eq!(resolve_client_ip(None, &HeaderMap::new(), None), UNKNOWN_IP);
    }

    #[test]
    fn test_capture_headers_keeps_fixed_selection() {
        let map = headers(&[
            ("origin", "https://portal.school.test"),
            ("authorization", "Bearer secret"),
            ("x-request-id", "req-1"),
        ]);
        let captured = capture_headers(&map);

        assert_eq!(captured.len(), 2);
        assert_eq!(captured["origin"], "https://portal.school.test");
        assert!(!captured.contains_key("authorization"));
    }

    fn ctx(kind: ResourceType) -> DeleteContext {
        DeleteContext::new(
            kind,
            RequestContext {
                method: "DELETE".to_string(),
                url: "/api/v1/students/S1".to_string(),
                headers: headers(&[("user-agent", "curl/8.0")]),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_attempt_then_result() {
        let (store, repo) = AuditStore::in_memory();
        let logger = DeleteAuditLogger::new(store);

        let mut attempt = ctx(ResourceType::Student);
        attempt.target_id = Some("S1".to_string());
        let id = logger.log_delete_attempt(attempt).await;
        assert!(id.is_some());

        let stored = repo.snapshot().await;
        assert_eq!(stored[0].action, AuditAction::DeleteAttempt);
        assert_eq!(stored[0].state(), AuditState::Attempted);
        assert_eq!(stored[0].request_details.ip, UNKNOWN_IP);
        assert_eq!(stored[0].request_details.user_agent.as_deref(), Some("curl/8.0"));
        assert!(stored[0].performed_by.user_id.is_none());

        let record = logger
            .log_delete_result(
                id,
                DeleteOutcome {
                    success: true,
                    deleted_count: Some(1),
                    status_code: Some(200),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(record.action, AuditAction::DeleteSuccess);
        assert_eq!(record.state(), AuditState::Succeeded);
    }

    #[tokio::test]
    async fn test_bulk_failure_tag() {
        let (store, _) = AuditStore::in_memory();
        let logger = DeleteAuditLogger::new(store);

        let mut attempt = ctx(ResourceType::Student);
        attempt.target_ids = vec!["A".to_string(), "B".to_string()];
        attempt.metadata.extend([metadata_entry("reason", "cleanup")]);
        let id = logger.log_delete_attempt(attempt).await;

        let record = logger
            .log_delete_result(
                id,
                DeleteOutcome {
                    success: false,
                    status_code: Some(500),
                    is_bulk: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(record.action, AuditAction::BulkDeleteFailed);
        assert_eq!(record.target_ids, vec!["A", "B"]);
        assert_eq!(record.metadata["reason"], "cleanup");
    }

    #[tokio::test]
    async fn test_none_correlation_id_is_noop() {
        let (store, repo) = AuditStore::in_memory();
        let logger = DeleteAuditLogger::new(store);

        let result = logger
            .log_delete_result(None, DeleteOutcome::default())
            .await;
        assert!(result.is_none());
        assert!(repo.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_is_swallowed() {
        let (store, repo) = AuditStore::in_memory();
        repo.set_unavailable(true);
        let logger = DeleteAuditLogger::new(store);

        assert!(logger.log_delete_attempt(ctx(ResourceType::User)).await.is_none());

        repo.set_unavailable(false);
        let found = logger
            .store()
            .find(&AuditFilter::default(), Page::first(10))
            .await;
        assert!(found.is_empty());
    }
}
