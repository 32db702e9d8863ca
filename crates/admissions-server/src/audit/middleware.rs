//! Delete-audit middleware
//!
//! Wraps delete routes of one resource kind:
//! - Only `DELETE` requests are audited, everything else passes through
//! - The ATTEMPT record is written before the handler runs
//! - The correlation id moves into a [`CompletionHook`] consumed exactly once
//! - Request bodies over [`MAX_DELETE_BODY_BYTES`] are refused with 413, still audited
//! - The response is buffered to read its outcome, then returned unchanged
//! - The terminal write is spawned so it never delays the response

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{MatchedPath, RawPathParams, Request},
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    RequestPartsExt,
};
use http_body_util::BodyExt;
use serde_json::Value as JsonValue;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, warn};
use uuid::Uuid;

use super::logger::{DeleteAuditLogger, DeleteContext, DeleteOutcome};
use super::models::ResourceType;
use crate::error::AppError;

/// Path parameter holding the target id of a single delete
pub const TARGET_PARAM: &str = "id";

/// Largest delete body buffered for auditing, matching axum's default limit
pub const MAX_DELETE_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Audit layer for the delete routes of one resource kind
///
/// Apply with `route_layer` so that path parameters are already matched.
#[derive(Clone)]
pub struct DeleteAuditLayer {
    logger: DeleteAuditLogger,
    resource_type: ResourceType,
}

impl DeleteAuditLayer {
    pub fn new(logger: DeleteAuditLogger, resource_type: ResourceType) -> Self {
        Self {
            logger,
            resource_type,
        }
    }
}

/// Layer auditing deletes of `resource_type` through `logger`
pub fn audit_delete_layer(
    logger: &DeleteAuditLogger,
    resource_type: ResourceType,
) -> DeleteAuditLayer {
    DeleteAuditLayer::new(logger.clone(), resource_type)
}

impl<S> Layer<S> for DeleteAuditLayer {
    type Service = DeleteAuditMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeleteAuditMiddleware {
            inner,
            logger: self.logger.clone(),
            resource_type: self.resource_type,
        }
    }
}

/// Delete-audit middleware service
#[derive(Clone)]
pub struct DeleteAuditMiddleware<S> {
    inner: S,
    logger: DeleteAuditLogger,
    resource_type: ResourceType,
}

impl<S> Service<Request> for DeleteAuditMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        if request.method() != Method::DELETE {
            return Box::pin(self.inner.call(request));
        }

        // Drive the clone that was made ready, keep a fresh one here
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let logger = self.logger.clone();
        let resource_type = self.resource_type;

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let body_bytes = to_bytes(body, MAX_DELETE_BODY_BYTES).await.inspect_err(|e| {
                warn!(uri = %parts.uri, error = %e, "Rejecting unreadable delete request body");
            });

            let empty = Bytes::new();
            let ctx = delete_context(
                resource_type,
                &mut parts,
                body_bytes.as_ref().unwrap_or(&empty),
            )
            .await;
            let is_bulk = ctx.is_bulk();
            let correlation_id = logger.log_delete_attempt(ctx).await;
            let hook = CompletionHook {
                logger,
                correlation_id,
                is_bulk,
            };

            let response = match body_bytes {
                Ok(bytes) => inner.call(Request::from_parts(parts, Body::from(bytes))).await?,
                Err(_) => AppError::PayloadTooLarge(format!(
                    "Delete request body exceeds {} bytes",
                    MAX_DELETE_BODY_BYTES
                ))
                .into_response(),
            };

            let (parts, body) = response.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(error = %e, "Failed to capture delete response body");
                    Bytes::new()
                },
            };

            hook.complete(parts.status, &bytes);

            Ok(Response::from_parts(parts, Body::from(bytes)))
        })
    }
}

async fn delete_context(
    resource_type: ResourceType,
    parts: &mut Parts,
    body: &Bytes,
) -> DeleteContext {
    let mut ctx = DeleteContext::from_parts(resource_type, parts);

    ctx.target_ids = bulk_target_ids(body);
    if ctx.target_ids.is_empty() {
        ctx.target_id = match parts.extract::<RawPathParams>().await {
            Ok(params) => {
                let mut fallback = None;
                let mut named = None;
                for (key, value) in &params {
                    if key == TARGET_PARAM {
                        named = Some(value.to_string());
                    }
                    fallback = Some(value.to_string());
                }
                named.or(fallback)
            },
            Err(_) => None,
        };
    }

    if let Some(route) = parts.extensions.get::<MatchedPath>() {
        ctx.metadata
            .insert("route".to_string(), JsonValue::String(route.as_str().to_string()));
    }

    ctx
}

/// Ids of a bulk delete body `{"ids": [...]}`; numbers are kept as text
fn bulk_target_ids(body: &Bytes) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    let Ok(json) = serde_json::from_slice::<JsonValue>(body) else {
        return Vec::new();
    };

    json.get("ids")
        .and_then(JsonValue::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(|id| match id {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Terminal half of an audited delete
///
/// Holds the correlation id returned by phase one. `complete` consumes the
/// hook, so the outcome is written at most once per request.
struct CompletionHook {
    logger: DeleteAuditLogger,
    correlation_id: Option<Uuid>,
    is_bulk: bool,
}

impl CompletionHook {
    fn complete(self, status: StatusCode, body: &Bytes) {
        let outcome = infer_outcome(status, body, self.is_bulk);
        let Some(id) = self.correlation_id else {
            debug!(status = %status, "Delete finished without an attempt record");
            return;
        };

        let logger = self.logger;
        tokio::spawn(async move {
            logger.log_delete_result(Some(id), outcome).await;
        });
    }
}

/// Outcome of a delete from its response
///
/// `success` follows the status (`< 400`) unless the JSON body carries an
/// explicit boolean `success`. Messages and counts are read from the
/// envelope shapes used by the API (`data.deletedCount`, `error.message`).
pub fn infer_outcome(status: StatusCode, body: &Bytes, is_bulk: bool) -> DeleteOutcome {
    let json = serde_json::from_slice::<JsonValue>(body).ok();
    let field = |path: &[&str]| lookup(json.as_ref(), path);

    let success = field(&["success"])
        .and_then(JsonValue::as_bool)
        .unwrap_or(status.as_u16() < 400);

    let deleted_count = field(&["data", "deletedCount"])
        .or_else(|| field(&["deletedCount"]))
        .and_then(JsonValue::as_i64);

    let message = field(&["message"])
        .or_else(|| field(&["data", "message"]))
        .and_then(JsonValue::as_str)
        .map(str::to_string);

    let error = if success {
        None
    } else {
        field(&["error", "message"])
            .or_else(|| field(&["error"]))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .or_else(|| status.canonical_reason().map(str::to_string))
    };

    DeleteOutcome {
        success,
        message,
        deleted_count,
        error,
        status_code: Some(status.as_u16()),
        is_bulk,
    }
}

fn lookup<'a>(json: Option<&'a JsonValue>, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = json?;
    for key in path {
        current = current.get(*key)?;
    }
    Some(current)
}
