//! Delete audit trail
//!
//! Every delete request is recorded twice on one record: an ATTEMPT written
//! before the handler runs, and a terminal SUCCESS or FAILED outcome written
//! after the response is known. The two writes are joined by the record's
//! correlation id.
//!
//! # Architecture
//!
//! - [`DeleteAuditLayer`] intercepts `DELETE` requests at the HTTP boundary
//! - [`DeleteAuditLogger`] builds records and applies the terminal update
//! - [`AuditStore`] never fails; it logs store errors and returns sentinels
//! - [`AuditRepository`] is the fallible seam with Postgres and in-memory backends
//!
//! A record may stay in ATTEMPT forever when the process dies between the
//! two writes. That state is kept and is queryable.
//!
//! # Usage
//!
//! ```no_run
//! use axum::{routing::delete, Router};
//! use admissions_server::audit::{
//!     audit_delete_layer, AuditStore, DeleteAuditLogger, PgAuditRepository, ResourceType,
//! };
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! # async fn handler() {}
//! # async fn example(pool: PgPool) {
//! let store = AuditStore::new(Arc::new(PgAuditRepository::new(pool)));
//! let logger = DeleteAuditLogger::new(store);
//!
//! let app: Router = Router::new()
//!     .route("/courses/:id", delete(handler))
//!     .route_layer(audit_delete_layer(&logger, ResourceType::Course));
//! # }
//! ```

mod logger;
mod middleware;
mod models;
mod postgres;
mod store;


pub use logger::{
    capture_headers, metadata_entry, resolve_client_ip, DeleteAuditLogger, DeleteContext,
    DeleteOutcome, RequestContext, UNKNOWN_IP,
};
pub use middleware::{
    audit_delete_layer, infer_outcome, DeleteAuditLayer, DeleteAuditMiddleware,
    MAX_DELETE_BODY_BYTES, TARGET_PARAM,
};
pub use models::{
    ActorSnapshot, AuditAction, AuditFilter, AuditGroup, AuditRecord, AuditResult, AuditState,
    GroupKey, Metadata, NewAuditRecord, NewAuditRecordBuilder, Page, RequestDetails, ResourceType,
    ResultUpdate, CAPTURED_HEADERS, DEFAULT_AUDIT_QUERY_LIMIT, MAX_AUDIT_QUERY_LIMIT,
};
pub use postgres::PgAuditRepository;
pub use store::{AuditRepository, AuditStore, MemoryAuditRepository};
