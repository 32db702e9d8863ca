//! Admissions Server Library
//!
//! Delete-audit and forensic-investigation trail for the admissions
//! platform.
//!
//! # Overview
//!
//! - **Audit**: two-phase delete records (attempt, then outcome) written by a
//!   tower layer around every delete route
//! - **Reports**: operator read API over the trail, with filters, pagination
//!   and statistics under `/api/v1/audit`
//! - **Investigation**: offline analysis that cross-references the trail with
//!   the `users` and `students` tables
//! - **Database**: PostgreSQL through SQLx
//! - **Middleware**: CORS, request tracing and forwarded caller identity
//!
//! ## Framework Stack
//!
//! - **Axum**: web framework
//! - **SQLx**: async Postgres access and migrations
//! - **Tower**: middleware and service abstractions
//!
//! # Example
//!
//! ```no_run
//! use admissions_server::{api, audit, config::Config, db};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&db::DbConfig::from(&config.database)).await?;
//!     let state = api::AppState {
//!         audit: audit::AuditStore::new(Arc::new(audit::PgAuditRepository::new(pool.clone()))),
//!         db: pool,
//!     };
//!     let app = api::create_router(state, &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod investigation;
pub mod middleware;

// Re-export commonly used types
pub use error::{ApiResult, AppError};
