//! Admissions Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared building blocks for the admissions workspace:
//!
//! - **Logging**: `tracing` subscriber setup used by every binary
//! - **Error Handling**: input errors shared by the HTTP layer and the tools
//! - **Time**: parsing of operator-supplied date filters

pub mod error;
pub mod logging;
pub mod time;

pub use error::{AdmissionsError, Result};
