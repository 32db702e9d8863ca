//! Shared utilities and types for feature modules
//!
//! - **pagination**: page/limit parameters for list queries
//! - **validation**: caller input checks run before store access

pub mod pagination;
pub mod validation;

pub use pagination::PaginationParams;
pub use validation::{validate_hours, validate_identifier, validate_ip, InputValidationError};
