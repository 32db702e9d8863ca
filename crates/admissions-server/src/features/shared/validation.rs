//! Shared validation utilities
//!
//! Caller input is checked here before any store access, so a malformed id
//! or window is answered with a client error and never reaches the database.
//!
//! # Examples
//!
//! ```rust,ignore
//! use admissions_server::features::shared::validation::{validate_identifier, validate_ip};
//!
//! validate_identifier("STU-2026-0042", "id")?;
//! validate_ip("203.0.113.5")?;
//! ```

use std::net::IpAddr;
use thiserror::Error;

use crate::audit::UNKNOWN_IP;

/// Longest identifier accepted in a path segment or filter
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Longest look-back window in hours (one year)
pub const MAX_WINDOW_HOURS: i64 = 24 * 366;

/// Errors that can occur while validating caller input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputValidationError {
    #[error("{field} is required and cannot be empty")]
    Required { field: &'static str },

    #[error("{field} must be at most {max_length} characters")]
    TooLong { field: &'static str, max_length: usize },

    #[error("{field} may only contain letters, digits, '-', '_', '.', ':' and '@'")]
    InvalidFormat { field: &'static str },

    #[error("'{value}' is not an IP address")]
    InvalidIp { value: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("Unknown {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },
}

/// Validate an opaque record or user identifier
///
/// # Rules
/// - Must not be empty (after trimming whitespace)
/// - Must not exceed [`MAX_IDENTIFIER_LENGTH`] characters
/// - Only ASCII letters, digits and `-_.:@`
pub fn validate_identifier(value: &str, field: &'static str) -> Result<(), InputValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InputValidationError::Required { field });
    }

    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(InputValidationError::TooLong {
            field,
            max_length: MAX_IDENTIFIER_LENGTH,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@'))
    {
        return Err(InputValidationError::InvalidFormat { field });
    }

    Ok(())
}

/// Validate an IP filter
///
/// The literal `unknown` is accepted because records whose client address
/// could not be resolved store exactly that value.
pub fn validate_ip(value: &str) -> Result<(), InputValidationError> {
    let value = value.trim();
    if value == UNKNOWN_IP || value.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    Err(InputValidationError::InvalidIp {
        value: value.to_string(),
    })
}

/// Validate an integer parameter against an inclusive range
pub fn validate_range(
    value: i64,
    field: &'static str,
    min: i64,
    max: i64,
) -> Result<i64, InputValidationError> {
    if value < min || value > max {
        return Err(InputValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(value)
}

/// Validate a "last N hours" window
pub fn validate_hours(hours: i64) -> Result<i64, InputValidationError> {
    validate_range(hours, "hours", 1, MAX_WINDOW_HOURS)
}

/// Parse a closed-enum filter value such as `resourceType` or `action`
pub fn parse_enum<T>(value: &str, field: &'static str) -> Result<T, InputValidationError>
where
    T: std::str::FromStr,
{
    value
        .parse::<T>()
        .map_err(|_| InputValidationError::UnknownValue {
            field,
            value: value.to_string(),
        })
}

impl From<InputValidationError> for crate::error::AppError {
    fn from(err: InputValidationError) -> Self {
        crate::error::AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ResourceType;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("S1", "id").is_ok());
        assert!(validate_identifier("STU-2026_0042", "id").is_ok());
        assert!(validate_identifier("6650f1c2e4b0a1b2c3d4e5f6", "id").is_ok());
        assert!(validate_identifier("ops@school.test", "userId").is_ok());
    }

    #[test]
    fn test_validate_identifier_empty() {
        assert_eq!(
            validate_identifier("  ", "id"),
            Err(InputValidationError::Required { field: "id" })
        );
    }

    #[test]
    fn test_validate_identifier_too_long() {
        let long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(matches!(
            validate_identifier(&long, "id"),
            Err(InputValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_identifier_invalid_chars() {
        for bad in ["a b", "id;drop", "x/y", "{$ne:1}"] {
            assert_eq!(
                validate_identifier(bad, "id"),
                Err(InputValidationError::InvalidFormat { field: "id" }),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_validate_ip() {
        assert!(validate_ip("203.0.113.5").is_ok());
        assert!(validate_ip("2001:db8::1").is_ok());
        assert!(validate_ip("unknown").is_ok());
        assert!(validate_ip("999.1.1.1").is_err());
        assert!(validate_ip("localhost").is_err());
    }

    #[test]
    fn test_validate_hours() {
        assert_eq!(validate_hours(24), Ok(24));
        assert!(validate_hours(0).is_err());
        assert!(validate_hours(MAX_WINDOW_HOURS + 1).is_err());
    }

    #[test]
    fn test_parse_enum() {
        let kind: ResourceType = parse_enum("Student", "resourceType").unwrap();
        assert_eq!(kind, ResourceType::Student);
        assert!(parse_enum::<ResourceType>("Spaceship", "resourceType").is_err());
    }
}
