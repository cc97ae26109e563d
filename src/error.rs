//! Error types for builder validation.
//!
//! This module contains the error raised when a configuration setter rejects
//! its input. Setters validate before mutating anything, so a returned
//! [`ConfigError`] always means the previous configuration is still in place.
//!
//! # Example
//!
//! ```rust
//! use pika::{ConfigError, ConfigStore};
//!
//! let mut store = ConfigStore::new();
//! let result = store.set_method("TRACE");
//! assert!(matches!(result, Err(ConfigError::UnsupportedMethod { .. })));
//! ```

use thiserror::Error;

use crate::config::ValueKind;

/// Errors that can occur while configuring a store or a request.
///
/// Each variant names the offending field or value so the message is
/// actionable at the call site.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A dynamic value had the wrong type for the field it was assigned to.
    #[error("Invalid type for '{field}': expected {expected}, found {found}.")]
    InvalidType {
        /// The configuration field being set.
        field: String,
        /// The type the field requires.
        expected: ValueKind,
        /// The type that was actually supplied.
        found: ValueKind,
    },

    /// The HTTP method is not one of the supported methods.
    #[error("Unsupported HTTP method '{method}'. Expected one of: GET, PUT, POST, PATCH, DELETE, OPTIONS.")]
    UnsupportedMethod {
        /// The method string that was provided.
        method: String,
    },

    /// A timeout was negative, infinite or otherwise not representable.
    #[error("Invalid timeout of {millis} ms. Timeouts must be finite and non-negative.")]
    InvalidTimeout {
        /// The rejected number of milliseconds.
        millis: f64,
    },

    /// A value had the right type but is not acceptable for the field.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The configuration field being set.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A dynamic setter was given a field name that is not recognized.
    #[error("Unknown configuration field '{field}'.")]
    UnknownField {
        /// The unrecognized field name.
        field: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_type_error_message() {
        let error = ConfigError::InvalidType {
            field: "baseURL".to_string(),
            expected: ValueKind::String,
            found: ValueKind::Number,
        };
        let message = error.to_string();
        assert!(message.contains("baseURL"));
        assert!(message.contains("expected string"));
        assert!(message.contains("found number"));
    }

    #[test]
    fn test_unsupported_method_error_message() {
        let error = ConfigError::UnsupportedMethod {
            method: "trace".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("'trace'"));
        assert!(message.contains("OPTIONS"));
    }

    #[test]
    fn test_unknown_field_error_message() {
        let error = ConfigError::UnknownField {
            field: "socketPath".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown configuration field 'socketPath'.");
    }

    #[test]
    fn test_error_implements_std_error() {
        let error = ConfigError::InvalidTimeout { millis: -1.0 };
        let _: &dyn std::error::Error = &error;
    }
}
