//! Error types for request dispatch.
//!
//! This module contains the failure shape reported by transports, the usage
//! error for misuse of a request instance, and the unified error returned by
//! dispatch methods.
//!
//! # Error Handling
//!
//! - [`TransportError`]: The transport failed, either with a response
//!   ([`TransportError::Response`]) or before one arrived ([`TransportError::Code`])
//! - [`UsageError`]: A request instance was used out of order
//! - [`PikaError`]: Unified error type for dispatch methods
//!
//! Only [`TransportError`] values are offered to status and error-code
//! handlers. A failure no handler claims is returned unchanged inside
//! [`PikaError::Transport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pika::{ErrorCode, PikaError, TransportError};
//!
//! match request.get("/users").await {
//!     Ok(response) => println!("Users: {}", response.data),
//!     Err(PikaError::Transport(TransportError::Response(response))) => {
//!         println!("Server answered {}", response.status);
//!     }
//!     Err(PikaError::Transport(TransportError::Code { code, .. })) => {
//!         println!("Transport failed with {code}");
//!     }
//!     Err(other) => println!("{other}"),
//! }
//! ```

use std::fmt;

use thiserror::Error;

use crate::clients::http_response::HttpResponse;
use crate::error::ConfigError;

/// Transport-level failure codes, reported when no response was received.
///
/// Codes render as the conventional upper-case identifiers, and any other
/// string round-trips through [`ErrorCode::Other`].
///
/// # Example
///
/// ```rust
/// use pika::ErrorCode;
///
/// assert_eq!(ErrorCode::Timeout.as_str(), "ECONNABORTED");
/// assert_eq!(ErrorCode::from("ECONNREFUSED"), ErrorCode::ConnectionRefused);
/// assert_eq!(ErrorCode::from("EPIPE"), ErrorCode::Other("EPIPE".to_string()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The connection could not be established.
    ConnectionRefused,
    /// The request exceeded its timeout.
    Timeout,
    /// Any other network failure.
    Network,
    /// The response could not be read or was rejected before decoding.
    BadResponse,
    /// An option such as a header, proxy or URL could not be applied.
    BadOption,
    /// A code not covered by the named variants.
    Other(String),
}

impl ErrorCode {
    /// Returns the string form of this code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::Timeout => "ECONNABORTED",
            Self::Network => "ERR_NETWORK",
            Self::BadResponse => "ERR_BAD_RESPONSE",
            Self::BadOption => "ERR_BAD_OPTION_VALUE",
            Self::Other(code) => code,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "ECONNREFUSED" => Self::ConnectionRefused,
            "ECONNABORTED" => Self::Timeout,
            "ERR_NETWORK" => Self::Network,
            "ERR_BAD_RESPONSE" => Self::BadResponse,
            "ERR_BAD_OPTION_VALUE" => Self::BadOption,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the transport.
///
/// This is the shape handler dispatch depends on: a failure either carries
/// the response that was judged unsuccessful, or a transport error code.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransportError {
    /// The server answered with a status rejected by the status validator.
    #[error("Request failed with status code {}", .0.status)]
    Response(HttpResponse),

    /// No usable response was received.
    #[error("{message} ({code})")]
    Code {
        /// The failure code.
        code: ErrorCode,
        /// Human-readable detail from the transport.
        message: String,
    },
}

impl TransportError {
    /// Creates a code failure.
    pub fn code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Code {
            code,
            message: message.into(),
        }
    }

    /// Returns the response status, if the failure carries a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response(response) => Some(response.status),
            Self::Code { .. } => None,
        }
    }

    /// Returns the error code, if the failure happened before a response.
    #[must_use]
    pub const fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Response(_) => None,
            Self::Code { code, .. } => Some(code),
        }
    }

    /// Returns the rejected response, if any.
    #[must_use]
    pub const fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Code { .. } => None,
        }
    }

    /// Classifies a `reqwest` failure.
    pub(crate) fn from_reqwest(error: &reqwest::Error) -> Self {
        let code = if error.is_timeout() {
            ErrorCode::Timeout
        } else if error.is_connect() {
            ErrorCode::ConnectionRefused
        } else if error.is_builder() {
            ErrorCode::BadOption
        } else if error.is_body() || error.is_decode() {
            ErrorCode::BadResponse
        } else {
            ErrorCode::Network
        };
        Self::code(code, error.to_string())
    }
}

/// Error returned when a request instance is used out of order.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    /// `replay` was called before anything was dispatched on this request.
    #[error("Cannot replay a request that has never been dispatched.")]
    NoPriorDispatch,
}

/// Unified error type for dispatch methods.
#[derive(Debug, Error)]
pub enum PikaError {
    /// A builder value was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request instance was misused.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The transport failed and no handler claimed the failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body could not be decoded into the requested type.
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_error_code_strings_round_trip() {
        for code in [
            ErrorCode::ConnectionRefused,
            ErrorCode::Timeout,
            ErrorCode::Network,
            ErrorCode::BadResponse,
            ErrorCode::BadOption,
            ErrorCode::Other("EHOSTUNREACH".to_string()),
        ] {
            assert_eq!(ErrorCode::from(code.as_str()), code);
        }
    }

    #[test]
    fn test_response_failure_message_and_accessors() {
        let error = TransportError::Response(HttpResponse::new(
            404,
            HashMap::new(),
            json!({"error": "Not Found"}),
        ));
        assert_eq!(error.to_string(), "Request failed with status code 404");
        assert_eq!(error.status(), Some(404));
        assert!(error.error_code().is_none());
        assert_eq!(error.response().unwrap().data, json!({"error": "Not Found"}));
    }

    #[test]
    fn test_code_failure_message_and_accessors() {
        let error = TransportError::code(ErrorCode::Timeout, "timeout of 100ms exceeded");
        assert_eq!(error.to_string(), "timeout of 100ms exceeded (ECONNABORTED)");
        assert_eq!(error.error_code(), Some(&ErrorCode::Timeout));
        assert!(error.status().is_none());
        assert!(error.response().is_none());
    }

    #[test]
    fn test_usage_error_message() {
        assert_eq!(
            UsageError::NoPriorDispatch.to_string(),
            "Cannot replay a request that has never been dispatched."
        );
    }

    #[test]
    fn test_pika_error_is_transparent() {
        let error: PikaError = TransportError::code(ErrorCode::Network, "reset").into();
        assert_eq!(error.to_string(), "reset (ERR_NETWORK)");

        let error: PikaError = UsageError::NoPriorDispatch.into();
        assert!(matches!(error, PikaError::Usage(UsageError::NoPriorDispatch)));
    }

    #[test]
    fn test_error_types_implement_std_error() {
        let transport: &dyn std::error::Error =
            &TransportError::code(ErrorCode::ConnectionRefused, "refused");
        let _ = transport;

        let usage: &dyn std::error::Error = &UsageError::NoPriorDispatch;
        let _ = usage;
    }
}
