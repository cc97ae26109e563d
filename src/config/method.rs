//! HTTP method definitions.
//!
//! This module provides the [`Method`] enum, the fixed set of methods a
//! request can be dispatched with.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// HTTP methods supported by the request builder.
///
/// Parsing is case-insensitive; the canonical rendering is lower case.
///
/// # Example
///
/// ```rust
/// use pika::Method;
///
/// let method: Method = "PATCH".parse().unwrap();
/// assert_eq!(method, Method::Patch);
/// assert_eq!(method.to_string(), "patch");
/// assert!("TRACE".parse::<Method>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET.
    #[default]
    Get,
    /// HTTP PUT.
    Put,
    /// HTTP POST.
    Post,
    /// HTTP PATCH.
    Patch,
    /// HTTP DELETE.
    Delete,
    /// HTTP OPTIONS.
    Options,
}

impl Method {
    /// All supported methods.
    pub const ALL: [Self; 6] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Patch,
        Self::Delete,
        Self::Options,
    ];

    /// Returns the lower-case method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Options => "options",
        }
    }

    /// Converts to the transport's method type.
    #[must_use]
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Put => reqwest::Method::PUT,
            Self::Post => reqwest::Method::POST,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnsupportedMethod {
                method: s.to_string(),
            })
    }
}
