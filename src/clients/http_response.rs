//! HTTP response type.
//!
//! This module provides [`HttpResponse`], the value every dispatch resolves
//! to, whether it came from the transport or from a failure handler.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A response resolved by a dispatch.
///
/// Header names are stored lower case; a header may have several values.
///
/// # Example
///
/// ```rust
/// use pika::HttpResponse;
/// use serde_json::json;
///
/// let response = HttpResponse::from_data(200, json!({"id": 7}));
/// assert!(response.is_ok());
///
/// #[derive(serde::Deserialize)]
/// struct User {
///     id: u32,
/// }
/// let user: User = response.json().unwrap();
/// assert_eq!(user.id, 7);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// Response headers keyed by lower-case name.
    pub headers: HashMap<String, Vec<String>>,
    /// The decoded response body.
    pub data: Value,
}

impl HttpResponse {
    /// Creates a response, normalizing header names to lower case.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, Vec<String>>, data: Value) -> Self {
        let mut normalized: HashMap<String, Vec<String>> = HashMap::with_capacity(headers.len());
        for (name, values) in headers {
            normalized
                .entry(name.to_lowercase())
                .or_default()
                .extend(values);
        }
        Self {
            status,
            headers: normalized,
            data,
        }
    }

    /// Creates a response with no headers.
    ///
    /// Convenient for failure handlers that synthesize a fallback result.
    #[must_use]
    pub fn from_data(status: u16, data: Value) -> Self {
        Self::new(status, HashMap::new(), data)
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status >= 200 && self.status <= 299
    }

    /// Returns the first value of a header, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Returns the body as text when it was decoded as a string.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }
}
