//! Configuration types for pika.
//!
//! This module provides the configuration record shared by the global store
//! and by each request context, the rules for layering one record over
//! another, and the store itself.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`RequestConfig`]: One layer of configuration, every field optional
//! - [`ConfigStore`]: The shared, chainable default configuration
//! - [`merge_config`]: Combines two layers into the effective configuration
//! - [`Method`]: The supported HTTP methods
//! - [`ValueKind`]: Runtime classification of dynamic values
//!
//! # Example
//!
//! ```rust
//! use pika::ConfigStore;
//! use std::time::Duration;
//!
//! let mut store = ConfigStore::new();
//! store
//!     .set_base_url("https://api.example.com")
//!     .set_timeout(Duration::from_secs(10))
//!     .set_authorization("Bearer token");
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.header("authorization"), Some("Bearer token"));
//! ```

mod kind;
mod merge;
mod method;
mod store;

pub use kind::ValueKind;
pub use merge::{deep_merge, merge_config, merge_headers};
pub use method::Method;
pub use store::ConfigStore;
pub(crate) use store::timeout_from_millis;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Name of the header set by the authorization helpers.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// How the response body is decoded into [`HttpResponse::data`](crate::HttpResponse).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Parse the body as JSON, keeping the raw text when it is not valid JSON.
    #[default]
    Json,
    /// Keep the body as a string.
    Text,
}

impl std::str::FromStr for ResponseType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => Err(ConfigError::InvalidValue {
                field: "responseType".to_string(),
                reason: format!("unsupported response type '{s}', expected 'json' or 'text'"),
            }),
        }
    }
}

/// Decides which response statuses count as success.
///
/// Responses rejected by the validator are reported as failures carrying the
/// response, which makes them eligible for status handlers.
///
/// # Example
///
/// ```rust
/// use pika::config::StatusValidator;
///
/// let lenient = StatusValidator::new(|status| status < 500);
/// assert!(lenient.is_valid(404));
/// assert!(!StatusValidator::default().is_valid(404));
/// ```
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(u16) -> bool + Send + Sync>);

impl StatusValidator {
    /// Wraps a predicate over status codes.
    pub fn new(predicate: impl Fn(u16) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Returns `true` when `status` should be treated as success.
    #[must_use]
    pub fn is_valid(&self, status: u16) -> bool {
        (self.0)(status)
    }
}

impl Default for StatusValidator {
    fn default() -> Self {
        Self::new(|status| (200..300).contains(&status))
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusValidator(..)")
    }
}

/// One layer of request configuration.
///
/// The global store holds one of these as the defaults, and every request
/// context holds another with its overrides. Fields are grouped by the way
/// [`merge_config`] layers them.
///
/// `headers`, `auth` and `proxy` are dynamic values. They are normally
/// mappings; `proxy` may also be `false` to bypass any proxy.
#[derive(Clone, Debug, Default)]
pub struct RequestConfig {
    /// Request URL, absolute or relative to `base_url`.
    pub url: Option<String>,
    /// HTTP method.
    pub method: Option<Method>,
    /// Query parameters.
    pub params: Option<HashMap<String, String>>,
    /// Request body. Strings are sent as-is, anything else as JSON.
    pub data: Option<Value>,

    /// Header mapping. `common` and per-method sub-mappings are flattened at dispatch.
    pub headers: Option<Value>,
    /// Basic auth credentials as `{"username": .., "password": ..}`.
    pub auth: Option<Value>,
    /// Proxy as `{"protocol": .., "host": .., "port": .., "auth": {..}}`, or `false`.
    pub proxy: Option<Value>,

    /// Prefix for relative URLs.
    pub base_url: Option<String>,
    /// Whole-request timeout enforced by the transport.
    pub timeout: Option<Duration>,
    /// Response body decoding.
    pub response_type: Option<ResponseType>,
    /// Maximum number of redirects to follow.
    pub max_redirects: Option<usize>,
    /// Maximum accepted response body size in bytes.
    pub max_content_length: Option<u64>,
    /// Status predicate deciding success.
    pub validate_status: Option<StatusValidator>,
}

impl RequestConfig {
    /// Looks up a top-level header, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(Value::as_object)?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
    }

    /// Sets a top-level header, replacing any entry with the same name.
    pub(crate) fn insert_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        update_object(&mut self.headers, |headers| {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
            headers.insert(key, Value::String(value));
        });
    }

    /// Adds a single query parameter.
    pub(crate) fn insert_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
    }

    /// Sets basic auth credentials.
    pub(crate) fn set_basic_auth(&mut self, username: impl Into<String>, password: impl Into<String>) {
        let (username, password) = (username.into(), password.into());
        update_object(&mut self.auth, |auth| {
            auth.insert("username".to_string(), Value::String(username));
            auth.insert("password".to_string(), Value::String(password));
        });
    }

    /// Sets the proxy host and port, keeping any other proxy settings.
    pub(crate) fn set_proxy_address(&mut self, host: impl Into<String>, port: u16) {
        let host = host.into();
        update_object(&mut self.proxy, |proxy| {
            proxy.insert("host".to_string(), Value::String(host));
            proxy.insert("port".to_string(), Value::from(port));
        });
    }
}

/// Applies `update` to the mapping in `slot`; absent or scalar values start from an empty mapping.
fn update_object(slot: &mut Option<Value>, update: impl FnOnce(&mut Map<String, Value>)) {
    let mut map = match slot.take() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    update(&mut map);
    *slot = Some(Value::Object(map));
}

// Verify RequestConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RequestConfig>();
};
