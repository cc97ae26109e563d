//! The shared default configuration.
//!
//! A [`ConfigStore`] holds the configuration every request starts from. It is
//! a cheap handle: clones share one underlying record, and each setter swaps
//! in a freshly built record instead of editing the current one. Requests
//! capture the record with [`ConfigStore::snapshot`] just before dispatch, so
//! setters running concurrently never change a request that is in flight.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::merge::{deep_merge, merge_headers};
use super::{
    Method, RequestConfig, ResponseType, StatusValidator, ValueKind, AUTHORIZATION_HEADER,
};
use crate::error::ConfigError;

/// Header sent by default on every request.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Shared, chainable default configuration.
///
/// # Thread Safety
///
/// `ConfigStore` is `Clone`, `Send` and `Sync`. All clones observe the same
/// configuration; updates replace the record atomically under a write lock.
///
/// # Example
///
/// ```rust
/// use pika::{ConfigStore, Method};
///
/// let mut store = ConfigStore::new();
/// store
///     .set_base_url("https://api.example.com")
///     .set_header("X-Client", "pika")
///     .set_method("POST")
///     .unwrap();
///
/// let snapshot = store.snapshot();
/// assert_eq!(snapshot.base_url.as_deref(), Some("https://api.example.com"));
/// assert_eq!(snapshot.method, Some(Method::Post));
/// ```
#[derive(Clone, Debug)]
pub struct ConfigStore {
    current: Arc<RwLock<Arc<RequestConfig>>>,
}

// Verify ConfigStore is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConfigStore>();
};

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Creates a store holding the library defaults.
    ///
    /// The defaults are an `Accept` header of [`DEFAULT_ACCEPT`] and JSON
    /// response decoding. Everything else is unset.
    #[must_use]
    pub fn new() -> Self {
        let mut defaults = RequestConfig {
            response_type: Some(ResponseType::Json),
            ..RequestConfig::default()
        };
        defaults.insert_header("Accept", DEFAULT_ACCEPT);
        Self::from_config(defaults)
    }

    /// Creates a store holding exactly `config`.
    #[must_use]
    pub fn from_config(config: RequestConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Returns the current configuration.
    ///
    /// The returned record is immutable; later setter calls do not affect it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RequestConfig> {
        Arc::clone(&self.current.read())
    }

    /// Sets the prefix for relative request URLs.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        let base_url = base_url.into();
        self.update(|config| config.base_url = Some(base_url))
    }

    /// Sets the default request timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.update(|config| config.timeout = Some(timeout))
    }

    /// Sets the default request timeout from a number of milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidType`] for NaN and
    /// [`ConfigError::InvalidTimeout`] for negative or infinite values.
    pub fn set_timeout_millis(&mut self, millis: f64) -> Result<&mut Self, ConfigError> {
        let timeout = timeout_from_millis("timeout", millis)?;
        Ok(self.set_timeout(timeout))
    }

    /// Sets the default HTTP method from a string, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedMethod`] if the method is not one of
    /// GET, PUT, POST, PATCH, DELETE or OPTIONS.
    pub fn set_method(&mut self, method: &str) -> Result<&mut Self, ConfigError> {
        let method: Method = method.parse()?;
        Ok(self.set_method_value(method))
    }

    /// Sets the default HTTP method.
    pub fn set_method_value(&mut self, method: Method) -> &mut Self {
        self.update(|config| config.method = Some(method))
    }

    /// Sets a default header, replacing any header with the same name.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let (key, value) = (key.into(), value.into());
        self.update(|config| config.insert_header(key, value))
    }

    /// Sets the `Authorization` header.
    pub fn set_authorization(&mut self, token: impl Into<String>) -> &mut Self {
        self.set_header(AUTHORIZATION_HEADER, token)
    }

    /// Sets basic auth credentials.
    pub fn set_auth(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        let (username, password) = (username.into(), password.into());
        self.update(|config| config.set_basic_auth(username, password))
    }

    /// Routes requests through the proxy at `host:port`.
    pub fn set_proxy(&mut self, host: impl Into<String>, port: u16) -> &mut Self {
        let host = host.into();
        self.update(|config| config.set_proxy_address(host, port))
    }

    /// Bypasses any proxy, including proxies from the environment.
    pub fn disable_proxy(&mut self) -> &mut Self {
        self.update(|config| config.proxy = Some(Value::Bool(false)))
    }

    /// Sets how response bodies are decoded.
    pub fn set_response_type(&mut self, response_type: ResponseType) -> &mut Self {
        self.update(|config| config.response_type = Some(response_type))
    }

    /// Sets the maximum number of redirects to follow.
    pub fn set_max_redirects(&mut self, max_redirects: usize) -> &mut Self {
        self.update(|config| config.max_redirects = Some(max_redirects))
    }

    /// Sets the maximum accepted response body size in bytes.
    pub fn set_max_content_length(&mut self, max_content_length: u64) -> &mut Self {
        self.update(|config| config.max_content_length = Some(max_content_length))
    }

    /// Sets the predicate deciding which statuses count as success.
    pub fn set_validate_status(
        &mut self,
        predicate: impl Fn(u16) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        let validator = StatusValidator::new(predicate);
        self.update(|config| config.validate_status = Some(validator))
    }

    /// Sets one field from a dynamic value, using the field's wire name.
    ///
    /// Recognized fields are `baseURL`, `timeout` (milliseconds), `method`,
    /// `headers`, `auth`, `proxy`, `responseType`, `maxRedirects` and
    /// `maxContentLength`. Mappings given for `headers`, `auth` and `proxy`
    /// are merged into the current ones.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the rejected value. The store is
    /// left unchanged on error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pika::{ConfigError, ConfigStore};
    /// use serde_json::json;
    ///
    /// let mut store = ConfigStore::new();
    /// store.set("baseURL", json!("https://api.example.com")).unwrap();
    ///
    /// let result = store.set("baseURL", json!(42));
    /// assert!(matches!(result, Err(ConfigError::InvalidType { .. })));
    /// assert_eq!(
    ///     store.snapshot().base_url.as_deref(),
    ///     Some("https://api.example.com")
    /// );
    /// ```
    pub fn set(&mut self, field: &str, value: Value) -> Result<&mut Self, ConfigError> {
        self.try_update(|config| apply_field(config, field, &value))
    }

    /// Applies every entry of a JSON object with [`set`](Self::set) semantics.
    ///
    /// Either all entries are applied or, on the first invalid entry, none are.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidType`] if `document` is not an object, or
    /// the error of the first rejected entry.
    pub fn apply_json(&mut self, document: &Value) -> Result<&mut Self, ConfigError> {
        let Value::Object(entries) = document else {
            return Err(ConfigError::InvalidType {
                field: "config".to_string(),
                expected: ValueKind::Object,
                found: ValueKind::of(Some(document)),
            });
        };

        self.try_update(|config| {
            entries
                .iter()
                .try_for_each(|(field, value)| apply_field(config, field, value))
        })
    }

    fn update(&mut self, apply: impl FnOnce(&mut RequestConfig)) -> &mut Self {
        {
            let mut current = self.current.write();
            let mut next = RequestConfig::clone(&current);
            apply(&mut next);
            *current = Arc::new(next);
        }
        self
    }

    fn try_update(
        &mut self,
        apply: impl FnOnce(&mut RequestConfig) -> Result<(), ConfigError>,
    ) -> Result<&mut Self, ConfigError> {
        {
            let mut current = self.current.write();
            let mut next = RequestConfig::clone(&current);
            apply(&mut next)?;
            *current = Arc::new(next);
        }
        Ok(self)
    }
}

/// Converts a millisecond count into a timeout, rejecting NaN, negative and infinite values.
pub(crate) fn timeout_from_millis(field: &str, millis: f64) -> Result<Duration, ConfigError> {
    let kind = ValueKind::of_f64(millis);
    if kind != ValueKind::Number {
        return Err(ConfigError::InvalidType {
            field: field.to_string(),
            expected: ValueKind::Number,
            found: kind,
        });
    }
    if millis < 0.0 || !millis.is_finite() {
        return Err(ConfigError::InvalidTimeout { millis });
    }
    Duration::try_from_secs_f64(millis / 1000.0).map_err(|_| ConfigError::InvalidTimeout { millis })
}

fn apply_field(config: &mut RequestConfig, field: &str, value: &Value) -> Result<(), ConfigError> {
    match field {
        "baseURL" => config.base_url = Some(expect_str(field, value)?.to_string()),
        "timeout" => config.timeout = Some(timeout_from_millis(field, expect_f64(field, value)?)?),
        "method" => config.method = Some(expect_str(field, value)?.parse()?),
        "headers" => merge_mapping(&mut config.headers, field, value, merge_headers)?,
        "auth" => merge_mapping(&mut config.auth, field, value, deep_merge)?,
        "proxy" => match value {
            Value::Bool(false) => config.proxy = Some(Value::Bool(false)),
            _ => merge_mapping(&mut config.proxy, field, value, deep_merge)?,
        },
        "responseType" => {
            config.response_type = Some(expect_str(field, value)?.parse()?);
        }
        "maxRedirects" => {
            let count = expect_u64(field, value)?;
            let count = usize::try_from(count).map_err(|_| ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("{count} is too large"),
            })?;
            config.max_redirects = Some(count);
        }
        "maxContentLength" => config.max_content_length = Some(expect_u64(field, value)?),
        _ => {
            return Err(ConfigError::UnknownField {
                field: field.to_string(),
            })
        }
    }
    Ok(())
}

fn merge_mapping(
    slot: &mut Option<Value>,
    field: &str,
    value: &Value,
    merge: fn(Option<&Map<String, Value>>, &Map<String, Value>) -> Map<String, Value>,
) -> Result<(), ConfigError> {
    let Value::Object(incoming) = value else {
        return Err(type_error(field, ValueKind::Object, value));
    };
    let merged = merge(slot.as_ref().and_then(Value::as_object), incoming);
    *slot = Some(Value::Object(merged));
    Ok(())
}

fn expect_str<'a>(field: &str, value: &'a Value) -> Result<&'a str, ConfigError> {
    value
        .as_str()
        .ok_or_else(|| type_error(field, ValueKind::String, value))
}

fn expect_f64(field: &str, value: &Value) -> Result<f64, ConfigError> {
    value
        .as_f64()
        .ok_or_else(|| type_error(field, ValueKind::Number, value))
}

fn expect_u64(field: &str, value: &Value) -> Result<u64, ConfigError> {
    match value {
        Value::Number(number) => number.as_u64().ok_or_else(|| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a non-negative integer, found {number}"),
        }),
        _ => Err(type_error(field, ValueKind::Number, value)),
    }
}

fn type_error(field: &str, expected: ValueKind, value: &Value) -> ConfigError {
    ConfigError::InvalidType {
        field: field.to_string(),
        expected,
        found: ValueKind::of(Some(value)),
    }
}
