//! Precedence-ordered merging of configuration records.
//!
//! Every field of [`RequestConfig`] belongs to one of three merge policies:
//!
//! | Policy | Fields | Result |
//! |--------|--------|--------|
//! | override-if-present | `url`, `method`, `params`, `data` | override's value, else omitted |
//! | deep-merge | `headers`, `auth`, `proxy` | key-by-key union, override wins |
//! | fallback | everything else | override's value, else base's value |
//!
//! Both functions borrow their inputs immutably and return freshly allocated
//! values, so a base configuration can be merged into any number of requests.

use serde_json::{Map, Value};

use super::RequestConfig;

/// Merges `override_config` on top of `base`.
///
/// # Example
///
/// ```rust
/// use pika::config::{merge_config, RequestConfig};
/// use pika::Method;
/// use serde_json::json;
///
/// let base = RequestConfig {
///     method: Some(Method::Post),
///     base_url: Some("https://api.example.com".to_string()),
///     headers: Some(json!({"a": 1, "b": 2})),
///     ..RequestConfig::default()
/// };
/// let request = RequestConfig {
///     headers: Some(json!({"b": 3, "c": 4})),
///     ..RequestConfig::default()
/// };
///
/// let merged = merge_config(&base, &request);
/// assert_eq!(merged.headers, Some(json!({"a": 1, "b": 3, "c": 4})));
/// assert_eq!(merged.base_url.as_deref(), Some("https://api.example.com"));
/// assert_eq!(merged.method, None);
/// ```
#[must_use]
pub fn merge_config(base: &RequestConfig, override_config: &RequestConfig) -> RequestConfig {
    RequestConfig {
        url: override_config.url.clone(),
        method: override_config.method,
        params: override_config.params.clone(),
        data: override_config.data.clone(),

        headers: merge_deep_field(
            base.headers.as_ref(),
            override_config.headers.as_ref(),
            merge_headers,
        ),
        auth: merge_deep_field(base.auth.as_ref(), override_config.auth.as_ref(), deep_merge),
        proxy: merge_deep_field(base.proxy.as_ref(), override_config.proxy.as_ref(), deep_merge),

        base_url: fallback(&base.base_url, &override_config.base_url),
        timeout: override_config.timeout.or(base.timeout),
        response_type: override_config.response_type.or(base.response_type),
        max_redirects: override_config.max_redirects.or(base.max_redirects),
        max_content_length: override_config
            .max_content_length
            .or(base.max_content_length),
        validate_status: fallback(&base.validate_status, &override_config.validate_status),
    }
}

/// Recursively merges mappings, later entries winning on conflict.
///
/// Nested mappings present on both sides are merged; a mapping present only
/// on the right is deep-copied. When the two sides disagree on type the
/// right-hand value is taken literally.
///
/// # Example
///
/// ```rust
/// use pika::config::deep_merge;
/// use serde_json::json;
///
/// let left = json!({"common": {"accept": "*/*"}, "x": 1});
/// let right = json!({"common": {"x-id": "7"}, "x": {"nested": true}});
/// let left_map = left.as_object().unwrap();
/// let right_map = right.as_object().unwrap();
///
/// let merged = deep_merge(Some(left_map), right_map);
/// assert_eq!(
///     serde_json::Value::Object(merged),
///     json!({"common": {"accept": "*/*", "x-id": "7"}, "x": {"nested": true}})
/// );
/// ```
#[must_use]
pub fn deep_merge(base: Option<&Map<String, Value>>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.cloned().unwrap_or_default();

    for (key, value) in overlay {
        let merged = match (result.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                Value::Object(deep_merge(Some(existing), incoming))
            }
            (_, Value::Object(incoming)) => Value::Object(deep_merge(None, incoming)),
            (_, other) => other.clone(),
        };
        result.insert(key.clone(), merged);
    }

    result
}

/// Merges header mappings like [`deep_merge`], matching names ignoring ASCII case.
///
/// An incoming header replaces every base entry whose name differs from it
/// only in case, at the top level and inside each section such as `common`.
#[must_use]
pub fn merge_headers(
    base: Option<&Map<String, Value>>,
    overlay: &Map<String, Value>,
) -> Map<String, Value> {
    let mut result = base.cloned().unwrap_or_default();

    for (key, value) in overlay {
        let shadowed: Vec<String> = result
            .keys()
            .filter(|existing| existing.eq_ignore_ascii_case(key))
            .cloned()
            .collect();
        let mut previous = None;
        for name in shadowed {
            previous = result.remove(&name).or(previous);
        }

        let merged = match (previous, value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                Value::Object(merge_headers(Some(&existing), incoming))
            }
            (_, Value::Object(incoming)) => Value::Object(merge_headers(None, incoming)),
            (_, other) => other.clone(),
        };
        result.insert(key.clone(), merged);
    }

    result
}

type MappingMerge = fn(Option<&Map<String, Value>>, &Map<String, Value>) -> Map<String, Value>;

fn merge_deep_field(
    base: Option<&Value>,
    overlay: Option<&Value>,
    merge: MappingMerge,
) -> Option<Value> {
    match (base, overlay) {
        (base, Some(Value::Object(incoming))) => {
            Some(Value::Object(merge(base.and_then(Value::as_object), incoming)))
        }
        (_, Some(literal)) => Some(literal.clone()),
        (Some(Value::Object(existing)), None) => Some(Value::Object(merge(None, existing))),
        (Some(literal), None) => Some(literal.clone()),
        (None, None) => None,
    }
}

fn fallback<T: Clone>(base: &Option<T>, overlay: &Option<T>) -> Option<T> {
    overlay.as_ref().or(base.as_ref()).cloned()
}
