//! The transport seam.
//!
//! A [`Transport`] performs the actual network exchange for an
//! [`EffectiveConfig`]. Everything pika knows about HTTP beyond configuration
//! lives behind this trait; [`ReqwestTransport`] is the default implementation.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::clients::errors::{ErrorCode, TransportError};
use crate::clients::http_response::HttpResponse;
use crate::config::{Method, RequestConfig, ResponseType};

/// Header sub-mappings that are flattened instead of sent.
const HEADER_SECTIONS: [&str; 8] = [
    "common", "get", "put", "post", "patch", "delete", "options", "head",
];

/// The configuration a transport receives: the merged record plus the
/// resolved method and full URL.
#[derive(Clone, Debug)]
pub struct EffectiveConfig {
    /// The method to send.
    pub method: Method,
    /// The full request URL.
    pub url: String,
    /// The merged configuration.
    pub config: RequestConfig,
}

impl EffectiveConfig {
    /// Resolves `config` for sending with `method`.
    ///
    /// Relative URLs are joined onto `base_url`; absolute URLs are kept.
    #[must_use]
    pub fn new(method: Method, mut config: RequestConfig) -> Self {
        config.method = Some(method);
        let url = combine_urls(
            config.base_url.as_deref(),
            config.url.as_deref().unwrap_or_default(),
        );
        Self {
            method,
            url,
            config,
        }
    }

    /// Returns the headers to send.
    ///
    /// `common` entries come first, then entries of the sub-mapping named
    /// after the method, then top-level entries. Later entries replace
    /// earlier ones with the same name regardless of case. Non-scalar and
    /// null values are skipped.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        let Some(Value::Object(headers)) = &self.config.headers else {
            return Vec::new();
        };

        let mut flattened: Vec<(String, String)> = Vec::new();
        let sections = [
            headers.get("common").and_then(Value::as_object),
            headers.get(self.method.as_str()).and_then(Value::as_object),
        ];
        for section in sections.into_iter().flatten() {
            push_scalars(&mut flattened, section.iter());
        }
        push_scalars(
            &mut flattened,
            headers
                .iter()
                .filter(|(key, value)| !(value.is_object() && HEADER_SECTIONS.contains(&key.as_str()))),
        );
        flattened
    }

    /// Returns a flattened header value, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers()
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Returns the basic auth credentials, if both are present.
    #[must_use]
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        credentials(self.config.auth.as_ref()?.as_object()?)
    }
}

fn push_scalars<'a>(
    target: &mut Vec<(String, String)>,
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
) {
    for (key, value) in entries {
        let rendered = match value {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        target.retain(|(existing, _)| !existing.eq_ignore_ascii_case(key));
        target.push((key.clone(), rendered));
    }
}

fn credentials(map: &Map<String, Value>) -> Option<(&str, &str)> {
    let username = map.get("username")?.as_str()?;
    let password = map.get("password")?.as_str()?;
    Some((username, password))
}

/// Joins a base URL and a request URL.
fn combine_urls(base_url: Option<&str>, url: &str) -> String {
    match base_url {
        Some(base) if !is_absolute_url(url) => {
            if url.is_empty() {
                base.to_string()
            } else {
                format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    url.trim_start_matches('/')
                )
            }
        }
        _ => url.to_string(),
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    }) || url.starts_with("//")
}

/// Sends requests on behalf of pika.
///
/// Implementations report unsuccessful outcomes as [`TransportError`]s so
/// failure handlers can inspect them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request described by `request`.
    async fn send(&self, request: &EffectiveConfig) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] implementation backed by `reqwest`.
///
/// A shared client serves every request that uses default connection
/// settings. Requests that configure a proxy or a redirect limit get a
/// dedicated client, since `reqwest` fixes those per client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn client_for(&self, config: &RequestConfig) -> Result<Cow<'_, reqwest::Client>, TransportError> {
        let proxy = explicit_proxy(config);
        if proxy.is_none() && config.max_redirects.is_none() {
            return Ok(Cow::Borrowed(&self.client));
        }

        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if let Some(max_redirects) = config.max_redirects {
            builder = builder.redirect(if max_redirects == 0 {
                reqwest::redirect::Policy::none()
            } else {
                reqwest::redirect::Policy::limited(max_redirects)
            });
        }
        match proxy {
            Some(Value::Bool(false)) => builder = builder.no_proxy(),
            Some(Value::Object(proxy)) => builder = builder.proxy(build_proxy(proxy)?),
            _ => {}
        }

        builder
            .build()
            .map(Cow::Owned)
            .map_err(|e| TransportError::from_reqwest(&e))
    }

    fn parse_response_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            let key = name.as_str().to_lowercase();
            let value = value.to_str().unwrap_or_default().to_string();
            result.entry(key).or_default().push(value);
        }
        result
    }

    fn decode_body(bytes: &[u8], response_type: ResponseType) -> Value {
        let text = String::from_utf8_lossy(bytes);
        match response_type {
            ResponseType::Text => Value::String(text.into_owned()),
            ResponseType::Json if text.trim().is_empty() => Value::Null,
            ResponseType::Json => {
                serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
            }
        }
    }
}

/// Returns the proxy setting that needs a dedicated client.
///
/// A mapping without a `host` is the empty default and leaves the shared
/// client in charge.
fn explicit_proxy(config: &RequestConfig) -> Option<&Value> {
    config.proxy.as_ref().filter(|proxy| match proxy {
        Value::Bool(false) => true,
        Value::Object(proxy) => proxy.contains_key("host"),
        _ => false,
    })
}

fn build_proxy(proxy: &Map<String, Value>) -> Result<reqwest::Proxy, TransportError> {
    let host = proxy
        .get("host")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::code(ErrorCode::BadOption, "proxy host must be a string"))?;
    let protocol = proxy
        .get("protocol")
        .and_then(Value::as_str)
        .unwrap_or("http")
        .trim_end_matches(':');
    let address = match proxy.get("port").and_then(Value::as_u64) {
        Some(port) => format!("{protocol}://{host}:{port}"),
        None => format!("{protocol}://{host}"),
    };

    let mut built =
        reqwest::Proxy::all(address.as_str()).map_err(|e| TransportError::from_reqwest(&e))?;
    if let Some((username, password)) = proxy
        .get("auth")
        .and_then(Value::as_object)
        .and_then(credentials)
    {
        built = built.basic_auth(username, password);
    }
    Ok(built)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &EffectiveConfig) -> Result<HttpResponse, TransportError> {
        let config = &request.config;
        let client = self.client_for(config)?;

        let headers = request.headers();
        let has_content_type = headers
            .iter()
            .any(|(key, _)| key.eq_ignore_ascii_case("content-type"));

        let mut builder = client.request(request.method.to_reqwest(), request.url.as_str());
        for (key, value) in &headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(params) = &config.params {
            builder = builder.query(params);
        }
        if let Some(timeout) = config.timeout.filter(|timeout| *timeout > Duration::ZERO) {
            builder = builder.timeout(timeout);
        }
        if let Some((username, password)) = request.basic_auth() {
            builder = builder.basic_auth(username, Some(password));
        }
        match &config.data {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => builder = builder.body(text.clone()),
            Some(other) => {
                if !has_content_type {
                    builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
                }
                builder = builder.body(other.to_string());
            }
        }

        tracing::debug!(method = %request.method, url = %request.url, "Sending HTTP request");
        let mut res = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = res.status().as_u16();
        let res_headers = Self::parse_response_headers(res.headers());
        let too_large = |length: u64| {
            config
                .max_content_length
                .filter(|max| length > *max)
                .map(|max| {
                    TransportError::code(
                        ErrorCode::BadResponse,
                        format!("maxContentLength size of {max} exceeded"),
                    )
                })
        };
        if let Some(error) = res.content_length().and_then(&too_large) {
            return Err(error);
        }

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?
        {
            bytes.extend_from_slice(&chunk);
            if let Some(error) = u64::try_from(bytes.len()).ok().and_then(&too_large) {
                return Err(error);
            }
        }

        let data = Self::decode_body(&bytes, config.response_type.unwrap_or_default());
        let response = HttpResponse::new(status, res_headers, data);
        tracing::debug!(status, url = %request.url, "Received HTTP response");

        let accepted = config
            .validate_status
            .as_ref()
            .map_or_else(|| response.is_ok(), |validator| validator.is_valid(status));
        if accepted {
            Ok(response)
        } else {
            Err(TransportError::Response(response))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn effective(method: Method, config: RequestConfig) -> EffectiveConfig {
        EffectiveConfig::new(method, config)
    }

    #[test]
    fn test_relative_url_joined_onto_base() {
        let config = RequestConfig {
            base_url: Some("https://api.example.com/v1/".to_string()),
            url: Some("/users".to_string()),
            ..RequestConfig::default()
        };
        assert_eq!(
            effective(Method::Get, config).url,
            "https://api.example.com/v1/users"
        );
    }

    #[test]
    fn test_absolute_url_ignores_base() {
        let config = RequestConfig {
            base_url: Some("https://api.example.com".to_string()),
            url: Some("http://other.example/ping".to_string()),
            ..RequestConfig::default()
        };
        assert_eq!(effective(Method::Get, config).url, "http://other.example/ping");
    }

    #[test]
    fn test_missing_url_uses_base() {
        let config = RequestConfig {
            base_url: Some("https://api.example.com".to_string()),
            ..RequestConfig::default()
        };
        assert_eq!(effective(Method::Get, config).url, "https://api.example.com");
        assert_eq!(effective(Method::Get, RequestConfig::default()).url, "");
    }

    #[test]
    fn test_effective_config_records_method() {
        let resolved = effective(Method::Patch, RequestConfig::default());
        assert_eq!(resolved.method, Method::Patch);
        assert_eq!(resolved.config.method, Some(Method::Patch));
    }

    #[test]
    fn test_headers_flatten_common_and_method_sections() {
        let config = RequestConfig {
            headers: Some(json!({
                "common": {"Accept": "*/*", "X-Layer": "common"},
                "post": {"X-Layer": "post"},
                "get": {"X-Get-Only": "1"},
                "x-layer": "top",
                "X-Count": 3,
                "X-Flag": true,
                "X-Null": null
            })),
            ..RequestConfig::default()
        };
        let resolved = effective(Method::Post, config);
        let headers = resolved.headers();

        assert_eq!(resolved.header("accept").as_deref(), Some("*/*"));
        assert_eq!(resolved.header("X-LAYER").as_deref(), Some("top"));
        assert_eq!(resolved.header("x-count").as_deref(), Some("3"));
        assert_eq!(resolved.header("x-flag").as_deref(), Some("true"));
        assert!(resolved.header("x-null").is_none());
        assert!(resolved.header("x-get-only").is_none());
        assert_eq!(
            headers
                .iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case("x-layer"))
                .count(),
            1
        );
    }

    #[test]
    fn test_scalar_headers_value_sends_nothing() {
        let config = RequestConfig {
            headers: Some(json!("not a mapping")),
            ..RequestConfig::default()
        };
        assert!(effective(Method::Get, config).headers().is_empty());
    }

    #[test]
    fn test_basic_auth_requires_both_fields() {
        let config = RequestConfig {
            auth: Some(json!({"username": "user", "password": "pass"})),
            ..RequestConfig::default()
        };
        assert_eq!(effective(Method::Get, config).basic_auth(), Some(("user", "pass")));

        let config = RequestConfig {
            auth: Some(json!({"username": "user"})),
            ..RequestConfig::default()
        };
        assert!(effective(Method::Get, config).basic_auth().is_none());
    }

    #[test]
    fn test_decode_body_by_response_type() {
        assert_eq!(
            ReqwestTransport::decode_body(br#"{"a":1}"#, ResponseType::Json),
            json!({"a": 1})
        );
        assert_eq!(
            ReqwestTransport::decode_body(b"not json", ResponseType::Json),
            json!("not json")
        );
        assert_eq!(ReqwestTransport::decode_body(b"", ResponseType::Json), Value::Null);
        assert_eq!(
            ReqwestTransport::decode_body(br#"{"a":1}"#, ResponseType::Text),
            json!(r#"{"a":1}"#)
        );
    }

    #[test]
    fn test_proxy_requires_host() {
        let proxy = json!({"port": 8080});
        let result = build_proxy(proxy.as_object().unwrap());
        assert!(matches!(
            result,
            Err(TransportError::Code {
                code: ErrorCode::BadOption,
                ..
            })
        ));
    }

    #[test]
    fn test_proxy_with_auth_builds() {
        let proxy = json!({
            "protocol": "http:",
            "host": "proxy.local",
            "port": 3128,
            "auth": {"username": "u", "password": "p"}
        });
        assert!(build_proxy(proxy.as_object().unwrap()).is_ok());
    }

    #[test]
    fn test_hostless_proxy_mapping_uses_shared_client() {
        let transport = ReqwestTransport::new();
        for proxy in [json!({}), json!({"port": 3128})] {
            let config = RequestConfig {
                proxy: Some(proxy),
                ..RequestConfig::default()
            };
            assert!(matches!(transport.client_for(&config), Ok(Cow::Borrowed(_))));
        }

        let config = RequestConfig {
            proxy: Some(json!({"host": "proxy.local", "port": 3128})),
            ..RequestConfig::default()
        };
        assert!(matches!(transport.client_for(&config), Ok(Cow::Owned(_))));
    }

    #[test]
    fn test_default_settings_reuse_shared_client() {
        let transport = ReqwestTransport::new();
        let shared = transport.client_for(&RequestConfig::default()).unwrap();
        assert!(matches!(shared, Cow::Borrowed(_)));

        let config = RequestConfig {
            max_redirects: Some(0),
            proxy: Some(json!(false)),
            ..RequestConfig::default()
        };
        let dedicated = transport.client_for(&config).unwrap();
        assert!(matches!(dedicated, Cow::Owned(_)));
    }
}
