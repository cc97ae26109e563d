//! Request instances and their dispatch state machine.
//!
//! A [`Request`] accumulates per-call overrides in a [`RequestContext`] and
//! dispatches them merged over the client's defaults. The context is created
//! by the first chained call and cleared again once a dispatch resolves or
//! fails, so every chain of calls on an instance starts from scratch.
//!
//! ```text
//! Empty ──builder call──> Building ──dispatch──> Dispatched ──┬──> Resolved
//!   ^                                                         └──> Failed
//!   └──────────────── next builder call starts over ──────────────────┘
//! ```

use std::mem;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::clients::client::Pika;
use crate::clients::errors::{ErrorCode, PikaError, UsageError};
use crate::clients::handlers::{Handler, HandlerRegistrar, HandlerRegistry};
use crate::clients::http_response::HttpResponse;
use crate::clients::transport::EffectiveConfig;
use crate::config::{
    merge_config, timeout_from_millis, Method, RequestConfig, ResponseType, StatusValidator,
    AUTHORIZATION_HEADER,
};
use crate::error::ConfigError;

/// Per-request overrides: configuration and failure handlers.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    config: RequestConfig,
    handlers: HandlerRegistry,
}

impl RequestContext {
    /// Returns the request-scoped configuration.
    #[must_use]
    pub const fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Returns the request-scoped handlers.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }
}

/// Where a request instance is in its dispatch cycle.
#[derive(Clone, Debug, Default)]
pub enum RequestState {
    /// No context yet.
    #[default]
    Empty,
    /// Accumulating overrides.
    Building(RequestContext),
    /// Handed to the transport and awaiting the outcome.
    Dispatched,
    /// The last dispatch produced a response, possibly through a handler.
    Resolved,
    /// The last dispatch failed and no handler claimed the failure.
    Failed,
}

/// How a dispatch was requested, so it can be replayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchKind {
    /// Sent with the configured method.
    Send,
    /// Sent through one of the verb methods such as [`Request::get`].
    Verb(Method),
}

#[derive(Clone, Debug)]
struct Dispatch {
    kind: DispatchKind,
    context: RequestContext,
}

/// A request instance created by [`Pika::request`].
///
/// Builder calls take `&mut self` and return it for chaining. Dispatch
/// methods take the accumulated context, so a second chain of calls on the
/// same instance does not see the first chain's overrides.
///
/// # Example
///
/// ```rust,ignore
/// use pika::{HandlerRegistrar, HttpResponse, Pika};
/// use serde_json::json;
///
/// let client = Pika::new();
/// let mut request = client.request();
///
/// let response = request
///     .header("X-Request-Id", "42")
///     .body(json!({"name": "pika"}))
///     .on_not_found(|_, _| HttpResponse::from_data(404, json!(null)))
///     .post("https://api.example.com/users")
///     .await?;
/// ```
#[derive(Debug)]
pub struct Request {
    client: Pika,
    state: RequestState,
    last_dispatch: Option<Dispatch>,
}

impl Request {
    pub(crate) const fn new(client: Pika) -> Self {
        Self {
            client,
            state: RequestState::Empty,
            last_dispatch: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &RequestState {
        &self.state
    }

    /// Returns the context being built, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&RequestContext> {
        match &self.state {
            RequestState::Building(context) => Some(context),
            _ => None,
        }
    }

    /// Returns how the last dispatch was requested.
    #[must_use]
    pub fn last_dispatch(&self) -> Option<DispatchKind> {
        self.last_dispatch.as_ref().map(|dispatch| dispatch.kind)
    }

    /// Sets the URL, absolute or relative to the base URL.
    pub fn url(&mut self, url: impl Into<String>) -> &mut Self {
        let url = url.into();
        self.update_context(|context| context.config.url = Some(url))
    }

    /// Sets the method from a string, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedMethod`] for methods outside the supported set.
    pub fn method(&mut self, method: &str) -> Result<&mut Self, ConfigError> {
        let method: Method = method.parse()?;
        Ok(self.method_value(method))
    }

    /// Sets the method.
    pub fn method_value(&mut self, method: Method) -> &mut Self {
        self.update_context(|context| context.config.method = Some(method))
    }

    /// Sets the request body. Strings are sent as-is, other values as JSON.
    pub fn body(&mut self, data: impl Into<Value>) -> &mut Self {
        let data = data.into();
        self.update_context(|context| context.config.data = Some(data))
    }

    /// Sets a header for this request.
    pub fn header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let (key, value) = (key.into(), value.into());
        self.update_context(|context| context.config.insert_header(key, value))
    }

    /// Sets the `Authorization` header for this request.
    pub fn authorization(&mut self, token: impl Into<String>) -> &mut Self {
        self.header(AUTHORIZATION_HEADER, token)
    }

    /// Adds a query parameter.
    pub fn param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let (key, value) = (key.into(), value.into());
        self.update_context(|context| context.config.insert_param(key, value))
    }

    /// Overrides the base URL for this request.
    pub fn base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        let base_url = base_url.into();
        self.update_context(|context| context.config.base_url = Some(base_url))
    }

    /// Sets the timeout for this request.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.update_context(|context| context.config.timeout = Some(timeout))
    }

    /// Sets the timeout for this request from a number of milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidType`] for NaN and
    /// [`ConfigError::InvalidTimeout`] for negative or infinite values.
    pub fn timeout_millis(&mut self, millis: f64) -> Result<&mut Self, ConfigError> {
        let timeout = timeout_from_millis("timeout", millis)?;
        Ok(self.timeout(timeout))
    }

    /// Sets basic auth credentials for this request.
    pub fn auth(&mut self, username: impl Into<String>, password: impl Into<String>) -> &mut Self {
        let (username, password) = (username.into(), password.into());
        self.update_context(|context| context.config.set_basic_auth(username, password))
    }

    /// Routes this request through the proxy at `host:port`.
    pub fn proxy(&mut self, host: impl Into<String>, port: u16) -> &mut Self {
        let host = host.into();
        self.update_context(|context| context.config.set_proxy_address(host, port))
    }

    /// Bypasses any proxy for this request.
    pub fn no_proxy(&mut self) -> &mut Self {
        self.update_context(|context| context.config.proxy = Some(Value::Bool(false)))
    }

    /// Sets how the response body is decoded.
    pub fn response_type(&mut self, response_type: ResponseType) -> &mut Self {
        self.update_context(|context| context.config.response_type = Some(response_type))
    }

    /// Sets the maximum number of redirects to follow.
    pub fn max_redirects(&mut self, max_redirects: usize) -> &mut Self {
        self.update_context(|context| context.config.max_redirects = Some(max_redirects))
    }

    /// Sets the maximum accepted response body size in bytes.
    pub fn max_content_length(&mut self, max_content_length: u64) -> &mut Self {
        self.update_context(|context| context.config.max_content_length = Some(max_content_length))
    }

    /// Sets the predicate deciding which statuses count as success.
    pub fn validate_status(
        &mut self,
        predicate: impl Fn(u16) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        let validator = StatusValidator::new(predicate);
        self.update_context(|context| context.config.validate_status = Some(validator))
    }

    /// Dispatches with the configured method.
    ///
    /// The method is this request's method, else the client's default
    /// method, else GET.
    ///
    /// # Errors
    ///
    /// Returns [`PikaError::Transport`] with the original failure when the
    /// transport fails and no handler matches.
    pub async fn send(&mut self) -> Result<HttpResponse, PikaError> {
        self.dispatch(DispatchKind::Send).await
    }

    /// Dispatches and deserializes the response body into `T`.
    ///
    /// The dispatch is recorded like [`send`](Self::send); use
    /// [`replay_json`](Self::replay_json) to repeat it with decoding.
    ///
    /// # Errors
    ///
    /// Returns the dispatch error, or [`PikaError::Decode`] if the body does
    /// not match `T`.
    pub async fn fetch_json<T: DeserializeOwned>(&mut self) -> Result<T, PikaError> {
        let response = self.send().await?;
        Ok(response.json()?)
    }

    /// Sends a GET request to `url`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get(&mut self, url: impl Into<String>) -> Result<HttpResponse, PikaError> {
        self.dispatch_verb(Method::Get, url).await
    }

    /// Sends a POST request to `url` with the configured body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post(&mut self, url: impl Into<String>) -> Result<HttpResponse, PikaError> {
        self.dispatch_verb(Method::Post, url).await
    }

    /// Sends a PUT request to `url` with the configured body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put(&mut self, url: impl Into<String>) -> Result<HttpResponse, PikaError> {
        self.dispatch_verb(Method::Put, url).await
    }

    /// Sends a PATCH request to `url` with the configured body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn patch(&mut self, url: impl Into<String>) -> Result<HttpResponse, PikaError> {
        self.dispatch_verb(Method::Patch, url).await
    }

    /// Sends a DELETE request to `url`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&mut self, url: impl Into<String>) -> Result<HttpResponse, PikaError> {
        self.dispatch_verb(Method::Delete, url).await
    }

    /// Sends an OPTIONS request to `url`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn options(&mut self, url: impl Into<String>) -> Result<HttpResponse, PikaError> {
        self.dispatch_verb(Method::Options, url).await
    }

    /// Repeats the last dispatch with the overrides it used.
    ///
    /// The overrides are merged over the client's current defaults, so
    /// default changes made since the original dispatch apply. Only the
    /// transport call is repeated: the raw response is returned even when
    /// the last dispatch came from [`fetch_json`](Self::fetch_json).
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoPriorDispatch`] if nothing was dispatched on
    /// this instance yet, otherwise the same errors as [`send`](Self::send).
    pub async fn replay(&mut self) -> Result<HttpResponse, PikaError> {
        let Dispatch { kind, context } = self
            .last_dispatch
            .clone()
            .ok_or(UsageError::NoPriorDispatch)?;
        tracing::debug!(?kind, "Replaying last dispatch");
        self.run(kind, context).await
    }

    /// Repeats the last dispatch and deserializes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`replay`](Self::replay), plus [`PikaError::Decode`] if the body
    /// does not match `T`.
    pub async fn replay_json<T: DeserializeOwned>(&mut self) -> Result<T, PikaError> {
        let response = self.replay().await?;
        Ok(response.json()?)
    }

    async fn dispatch_verb(
        &mut self,
        method: Method,
        url: impl Into<String>,
    ) -> Result<HttpResponse, PikaError> {
        self.url(url);
        self.dispatch(DispatchKind::Verb(method)).await
    }

    async fn dispatch(&mut self, kind: DispatchKind) -> Result<HttpResponse, PikaError> {
        let context = match mem::take(&mut self.state) {
            RequestState::Building(context) => context,
            _ => RequestContext::default(),
        };
        self.run(kind, context).await
    }

    async fn run(
        &mut self,
        kind: DispatchKind,
        context: RequestContext,
    ) -> Result<HttpResponse, PikaError> {
        self.state = RequestState::Dispatched;

        let defaults = self.client.store().snapshot();
        let merged = merge_config(&defaults, &context.config);
        let method = match kind {
            DispatchKind::Verb(method) => method,
            DispatchKind::Send => merged.method.or(defaults.method).unwrap_or_default(),
        };
        let effective = EffectiveConfig::new(method, merged);

        let outcome = self.client.transport().send(&effective).await;
        let handlers = context.handlers.clone();
        self.last_dispatch = Some(Dispatch { kind, context });

        match outcome {
            Ok(response) => {
                self.state = RequestState::Resolved;
                Ok(response)
            }
            Err(error) => {
                let handler = handlers
                    .find(&error)
                    .cloned()
                    .or_else(|| self.client.global_handler(&error));
                if let Some(handler) = handler {
                    tracing::debug!(%error, url = %effective.url, "Failure resolved by handler");
                    self.state = RequestState::Resolved;
                    Ok(handler.call(&error, &effective))
                } else {
                    tracing::warn!(%error, url = %effective.url, "Request failed without a matching handler");
                    self.state = RequestState::Failed;
                    Err(PikaError::Transport(error))
                }
            }
        }
    }

    fn update_context(&mut self, apply: impl FnOnce(&mut RequestContext)) -> &mut Self {
        let mut context = match mem::take(&mut self.state) {
            RequestState::Building(context) => context,
            _ => RequestContext::default(),
        };
        apply(&mut context);
        self.state = RequestState::Building(context);
        self
    }
}

impl HandlerRegistrar for Request {
    fn register_status_handler(&mut self, status: u16, handler: Handler) -> &mut Self {
        self.update_context(|context| context.handlers.insert_status(status, handler))
    }

    fn register_error_code_handler(&mut self, code: ErrorCode, handler: Handler) -> &mut Self {
        self.update_context(|context| context.handlers.insert_error_code(code, handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::TransportError;
    use crate::clients::transport::Transport;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Arc;

    type SendHook = Box<dyn FnOnce() + Send>;

    /// Transport that records requests and replays scripted outcomes.
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<EffectiveConfig>>,
        during_send: Mutex<Option<SendHook>>,
    }

    impl ScriptedTransport {
        /// Runs `hook` inside the next `send`, before it completes.
        fn while_sending(&self, hook: impl FnOnce() + Send + 'static) {
            *self.during_send.lock() = Some(Box::new(hook));
        }

        fn push(&self, outcome: Result<HttpResponse, TransportError>) {
            self.outcomes.lock().push_back(outcome);
        }

        fn seen(&self) -> Vec<EffectiveConfig> {
            self.seen.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &EffectiveConfig) -> Result<HttpResponse, TransportError> {
            let hook = self.during_send.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            self.seen.lock().push(request.clone());
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::from_data(200, json!({"ok": true}))))
        }
    }

    fn client() -> (Pika, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let client = Pika::from_parts(crate::ConfigStore::new(), transport.clone());
        (client, transport)
    }

    fn status_failure(status: u16) -> TransportError {
        TransportError::Response(HttpResponse::from_data(status, json!({"status": status})))
    }

    #[test]
    fn test_first_builder_call_creates_context() {
        let (client, _) = client();
        let mut request = client.request();
        assert!(matches!(request.state(), RequestState::Empty));

        request.url("/users").header("X-A", "1");
        let context = request.context().unwrap();
        assert_eq!(context.config().url.as_deref(), Some("/users"));
        assert_eq!(context.config().header("x-a"), Some("1"));
    }

    #[test]
    fn test_invalid_method_leaves_context_untouched() {
        let (client, _) = client();
        let mut request = client.request();
        request.method("post").unwrap();

        assert!(request.method("brew").is_err());
        assert_eq!(
            request.context().unwrap().config().method,
            Some(Method::Post)
        );
    }

    #[test]
    fn test_successful_dispatch_merges_and_clears_context() {
        let (mut client, transport) = client();
        client.base_url("https://api.example.com").header("X-Global", "g");
        let mut request = client.request();

        let response = tokio_test::block_on(
            request
                .header("X-Local", "l")
                .param("page", "2")
                .get("/users"),
        )
        .unwrap();

        assert_eq!(response.data, json!({"ok": true}));
        assert!(matches!(request.state(), RequestState::Resolved));
        assert!(request.context().is_none());

        let sent = &transport.seen()[0];
        assert_eq!(sent.method, Method::Get);
        assert_eq!(sent.url, "https://api.example.com/users");
        assert_eq!(sent.header("x-global").as_deref(), Some("g"));
        assert_eq!(sent.header("x-local").as_deref(), Some("l"));
        assert_eq!(
            sent.config.params.as_ref().unwrap().get("page"),
            Some(&"2".to_string())
        );
    }

    #[test]
    fn test_second_chain_does_not_see_first_chain() {
        let (client, transport) = client();
        let mut request = client.request();

        tokio_test::block_on(
            request
                .header("X-First", "1")
                .body(json!({"a": 1}))
                .post("https://api.example.com/a"),
        )
        .unwrap();
        tokio_test::block_on(request.get("https://api.example.com/b")).unwrap();

        let second = &transport.seen()[1];
        assert!(second.header("x-first").is_none());
        assert!(second.config.data.is_none());
        assert_eq!(second.method, Method::Get);
    }

    #[test]
    fn test_send_uses_default_method_then_get() {
        let (mut client, transport) = client();
        let mut request = client.request();
        tokio_test::block_on(request.url("https://x.example").send()).unwrap();

        client.method("delete").unwrap();
        tokio_test::block_on(request.url("https://x.example").send()).unwrap();
        tokio_test::block_on(request.url("https://x.example").method_value(Method::Patch).send())
            .unwrap();

        let seen = transport.seen();
        assert_eq!(seen[0].method, Method::Get);
        assert_eq!(seen[1].method, Method::Delete);
        assert_eq!(seen[2].method, Method::Patch);
    }

    #[test]
    fn test_request_handler_resolves_failure() {
        let (client, transport) = client();
        transport.push(Err(status_failure(404)));
        let mut request = client.request();

        let response = tokio_test::block_on(
            request
                .on_not_found(|_, _| HttpResponse::from_data(200, json!("recovered")))
                .get("https://api.example.com/missing"),
        )
        .unwrap();

        assert_eq!(response.data, json!("recovered"));
        assert!(matches!(request.state(), RequestState::Resolved));
    }

    #[test]
    fn test_request_handler_wins_over_global() {
        let (mut client, transport) = client();
        client.on_not_found(|_, _| HttpResponse::from_data(200, json!("global")));
        transport.push(Err(status_failure(404)));
        transport.push(Err(status_failure(404)));
        let mut request = client.request();

        let local = tokio_test::block_on(
            request
                .on_not_found(|_, _| HttpResponse::from_data(200, json!("local")))
                .get("https://api.example.com/a"),
        )
        .unwrap();
        let global = tokio_test::block_on(request.get("https://api.example.com/b")).unwrap();

        assert_eq!(local.data, json!("local"));
        assert_eq!(global.data, json!("global"));
    }

    #[test]
    fn test_unhandled_failure_is_returned_unchanged() {
        let (client, transport) = client();
        let original = status_failure(500);
        transport.push(Err(original.clone()));
        let mut request = client.request();

        let result = tokio_test::block_on(request.header("X-A", "1").get("https://api.example.com"));
        match result {
            Err(PikaError::Transport(error)) => assert_eq!(error, original),
            other => panic!("expected transport failure, got {other:?}"),
        }
        assert!(matches!(request.state(), RequestState::Failed));
        assert!(request.context().is_none());
    }

    #[test]
    fn test_global_error_code_handler_resolves_timeout() {
        let (mut client, transport) = client();
        client.on_timeout(|error, _| {
            HttpResponse::from_data(504, json!({"code": error.error_code().map(ErrorCode::as_str)}))
        });
        transport.push(Err(TransportError::code(ErrorCode::Timeout, "timeout of 10ms exceeded")));
        let mut request = client.request();

        let response = tokio_test::block_on(request.get("https://slow.example")).unwrap();
        assert_eq!(response.status, 504);
        assert_eq!(response.data, json!({"code": "ECONNABORTED"}));
    }

    #[test]
    fn test_status_handler_does_not_match_code_failure() {
        let (client, transport) = client();
        transport.push(Err(TransportError::code(ErrorCode::ConnectionRefused, "refused")));
        let mut request = client.request();

        let result = tokio_test::block_on(
            request
                .on_status(500, |_, _| HttpResponse::from_data(200, Value::Null))
                .get("https://down.example"),
        );
        assert!(matches!(result, Err(PikaError::Transport(TransportError::Code { .. }))));
    }

    #[test]
    fn test_replay_without_dispatch_is_usage_error() {
        let (client, transport) = client();
        let mut request = client.request();
        let result = tokio_test::block_on(request.replay());
        assert!(matches!(result, Err(PikaError::Usage(UsageError::NoPriorDispatch))));
        assert!(transport.seen().is_empty());
    }

    #[test]
    fn test_replay_repeats_last_dispatch() {
        let (mut client, transport) = client();
        let mut request = client.request();
        tokio_test::block_on(
            request
                .body(json!({"n": 1}))
                .header("X-Replay", "yes")
                .put("https://api.example.com/items/1"),
        )
        .unwrap();

        client.header("X-Later", "default");
        tokio_test::block_on(request.replay()).unwrap();

        let seen = transport.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].method, Method::Put);
        assert_eq!(seen[1].url, "https://api.example.com/items/1");
        assert_eq!(seen[1].config.data, Some(json!({"n": 1})));
        assert_eq!(seen[1].header("x-replay").as_deref(), Some("yes"));
        assert_eq!(seen[1].header("x-later").as_deref(), Some("default"));
        assert_eq!(
            request.last_dispatch(),
            Some(DispatchKind::Verb(Method::Put))
        );
    }

    #[test]
    fn test_replay_after_failure_is_allowed() {
        let (client, transport) = client();
        transport.push(Err(status_failure(503)));
        let mut request = client.request();

        assert!(tokio_test::block_on(request.get("https://flaky.example")).is_err());
        let response = tokio_test::block_on(request.replay()).unwrap();
        assert!(response.is_ok());
    }

    #[test]
    fn test_fetch_json_decodes_and_reports_mismatch() {
        #[derive(serde::Deserialize)]
        struct Payload {
            ok: bool,
        }

        let (client, transport) = client();
        let mut request = client.request();
        let decoded: Payload =
            tokio_test::block_on(request.url("https://api.example.com").fetch_json()).unwrap();
        assert!(decoded.ok);

        transport.push(Ok(HttpResponse::from_data(200, json!("text"))));
        let result: Result<Payload, _> =
            tokio_test::block_on(request.url("https://api.example.com").fetch_json());
        assert!(matches!(result, Err(PikaError::Decode(_))));
    }

    #[test]
    fn test_timeout_millis_validation() {
        let (client, _) = client();
        let mut request = client.request();
        request.timeout_millis(250.0).unwrap();
        assert!(request.timeout_millis(f64::NAN).is_err());
        assert_eq!(
            request.context().unwrap().config().timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_setters_during_send_do_not_change_in_flight_request() {
        let (mut client, transport) = client();
        client
            .base_url("https://before.example")
            .header("X-Version", "1");

        let mut concurrent = client.store().clone();
        transport.while_sending(move || {
            concurrent
                .set_base_url("https://after.example")
                .set_header("X-Version", "2")
                .set_header("X-Late", "yes");
        });

        let mut request = client.request();
        tokio_test::block_on(request.get("/items")).unwrap();

        let in_flight = &transport.seen()[0];
        assert_eq!(in_flight.url, "https://before.example/items");
        assert_eq!(in_flight.header("x-version").as_deref(), Some("1"));
        assert!(in_flight.header("x-late").is_none());

        tokio_test::block_on(request.get("/items")).unwrap();
        let next = &transport.seen()[1];
        assert_eq!(next.url, "https://after.example/items");
        assert_eq!(next.header("x-version").as_deref(), Some("2"));
    }

    #[test]
    fn test_replay_json_repeats_decoding_dispatch() {
        #[derive(serde::Deserialize)]
        struct Count {
            count: u32,
        }

        let (client, transport) = client();
        transport.push(Ok(HttpResponse::from_data(200, json!({"count": 1}))));
        transport.push(Ok(HttpResponse::from_data(200, json!({"count": 2}))));
        transport.push(Ok(HttpResponse::from_data(200, json!({"count": 3}))));
        let mut request = client.request();

        let first: Count =
            tokio_test::block_on(request.url("https://api.example.com/count").fetch_json())
                .unwrap();
        let replayed: Count = tokio_test::block_on(request.replay_json()).unwrap();
        let raw = tokio_test::block_on(request.replay()).unwrap();

        assert_eq!(first.count, 1);
        assert_eq!(replayed.count, 2);
        assert_eq!(raw.data, json!({"count": 3}));
        assert_eq!(request.last_dispatch(), Some(DispatchKind::Send));
        assert!(transport
            .seen()
            .iter()
            .all(|sent| sent.url == "https://api.example.com/count"));
    }
}
