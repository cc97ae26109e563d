//! Failure handlers keyed by status code or transport error code.
//!
//! A [`HandlerRegistry`] maps statuses and [`ErrorCode`]s to [`Handler`]s.
//! The client owns the global registry and each request context owns its
//! own; when a dispatch fails the request registry is consulted first, then
//! the global one. A handler that matches turns the failure into a resolved
//! [`HttpResponse`].
//!
//! Both scopes register through the [`HandlerRegistrar`] trait, which also
//! provides the named shortcuts such as [`on_not_found`](HandlerRegistrar::on_not_found).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::clients::errors::{ErrorCode, TransportError};
use crate::clients::http_response::HttpResponse;
use crate::clients::transport::EffectiveConfig;

/// Status codes with named registrars.
pub mod status {
    /// 400 Bad Request.
    pub const BAD_REQUEST: u16 = 400;
    /// 401 Unauthorized.
    pub const UNAUTHORIZED: u16 = 401;
    /// 403 Forbidden.
    pub const FORBIDDEN: u16 = 403;
    /// 404 Not Found.
    pub const NOT_FOUND: u16 = 404;
    /// 405 Method Not Allowed.
    pub const METHOD_NOT_ALLOWED: u16 = 405;
    /// 408 Request Timeout.
    pub const REQUEST_TIMEOUT: u16 = 408;
    /// 500 Internal Server Error.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// 501 Not Implemented.
    pub const NOT_IMPLEMENTED: u16 = 501;
}

/// A failure handler.
///
/// Called with the failure and the effective configuration of the request
/// that failed; its return value becomes the result of the dispatch.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync>);

impl Handler {
    /// Wraps a callback.
    pub fn new(
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(callback))
    }

    /// Invokes the callback.
    #[must_use]
    pub fn call(&self, error: &TransportError, request: &EffectiveConfig) -> HttpResponse {
        (self.0)(error, request)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// Handlers for one scope.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
    by_status: HashMap<u16, Handler>,
    by_code: HashMap<ErrorCode, Handler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `status`, replacing any previous one.
    pub fn insert_status(&mut self, status: u16, handler: Handler) {
        self.by_status.insert(status, handler);
    }

    /// Registers `handler` for `code`, replacing any previous one.
    pub fn insert_error_code(&mut self, code: ErrorCode, handler: Handler) {
        self.by_code.insert(code, handler);
    }

    /// Finds the handler for a failure.
    ///
    /// Failures carrying a response are matched by status, the others by
    /// error code.
    #[must_use]
    pub fn find(&self, error: &TransportError) -> Option<&Handler> {
        match error {
            TransportError::Response(response) => self.by_status.get(&response.status),
            TransportError::Code { code, .. } => self.by_code.get(code),
        }
    }

    /// Returns `true` when no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty() && self.by_code.is_empty()
    }
}

/// Registration of failure handlers, shared by the global and request scopes.
///
/// Implementors provide the two generic registrars; the named shortcuts are
/// provided on top of them.
///
/// # Example
///
/// ```rust
/// use pika::{HandlerRegistrar, HttpResponse, Pika};
/// use serde_json::json;
///
/// let mut client = Pika::new();
/// client
///     .on_unauthorized(|_, _| HttpResponse::from_data(401, json!({"login": true})))
///     .on_timeout(|_, _| HttpResponse::from_data(504, json!(null)));
/// ```
pub trait HandlerRegistrar {
    /// Registers a handler for a response status.
    fn register_status_handler(&mut self, status: u16, handler: Handler) -> &mut Self;

    /// Registers a handler for a transport error code.
    fn register_error_code_handler(&mut self, code: ErrorCode, handler: Handler) -> &mut Self;

    /// Registers a callback for a response status.
    fn on_status(
        &mut self,
        status: u16,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.register_status_handler(status, Handler::new(callback))
    }

    /// Registers a callback for a transport error code.
    fn on_error_code(
        &mut self,
        code: impl Into<ErrorCode>,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.register_error_code_handler(code.into(), Handler::new(callback))
    }

    /// Handles 400 Bad Request.
    fn on_bad_request(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::BAD_REQUEST, callback)
    }

    /// Handles 401 Unauthorized.
    fn on_unauthorized(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::UNAUTHORIZED, callback)
    }

    /// Handles 403 Forbidden.
    fn on_forbidden(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::FORBIDDEN, callback)
    }

    /// Handles 404 Not Found.
    fn on_not_found(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::NOT_FOUND, callback)
    }

    /// Handles 405 Method Not Allowed.
    fn on_method_not_allowed(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::METHOD_NOT_ALLOWED, callback)
    }

    /// Handles 408 Request Timeout.
    fn on_request_timeout(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::REQUEST_TIMEOUT, callback)
    }

    /// Handles 500 Internal Server Error.
    fn on_internal_server_error(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::INTERNAL_SERVER_ERROR, callback)
    }

    /// Handles 501 Not Implemented.
    fn on_not_implemented(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_status(status::NOT_IMPLEMENTED, callback)
    }

    /// Handles refused connections (`ECONNREFUSED`).
    fn on_connection_refused(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_error_code(ErrorCode::ConnectionRefused, callback)
    }

    /// Handles timeouts (`ECONNABORTED`).
    fn on_timeout(
        &mut self,
        callback: impl Fn(&TransportError, &EffectiveConfig) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_error_code(ErrorCode::Timeout, callback)
    }
}

impl HandlerRegistrar for HandlerRegistry {
    fn register_status_handler(&mut self, status: u16, handler: Handler) -> &mut Self {
        self.insert_status(status, handler);
        self
    }

    fn register_error_code_handler(&mut self, code: ErrorCode, handler: Handler) -> &mut Self {
        self.insert_error_code(code, handler);
        self
    }
}
