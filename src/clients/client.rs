//! The pika client.
//!
//! This module provides [`Pika`], which ties together the shared default
//! configuration, the global failure handlers and the transport, and hands
//! out [`Request`] instances.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::clients::errors::{ErrorCode, TransportError};
use crate::clients::handlers::{Handler, HandlerRegistrar, HandlerRegistry};
use crate::clients::request::Request;
use crate::clients::transport::{ReqwestTransport, Transport};
use crate::config::ConfigStore;
use crate::error::ConfigError;

/// A configured HTTP client.
///
/// Configure defaults and global handlers once, then create a [`Request`]
/// per call. Clones share the same defaults, handlers and transport.
///
/// # Thread Safety
///
/// `Pika` is `Clone`, `Send` and `Sync`. Configuration changes made through
/// any clone are seen by requests dispatched afterwards, never by requests
/// already in flight.
///
/// # Example
///
/// ```rust,ignore
/// use pika::{HandlerRegistrar, HttpResponse, Pika};
/// use serde_json::json;
///
/// let mut client = Pika::new();
/// client
///     .base_url("https://api.example.com")
///     .authorization("Bearer token")
///     .on_not_found(|_, _| HttpResponse::from_data(404, json!(null)));
///
/// let response = client.request().get("/users/42").await?;
/// println!("{}", response.data);
/// ```
#[derive(Clone)]
pub struct Pika {
    store: ConfigStore,
    handlers: Arc<RwLock<HandlerRegistry>>,
    transport: Arc<dyn Transport>,
}

// Verify Pika is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Pika>();
};

impl Default for Pika {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pika {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pika")
            .field("store", &self.store)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl Pika {
    /// Creates a client with library defaults and the `reqwest` transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Creates a client with library defaults and a custom transport.
    #[must_use]
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self::from_parts(ConfigStore::new(), Arc::new(transport))
    }

    /// Creates a client from an existing store and transport.
    #[must_use]
    pub fn from_parts(store: ConfigStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            handlers: Arc::new(RwLock::new(HandlerRegistry::new())),
            transport,
        }
    }

    /// Returns the shared default configuration.
    #[must_use]
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Returns the shared default configuration for updates.
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    /// Creates a request instance with an empty context.
    #[must_use]
    pub fn request(&self) -> Request {
        Request::new(self.clone())
    }

    /// Sets the default base URL.
    pub fn base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.store.set_base_url(base_url);
        self
    }

    /// Sets the default timeout.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.store.set_timeout(timeout);
        self
    }

    /// Sets the default method.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedMethod`] for methods outside the supported set.
    pub fn method(&mut self, method: &str) -> Result<&mut Self, ConfigError> {
        self.store.set_method(method)?;
        Ok(self)
    }

    /// Sets a default header.
    pub fn header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.store.set_header(key, value);
        self
    }

    /// Sets the default `Authorization` header.
    pub fn authorization(&mut self, token: impl Into<String>) -> &mut Self {
        self.store.set_authorization(token);
        self
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Returns the global handler for a failure, if one is registered.
    pub(crate) fn global_handler(&self, error: &TransportError) -> Option<Handler> {
        self.handlers.read().find(error).cloned()
    }
}

impl HandlerRegistrar for Pika {
    fn register_status_handler(&mut self, status: u16, handler: Handler) -> &mut Self {
        self.handlers.write().insert_status(status, handler);
        self
    }

    fn register_error_code_handler(&mut self, code: ErrorCode, handler: Handler) -> &mut Self {
        self.handlers.write().insert_error_code(code, handler);
        self
    }
}
