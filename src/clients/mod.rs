//! Client, request instances and transport.
//!
//! This module turns configuration into HTTP traffic and routes failures to
//! handlers.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`Pika`]: The client holding shared defaults and global handlers
//! - [`Request`]: A request instance with its own per-call overrides
//! - [`HandlerRegistrar`]: Failure handler registration for both scopes
//! - [`Transport`]: The seam between dispatch and the network
//! - [`ReqwestTransport`]: The default `reqwest`-backed transport
//! - [`HttpResponse`]: The value every dispatch resolves to
//! - [`TransportError`]: A failed exchange, by status or by error code
//!
//! # Example
//!
//! ```rust,ignore
//! use pika::{HandlerRegistrar, HttpResponse, Pika};
//! use serde_json::json;
//!
//! let mut client = Pika::new();
//! client
//!     .base_url("https://api.example.com")
//!     .on_timeout(|_, _| HttpResponse::from_data(504, json!(null)));
//!
//! let mut request = client.request();
//! let response = request
//!     .param("page", "2")
//!     .on_not_found(|_, _| HttpResponse::from_data(200, json!([])))
//!     .get("/users")
//!     .await?;
//! ```
//!
//! # Failure Handling
//!
//! When the transport fails, a dispatch looks for a handler in this order:
//!
//! - **Request scope**: handlers registered on the [`Request`] for this dispatch
//! - **Global scope**: handlers registered on the [`Pika`] client
//!
//! Failures with a response are matched by status code, the others by
//! error code such as `ECONNABORTED`. If nothing matches, the original
//! failure is returned as [`PikaError::Transport`].

mod client;
mod errors;
mod handlers;
mod http_response;
mod request;
mod transport;

pub use client::Pika;
pub use errors::{ErrorCode, PikaError, TransportError, UsageError};
pub use handlers::{status, Handler, HandlerRegistrar, HandlerRegistry};
pub use http_response::HttpResponse;
pub use request::{DispatchKind, Request, RequestContext, RequestState};
pub use transport::{EffectiveConfig, ReqwestTransport, Transport};
