//! # Pika
//!
//! A small HTTP client with layered configuration and status-keyed failure
//! handlers.
//!
//! ## Overview
//!
//! This crate provides:
//! - Shared default configuration via [`ConfigStore`], readable as consistent snapshots
//! - Per-request overrides merged over the defaults with per-field policies
//! - Failure handlers keyed by HTTP status or transport error code, at the
//!   request scope and the global scope
//! - Replay of the last dispatch of a request instance
//! - An async transport seam, [`Transport`], with a `reqwest` implementation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pika::{HandlerRegistrar, HttpResponse, Pika};
//! use serde_json::json;
//!
//! let mut client = Pika::new();
//! client
//!     .base_url("https://api.example.com")
//!     .authorization("Bearer token")
//!     .header("X-App", "demo");
//!
//! let mut request = client.request();
//! let user = request
//!     .on_not_found(|_, _| HttpResponse::from_data(404, json!({"id": null})))
//!     .get("/users/42")
//!     .await?;
//! ```
//!
//! ## Dynamic Configuration
//!
//! Defaults can also be applied from JSON, for example when they come from a
//! configuration file:
//!
//! ```rust
//! use pika::ConfigStore;
//! use serde_json::json;
//!
//! let mut store = ConfigStore::new();
//! store
//!     .apply_json(&json!({
//!         "baseURL": "https://api.example.com",
//!         "timeout": 2500,
//!         "headers": {"common": {"X-App": "demo"}}
//!     }))
//!     .unwrap();
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.base_url.as_deref(), Some("https://api.example.com"));
//! ```
//!
//! ## Design Principles
//!
//! - **Instance-based state**: Each [`Pika`] owns its defaults and handlers
//! - **Fail-fast validation**: Invalid values are rejected at the setter
//! - **Snapshot reads**: A dispatch never sees a half-applied configuration
//! - **Thread-safe**: All public types are `Send + Sync`
//! - **Async-first**: Designed for use with Tokio async runtime

pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use config::{ConfigStore, Method, RequestConfig, ResponseType, StatusValidator, ValueKind};
pub use error::ConfigError;

// Re-export client types
pub use clients::{
    DispatchKind, EffectiveConfig, ErrorCode, Handler, HandlerRegistrar, HandlerRegistry,
    HttpResponse, Pika, PikaError, Request, RequestContext, RequestState, ReqwestTransport,
    Transport, TransportError, UsageError,
};
