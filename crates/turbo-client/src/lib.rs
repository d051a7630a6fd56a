//! Authenticated request pipeline for TurboCommerce storefront clients.
//!
//! Every feature-level API call (products, cart, checkout, orders,
//! addresses) goes through [`AuthPipeline::execute`]. The pipeline attaches
//! the current bearer token, and when the backend answers 401 it renews the
//! session exactly once for all concurrent callers, replays the affected
//! requests, or signs the user out when renewal is impossible.
//!
//! This crate provides:
//! - `AuthPipeline` - decoration, dispatch, 401 recovery and replay
//! - `ClientConfig` - base URL, refresh endpoint, timeouts, default headers
//! - `ApiError` - the normalized error every failed call resolves to

mod config;
mod error;
mod pipeline;
mod refresh;

pub use config::ClientConfig;
pub use error::{ApiError, ClientError, SESSION_EXPIRED_MESSAGE};
pub use pipeline::AuthPipeline;

// Re-exported so callers only need this crate for everyday use.
pub use turbo_auth::{Credentials, CredentialStore, MemoryCredentialStore, SessionStatus};
pub use turbo_data::{HttpTransport, Method, PendingRequest, Response, TransportError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ApiError, AuthPipeline, ClientConfig, Credentials, MemoryCredentialStore, PendingRequest,
    };
}
