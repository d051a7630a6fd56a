//! HTTP transport for TurboCommerce storefront clients.
//!
//! Provides the request descriptor every API call is built from, the response
//! type, and the [`HttpTransport`] seam with a `reqwest` implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_data::{HttpTransport, PendingRequest, ReqwestTransport};
//! use std::time::Duration;
//!
//! let transport = ReqwestTransport::new(Duration::from_secs(30))?;
//!
//! let request = PendingRequest::get("https://api.example.com/products/123")
//!     .header("Accept", "application/json");
//! let product: Product = transport.send(&request).await?.json()?;
//! ```

mod error;
mod request;
mod response;
mod transport;

pub use error::TransportError;
pub use request::{resolve_url, Method, PendingRequest};
pub use response::Response;
pub use transport::{HttpTransport, ReqwestTransport};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{HttpTransport, Method, PendingRequest, Response, TransportError};
}
