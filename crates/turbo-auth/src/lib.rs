//! Session credentials for TurboCommerce storefront clients.
//!
//! Provides the token pair, the [`CredentialStore`] seam the request
//! pipeline reads and writes, and the wire types of the refresh exchange.

mod credentials;
mod error;
mod store;
mod token;

pub use credentials::{redact, Credentials, SessionStatus};
pub use error::AuthError;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use token::{parse_token_response, RefreshRequest};
