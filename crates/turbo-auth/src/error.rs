//! Authentication errors.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token endpoint answered, but not with a usable token pair.
    #[error("malformed token response: {0}")]
    MalformedTokenResponse(String),

    /// A token was empty.
    #[error("empty {0} token")]
    EmptyToken(&'static str),
}
