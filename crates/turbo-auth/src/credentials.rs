//! Session credentials.

use crate::AuthError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The token pair that makes up an authenticated session.
///
/// Both tokens always travel together, so a stored session is either fully
/// populated or absent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Short-lived bearer credential sent with every request.
    #[serde(alias = "access_token")]
    pub access_token: String,
    /// Longer-lived credential exchanged for a new pair.
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

impl Credentials {
    /// Create a credential pair. Empty tokens are rejected.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() {
            return Err(AuthError::EmptyToken("access"));
        }
        if refresh_token.is_empty() {
            return Err(AuthError::EmptyToken("refresh"));
        }
        Ok(Self {
            access_token,
            refresh_token,
        })
    }
}

// Tokens never show up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Short, log-safe rendering of a token: its first four characters and length.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}… ({} chars)", prefix, token.chars().count())
}

/// Whether the application currently holds a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Authenticated,
    SignedOut,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }
}
