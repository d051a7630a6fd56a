//! Wire types for the token refresh exchange.
//!
//! The backend expects `{"refreshToken": "..."}` and answers with a new
//! access/refresh pair, either bare or wrapped in a `data` envelope.

use crate::{AuthError, Credentials};
use serde::{Deserialize, Serialize};

/// Body of the refresh call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

impl<'a> RefreshRequest<'a> {
    pub fn new(refresh_token: &'a str) -> Self {
        Self { refresh_token }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Enveloped { data: TokenPair },
    Bare(TokenPair),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    #[serde(alias = "access_token")]
    access_token: Option<String>,
    #[serde(alias = "refresh_token")]
    refresh_token: Option<String>,
}

/// Parse a refresh response body into a new credential pair.
///
/// Anything short of two non-empty tokens is an error.
pub fn parse_token_response(body: &[u8]) -> Result<Credentials, AuthError> {
    let response: TokenResponse = serde_json::from_slice(body)
        .map_err(|e| AuthError::MalformedTokenResponse(e.to_string()))?;
    let pair = match response {
        TokenResponse::Enveloped { data } => data,
        TokenResponse::Bare(pair) => pair,
    };

    match (pair.access_token, pair.refresh_token) {
        (Some(access), Some(refresh)) => Credentials::new(access, refresh)
            .map_err(|e| AuthError::MalformedTokenResponse(e.to_string())),
        (None, _) => Err(AuthError::MalformedTokenResponse(
            "missing access token".to_string(),
        )),
        (_, None) => Err(AuthError::MalformedTokenResponse(
            "missing refresh token".to_string(),
        )),
    }
}
