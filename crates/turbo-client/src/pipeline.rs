//! The authenticated request pipeline.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use turbo_auth::{parse_token_response, CredentialStore, Credentials, RefreshRequest};
use turbo_data::{
    resolve_url, HttpTransport, Method, PendingRequest, ReqwestTransport, Response,
    TransportError,
};

use crate::refresh::{RefreshCoordinator, Recovery};
use crate::{ApiError, ClientConfig, ClientError};

/// Sends API calls with the current bearer token and renews the session when
/// the backend answers 401.
///
/// At most one refresh call is in flight at any time. Every request that hit
/// a 401 while it ran is served by its outcome: replayed once with the new
/// access token, or failed with [`ApiError::SessionExpired`] after the
/// session has been cleared. A replay is never refreshed again.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use turbo_auth::{Credentials, MemoryCredentialStore};
/// use turbo_client::{AuthPipeline, ClientConfig};
///
/// let store = Arc::new(MemoryCredentialStore::new());
/// let pipeline = AuthPipeline::from_config(ClientConfig::new("https://api.shop.example.com"), store.clone())?;
///
/// pipeline.sign_in(Credentials::new(access, refresh)?);
/// let items: Vec<CartItem> = pipeline.execute_json(pipeline.get("/api/cart-items")).await?;
/// ```
pub struct AuthPipeline {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn CredentialStore>,
    refresh: RefreshCoordinator,
}

impl AuthPipeline {
    /// Create a pipeline over an existing transport and store.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            refresh: RefreshCoordinator::new(),
        }
    }

    /// Validate `config` and build a pipeline on a `reqwest` transport.
    pub fn from_config(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let transport =
            ReqwestTransport::builder(config.request_timeout(), config.user_agent.as_deref())?;
        Ok(Self::new(config, Arc::new(transport), store))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Check if a refresh call is running right now.
    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Start a session, e.g. after login or OTP verification.
    pub fn sign_in(&self, credentials: Credentials) {
        self.store.set_credentials(credentials);
    }

    /// End the session. Returns `true` if there was one.
    pub fn sign_out(&self) -> bool {
        self.store.clear_credentials()
    }

    /// Build a request against the configured base URL with the default
    /// headers applied.
    pub fn request(&self, method: Method, path: &str) -> PendingRequest {
        let url = resolve_url(Some(&self.config.base_url), path);
        PendingRequest::new(method, url).headers(
            self.config
                .default_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    pub fn get(&self, path: &str) -> PendingRequest {
        self.request(Method::Get, path)
    }

    pub fn post(&self, path: &str) -> PendingRequest {
        self.request(Method::Post, path)
    }

    pub fn put(&self, path: &str) -> PendingRequest {
        self.request(Method::Put, path)
    }

    pub fn patch(&self, path: &str) -> PendingRequest {
        self.request(Method::Patch, path)
    }

    pub fn delete(&self, path: &str) -> PendingRequest {
        self.request(Method::Delete, path)
    }

    /// Execute a request and decode the JSON body of the successful response.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        response
            .json()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Execute a request, transparently renewing the session on 401.
    pub async fn execute(&self, request: PendingRequest) -> Result<Response, ApiError> {
        self.refresh.wait_idle().await;

        // Generation first, token second. See `refresh` module docs.
        let generation = self.refresh.generation();
        let access_token = self.store.access_token();
        let decorated = decorate(&request, access_token.as_deref());

        debug!(
            method = %request.method,
            url = %request.url,
            authenticated = access_token.is_some(),
            "dispatching request"
        );

        match self.transport.send(&decorated).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_unauthorized() => {
                debug!(url = %request.url, "request unauthorized; recovering session");
                self.recover(request, generation, access_token).await
            }
            Err(err) => {
                debug!(url = %request.url, error = %err, "request failed");
                Err(err.into())
            }
        }
    }

    async fn recover(
        &self,
        request: PendingRequest,
        seen_generation: u64,
        sent_token: Option<String>,
    ) -> Result<Response, ApiError> {
        match self.refresh.enter(seen_generation).await {
            Recovery::Lead(lease) => {
                let renewed = self.refresh_session().await;
                // Release before replaying so replays run in parallel.
                drop(lease);
                match renewed {
                    Some(credentials) => self.replay(request, &credentials.access_token).await,
                    None => Err(ApiError::SessionExpired),
                }
            }
            Recovery::Follow => match self.store.access_token() {
                Some(token) => {
                    if sent_token.as_deref() == Some(token.as_str()) {
                        warn!(
                            url = %request.url,
                            "concurrent refresh left the access token unchanged; replaying anyway"
                        );
                    }
                    self.replay(request, &token).await
                }
                None => {
                    debug!(url = %request.url, "session ended by concurrent refresh");
                    Err(ApiError::SessionExpired)
                }
            },
        }
    }

    /// Exchange the refresh token for a new pair. Must be called with the
    /// refresh lease held. On any failure the session is cleared.
    async fn refresh_session(&self) -> Option<Credentials> {
        let Some(refresh_token) = self.store.refresh_token() else {
            warn!("no refresh token available; signing out");
            self.store.clear_credentials();
            return None;
        };

        match self.call_refresh_endpoint(&refresh_token).await {
            Ok(credentials) => {
                self.store.set_credentials(credentials.clone());
                info!("session refreshed");
                Some(credentials)
            }
            Err(reason) => {
                warn!(%reason, "token refresh failed; signing out");
                self.store.clear_credentials();
                None
            }
        }
    }

    async fn call_refresh_endpoint(&self, refresh_token: &str) -> Result<Credentials, String> {
        let request = self
            .refresh_request(refresh_token)
            .map_err(|e| e.to_string())?;

        debug!(url = %request.url, "refreshing session");

        let timeout = self.config.refresh_timeout();
        let response = tokio::time::timeout(timeout, self.transport.send(&request))
            .await
            .map_err(|_| format!("refresh timed out after {:?}", timeout))?
            .map_err(|e| e.to_string())?;

        parse_token_response(response.bytes()).map_err(|e| e.to_string())
    }

    /// The refresh call carries the default headers, minus any
    /// Authorization header: only the refresh token in the body authenticates it.
    fn refresh_request(&self, refresh_token: &str) -> Result<PendingRequest, TransportError> {
        let headers = self
            .config
            .default_headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(http::header::AUTHORIZATION.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()));

        PendingRequest::post(self.config.refresh_url())
            .headers(headers)
            .json(&RefreshRequest::new(refresh_token))
    }

    async fn replay(&self, request: PendingRequest, token: &str) -> Result<Response, ApiError> {
        debug!(method = %request.method, url = %request.url, "replaying request with renewed token");
        let decorated = request.bearer_auth(token);
        self.transport.send(&decorated).await.map_err(ApiError::from)
    }
}

fn decorate(request: &PendingRequest, access_token: Option<&str>) -> PendingRequest {
    match access_token {
        Some(token) => request.clone().bearer_auth(token),
        None => request.clone(),
    }
}
