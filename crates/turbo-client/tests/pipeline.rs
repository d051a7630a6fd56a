//! End-to-end behaviour of the pipeline against a scripted backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use turbo_client::{
    ApiError, AuthPipeline, ClientConfig, CredentialStore, Credentials, HttpTransport,
    MemoryCredentialStore, PendingRequest, Response, SessionStatus, TransportError,
};

const BASE: &str = "https://api.shop.test";
const REFRESH_URL: &str = "https://api.shop.test/auth/refresh";

#[derive(Clone)]
enum RefreshReply {
    Issue(&'static str, &'static str),
    Reject(u16),
    Malformed,
    NetworkDown,
    Hang,
}

enum Failure {
    Status(u16),
    Network,
}

/// Backend that accepts exactly one access token and answers everything
/// else with 401.
struct FakeBackend {
    valid_token: &'static str,
    refresh_reply: RefreshReply,
    failure: Option<Failure>,
    hold_refresh_until: usize,
    refresh_gate: Option<Semaphore>,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
    sent: Mutex<Vec<PendingRequest>>,
}

impl FakeBackend {
    fn new(valid_token: &'static str) -> Self {
        Self {
            valid_token,
            refresh_reply: RefreshReply::Issue("tok-B", "refresh-2"),
            failure: None,
            hold_refresh_until: 0,
            refresh_gate: None,
            refresh_calls: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn refresh_reply(mut self, reply: RefreshReply) -> Self {
        self.refresh_reply = reply;
        self
    }

    fn fail_with(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Keep the refresh call open until this many 401s have been served.
    fn hold_refresh_until(mut self, unauthorized: usize) -> Self {
        self.hold_refresh_until = unauthorized;
        self
    }

    /// Keep the refresh call open until `release_refresh` is called.
    fn gate_refresh(mut self) -> Self {
        self.refresh_gate = Some(Semaphore::new(0));
        self
    }

    fn release_refresh(&self) {
        if let Some(gate) = &self.refresh_gate {
            gate.add_permits(1);
        }
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn unauthorized(&self) -> usize {
        self.unauthorized.load(Ordering::SeqCst)
    }

    fn sent(&self) -> Vec<PendingRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_to(&self, path: &str) -> Vec<PendingRequest> {
        let url = format!("{}{}", BASE, path);
        self.sent().into_iter().filter(|r| r.url == url).collect()
    }
}

fn status_error(status: u16, payload: Value) -> TransportError {
    TransportError::Status {
        status,
        payload: Some(payload),
        message: format!("HTTP {}", status),
    }
}

#[async_trait]
impl HttpTransport for FakeBackend {
    async fn send(&self, request: &PendingRequest) -> Result<Response, TransportError> {
        self.sent.lock().unwrap().push(request.clone());

        if request.url == REFRESH_URL {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            while self.unauthorized() < self.hold_refresh_until {
                tokio::task::yield_now().await;
            }
            if let Some(gate) = &self.refresh_gate {
                gate.acquire().await.unwrap().forget();
            }
            return match &self.refresh_reply {
                RefreshReply::Issue(access, refresh) => Ok(Response::json_ok(
                    &json!({"accessToken": access, "refreshToken": refresh}),
                )),
                RefreshReply::Reject(status) => {
                    Err(status_error(*status, json!({"error": "invalid_grant"})))
                }
                RefreshReply::Malformed => Ok(Response::json_ok(&json!({"ok": true}))),
                RefreshReply::NetworkDown => {
                    Err(TransportError::Request("connection refused".to_string()))
                }
                RefreshReply::Hang => std::future::pending().await,
            };
        }

        // Every API call suspends once, like a real network round trip.
        tokio::task::yield_now().await;

        match &self.failure {
            Some(Failure::Status(status)) => {
                return Err(status_error(*status, json!({"message": "boom"})))
            }
            Some(Failure::Network) => {
                return Err(TransportError::Request("connection reset".to_string()))
            }
            None => {}
        }

        if request.bearer_token() == Some(self.valid_token) {
            Ok(Response::json_ok(&json!({
                "url": request.url,
                "token": self.valid_token,
            })))
        } else {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
            Err(status_error(401, json!({"message": "jwt expired"})))
        }
    }
}

/// Store wrapper that counts writes.
#[derive(Default)]
struct CountingStore {
    inner: MemoryCredentialStore,
    sets: AtomicUsize,
    clears: AtomicUsize,
}

impl CountingStore {
    fn signed_in(access: &str, refresh: &str) -> Self {
        let store = Self::default();
        store
            .inner
            .set_credentials(Credentials::new(access, refresh).unwrap());
        store
    }

    fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl CredentialStore for CountingStore {
    fn credentials(&self) -> Option<Credentials> {
        self.inner.credentials()
    }

    fn set_credentials(&self, credentials: Credentials) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set_credentials(credentials);
    }

    fn clear_credentials(&self) -> bool {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear_credentials()
    }
}

fn pipeline(backend: &Arc<FakeBackend>, store: &Arc<CountingStore>) -> AuthPipeline {
    AuthPipeline::new(ClientConfig::new(BASE), backend.clone(), store.clone())
}

fn body(response: &Response) -> Value {
    response.json().unwrap()
}

#[tokio::test]
async fn attaches_bearer_and_returns_body_unchanged() {
    let backend = Arc::new(FakeBackend::new("tok-A"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let response = pipeline.execute(pipeline.get("/api/cart-items")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(
        body(&response),
        json!({"url": "https://api.shop.test/api/cart-items", "token": "tok-A"})
    );
    let sent = backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header_value("Authorization"), Some("Bearer tok-A"));
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(store.sets(), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed() {
    let backend = Arc::new(FakeBackend::new("tok-B"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let response = pipeline.execute(pipeline.get("/api/orders")).await.unwrap();

    assert_eq!(body(&response)["token"], "tok-B");
    assert_eq!(
        store.credentials(),
        Some(Credentials::new("tok-B", "refresh-2").unwrap())
    );

    let sent = backend.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].bearer_token(), Some("tok-A"));

    let refresh = &sent[1];
    assert_eq!(refresh.url, REFRESH_URL);
    assert_eq!(refresh.bearer_token(), None);
    let refresh_body: Value = serde_json::from_slice(refresh.body.as_deref().unwrap()).unwrap();
    assert_eq!(refresh_body, json!({"refreshToken": "refresh-1"}));

    assert_eq!(sent[2].url, sent[0].url);
    assert_eq!(sent[2].bearer_token(), Some("tok-B"));
}

#[tokio::test]
async fn two_concurrent_401s_share_one_refresh() {
    let backend = Arc::new(FakeBackend::new("tok-B").hold_refresh_until(2));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let (r1, r2) = tokio::join!(
        pipeline.execute(pipeline.get("/api/cart-items")),
        pipeline.execute(pipeline.get("/api/orders")),
    );

    assert_eq!(body(&r1.unwrap())["token"], "tok-B");
    assert_eq!(body(&r2.unwrap())["token"], "tok-B");
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.unauthorized(), 2);
    assert_eq!(store.sets(), 1);
}

#[tokio::test]
async fn burst_of_401s_triggers_exactly_one_refresh() {
    const N: usize = 8;
    let backend = Arc::new(FakeBackend::new("tok-B").hold_refresh_until(N));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let paths: Vec<String> = (0..N).map(|i| format!("/api/products/{}", i)).collect();
    let results = join_all(paths.iter().map(|p| pipeline.execute(pipeline.get(p)))).await;

    assert_eq!(backend.refresh_calls(), 1);
    for (path, result) in paths.iter().zip(results) {
        let response = result.unwrap_or_else(|e| panic!("{} failed: {:?}", path, e));
        assert_eq!(body(&response)["token"], "tok-B");

        let attempts = backend.sent_to(path);
        assert_eq!(attempts.len(), 2, "{} should be sent once and replayed once", path);
        assert_eq!(attempts[0].bearer_token(), Some("tok-A"));
        assert_eq!(attempts[1].bearer_token(), Some("tok-B"));
    }
}

#[tokio::test]
async fn failed_refresh_expires_every_caller_and_clears_once() {
    const N: usize = 4;
    let backend = Arc::new(
        FakeBackend::new("tok-B")
            .refresh_reply(RefreshReply::Reject(400))
            .hold_refresh_until(N),
    );
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let mut status = store.inner.subscribe();
    status.borrow_and_update();
    let pipeline = pipeline(&backend, &store);

    let results =
        join_all((0..N).map(|i| pipeline.execute(pipeline.get(&format!("/api/addresses/{}", i)))))
            .await;

    for result in results {
        assert_eq!(result.unwrap_err(), ApiError::SessionExpired);
    }
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(store.clears(), 1);
    assert_eq!(store.credentials(), None);

    assert!(status.has_changed().unwrap());
    assert_eq!(*status.borrow_and_update(), SessionStatus::SignedOut);
    assert!(!status.has_changed().unwrap());

    // Nothing was replayed.
    assert_eq!(backend.sent().len(), N + 1);
}

#[tokio::test]
async fn missing_refresh_token_signs_out_without_refresh_call() {
    let backend = Arc::new(FakeBackend::new("tok-A"));
    let store = Arc::new(CountingStore::default());
    let pipeline = pipeline(&backend, &store);

    let err = pipeline
        .execute(pipeline.get("/api/orders"))
        .await
        .unwrap_err();

    assert!(err.is_session_expired());
    assert_eq!(err.status(), Some(401));
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(store.clears(), 1);
    let sent = backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header_value("Authorization"), None);
}

#[tokio::test]
async fn replayed_401_is_returned_not_refreshed_again() {
    let backend = Arc::new(FakeBackend::new("never-valid"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let err = pipeline
        .execute(pipeline.get("/api/checkout"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Http {
            status: 401,
            payload: json!({"message": "jwt expired"}),
        }
    );
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.sent().len(), 3);
    assert_eq!(store.access_token().as_deref(), Some("tok-B"));
    assert_eq!(store.clears(), 0);
}

#[tokio::test]
async fn non_auth_failure_passes_through_untouched() {
    let backend = Arc::new(FakeBackend::new("tok-A").fail_with(Failure::Status(500)));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let err = pipeline
        .execute(pipeline.post("/api/orders"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.payload(), json!({"message": "boom"}));
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(backend.sent().len(), 1);
    assert_eq!(store.sets(), 0);
    assert_eq!(store.clears(), 0);
    assert_eq!(store.access_token().as_deref(), Some("tok-A"));
}

#[tokio::test]
async fn network_failure_is_a_transport_error() {
    let backend = Arc::new(FakeBackend::new("tok-A").fail_with(Failure::Network));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let err = pipeline
        .execute(pipeline.get("/api/products"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Transport { .. }));
    assert_eq!(err.status(), None);
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(store.clears(), 0);
}

#[tokio::test]
async fn late_401_after_completed_refresh_follows_it() {
    // No hold: the first 401 refreshes and finishes before the second 401
    // is even looked at.
    let backend = Arc::new(FakeBackend::new("tok-B"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let (r1, r2) = tokio::join!(
        pipeline.execute(pipeline.get("/api/cart-items")),
        pipeline.execute(pipeline.get("/api/addresses")),
    );

    assert!(r1.is_ok());
    assert!(r2.is_ok());
    assert_eq!(backend.unauthorized(), 2);
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn requests_issued_during_refresh_wait_for_new_token() {
    let backend = Arc::new(FakeBackend::new("tok-B").gate_refresh());
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let late = async {
        while !pipeline.is_refreshing() {
            tokio::task::yield_now().await;
        }
        let (response, _) = tokio::join!(pipeline.execute(pipeline.get("/api/addresses")), async {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            backend.release_refresh();
        });
        response
    };

    let (first, late) = tokio::join!(pipeline.execute(pipeline.get("/api/orders")), late);

    assert!(first.is_ok());
    assert!(late.is_ok());
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.unauthorized(), 1);

    let attempts = backend.sent_to("/api/addresses");
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].bearer_token(), Some("tok-B"));
}

#[tokio::test(start_paused = true)]
async fn hung_refresh_times_out_and_signs_out() {
    let backend = Arc::new(FakeBackend::new("tok-B").refresh_reply(RefreshReply::Hang));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let err = pipeline
        .execute(pipeline.get("/api/orders"))
        .await
        .unwrap_err();

    assert!(err.is_session_expired());
    assert_eq!(store.credentials(), None);
    assert!(!pipeline.is_refreshing());
}

#[tokio::test]
async fn malformed_or_unreachable_refresh_signs_out() {
    for reply in [RefreshReply::Malformed, RefreshReply::NetworkDown] {
        let backend = Arc::new(FakeBackend::new("tok-B").refresh_reply(reply));
        let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
        let pipeline = pipeline(&backend, &store);

        let err = pipeline
            .execute(pipeline.get("/api/orders"))
            .await
            .unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(backend.refresh_calls(), 1);
        assert_eq!(store.clears(), 1);
        assert_eq!(store.sets(), 0);
    }
}

#[tokio::test]
async fn caller_authorization_header_is_replaced() {
    let backend = Arc::new(FakeBackend::new("tok-A"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let request = pipeline
        .get("/api/products")
        .header("authorization", "Bearer stale-from-cache")
        .header("X-Store", "eu");
    pipeline.execute(request).await.unwrap();

    let sent = &backend.sent()[0];
    let auth_headers: Vec<_> = sent
        .headers
        .keys()
        .filter(|k| k.eq_ignore_ascii_case("authorization"))
        .collect();
    assert_eq!(auth_headers.len(), 1);
    assert_eq!(sent.bearer_token(), Some("tok-A"));
    assert_eq!(sent.header_value("x-store"), Some("eu"));
}

#[tokio::test]
async fn refresh_call_never_carries_default_authorization() {
    let backend = Arc::new(FakeBackend::new("tok-B"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let config = ClientConfig::new(BASE)
        .with_default_header("Authorization", "Bearer static-key")
        .with_default_header("X-Client", "storefront-ios");
    let pipeline = AuthPipeline::new(config, backend.clone(), store.clone());

    let response = pipeline.execute(pipeline.get("/api/orders")).await.unwrap();
    assert_eq!(body(&response)["token"], "tok-B");

    let sent = backend.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].bearer_token(), Some("tok-A"));

    let refresh = &sent[1];
    assert_eq!(refresh.url, REFRESH_URL);
    assert_eq!(refresh.header_value("Authorization"), None);
    assert_eq!(refresh.header_value("X-Client"), Some("storefront-ios"));

    assert_eq!(sent[2].bearer_token(), Some("tok-B"));
}

#[tokio::test]
async fn follower_replays_once_when_refresh_keeps_same_token() {
    // The refresh hands back the token that was just rejected.
    let backend = Arc::new(
        FakeBackend::new("never-valid")
            .refresh_reply(RefreshReply::Issue("tok-A", "refresh-2"))
            .hold_refresh_until(2),
    );
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let (leader, follower) = tokio::join!(
        pipeline.execute(pipeline.get("/api/cart-items")),
        pipeline.execute(pipeline.get("/api/addresses")),
    );

    for result in [leader, follower] {
        assert_eq!(result.unwrap_err().status(), Some(401));
    }
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(store.clears(), 0);
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-2"));

    for path in ["/api/cart-items", "/api/addresses"] {
        let attempts = backend.sent_to(path);
        assert_eq!(attempts.len(), 2, "{} should be replayed exactly once", path);
        assert!(attempts.iter().all(|r| r.bearer_token() == Some("tok-A")));
    }
}

#[tokio::test]
async fn execute_json_decodes_success_body() {
    #[derive(serde::Deserialize)]
    struct Echo {
        url: String,
        token: String,
    }

    #[derive(Debug, serde::Deserialize)]
    struct CartItems {
        #[allow(dead_code)]
        items: Vec<HashMap<String, Value>>,
    }

    let backend = Arc::new(FakeBackend::new("tok-A"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = pipeline(&backend, &store);

    let echo: Echo = pipeline
        .execute_json(pipeline.get("/api/cart-items"))
        .await
        .unwrap();
    assert_eq!(echo.url, "https://api.shop.test/api/cart-items");
    assert_eq!(echo.token, "tok-A");

    let err = pipeline
        .execute_json::<CartItems>(pipeline.get("/api/cart-items"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_requests_refresh_once_on_a_thread_pool() {
    const N: usize = 16;
    let backend = Arc::new(FakeBackend::new("tok-B"));
    let store = Arc::new(CountingStore::signed_in("tok-A", "refresh-1"));
    let pipeline = Arc::new(pipeline(&backend, &store));

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .execute(pipeline.get(&format!("/api/products/{}", i)))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(body(&response)["token"], "tok-B");
    }
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(store.sets(), 1);
    assert_eq!(store.clears(), 0);
}
