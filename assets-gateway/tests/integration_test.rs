//! Integration tests for the assets gateway.
//!
//! Exercises the full router: middleware ordering, kind resolution,
//! adapter delegation, and envelope normalization, with mock adapters
//! and a fake identity provider behind the crate's own traits.

use assets_gateway::routes::{CreateAssetResponse, ErrorEnvelope, ListChildrenResponse};
use assets_gateway::{
    build_router, AppState, AssetMetadata, AuthGate, BearerGate, CallerIdentity, CookieGate,
    InMemoryTokenCache, LocalGate, StoreAdapter, StoreError, StoreRegistry, TokenVerifier,
    VerifiedIdentity,
};
use assets_gateway::auth::AuthError;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

// ─────────────────────────────────────────────────────────────────────────────
// Test doubles
// ─────────────────────────────────────────────────────────────────────────────

/// Adapter double recording calls and returning canned results.
struct MockAdapter {
    kind: &'static str,
    fail_with: Option<StoreError>,
    fetch_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    created_payloads: Mutex<Vec<Value>>,
}

impl MockAdapter {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            fail_with: None,
            fetch_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            created_payloads: Mutex::new(Vec::new()),
        }
    }

    fn failing(kind: &'static str, err: StoreError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::new(kind)
        }
    }

    fn metadata(&self, raw_id: &str) -> AssetMetadata {
        AssetMetadata {
            asset_id: assets_gateway::store::asset_id_of(raw_id),
            raw_id: raw_id.to_string(),
            kind: self.kind.to_string(),
            name: format!("mock-{raw_id}"),
            owner_group: None,
            content_url: None,
        }
    }
}

#[async_trait]
impl StoreAdapter for MockAdapter {
    fn kind(&self) -> &str {
        self.kind
    }

    async fn fetch(&self, raw_id: &str) -> Result<AssetMetadata, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(self.metadata(raw_id)),
        }
    }

    async fn create(&self, _parent_id: &str, payload: &Value) -> Result<String, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.created_payloads.lock().unwrap().push(payload.clone());
        Ok("raw-123".into())
    }

    async fn update(&self, _raw_id: &str, _payload: &Value) -> Result<(), StoreError> {
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn delete(&self, _raw_id: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn list_children(&self, _parent_id: &str) -> Result<Vec<AssetMetadata>, StoreError> {
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(vec![self.metadata("child-1"), self.metadata("child-2")]),
        }
    }
}

/// Identity-provider double with a call counter.
struct FakeVerifier {
    result: Result<(), AuthError>,
    calls: AtomicUsize,
}

impl FakeVerifier {
    fn ok() -> Self {
        Self {
            result: Ok(()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(err: AuthError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, _token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map(|_| VerifiedIdentity {
            identity: CallerIdentity {
                user_id: "alice".into(),
                groups: vec!["lab".into()],
                is_admin: false,
            },
            expires_in: Some(3600),
        })
    }
}

/// Gate double counting invocations; always rejects.
struct RejectingGate {
    calls: AtomicUsize,
}

impl RejectingGate {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AuthGate for RejectingGate {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<CallerIdentity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::Unauthenticated("rejected".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn app(adapters: Vec<Arc<dyn StoreAdapter>>, gate: Arc<dyn AuthGate>) -> axum::Router {
    let mut registry = StoreRegistry::new();
    for adapter in adapters {
        registry.register(adapter).unwrap();
    }
    build_router(AppState {
        gate,
        registry: Arc::new(registry),
    })
}

fn cookie_gate(verifier: Arc<FakeVerifier>) -> Arc<dyn AuthGate> {
    Arc::new(CookieGate::new(
        "gw_session",
        verifier,
        Arc::new(InMemoryTokenCache::new()),
        Duration::from_secs(60),
    ))
}

async fn request_json<T: serde::de::DeserializeOwned>(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    cookie: Option<&str>,
) -> (StatusCode, T) {
    let mut request = Request::builder().method(method).uri(uri);

    if let Some(c) = cookie {
        request = request.header(header::COOKIE, c);
    }

    let request = if let Some(b) = body {
        request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap()
    } else {
        request.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: T = serde_json::from_slice(&body).unwrap();

    (status, json)
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage ordering
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_never_invokes_gate() {
    let gate = Arc::new(RejectingGate::new());
    let app = app(vec![Arc::new(MockAdapter::new("data"))], gate.clone());

    // malformed credentials present; the path check must win
    let request = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .header(header::AUTHORIZATION, "Bearer ???")
        .header(header::COOKIE, "gw_session=garbage")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(gate.calls.load(Ordering::SeqCst), 0);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "assets-gateway");
    assert_eq!(json["kinds"], json!(["data"]));
}

#[tokio::test]
async fn test_asset_named_like_health_route_stays_authenticated() {
    // the bypass is for the exact health path; a raw id of "healthz"
    // inside an asset route must still go through the gate
    let adapter = Arc::new(MockAdapter::new("story"));
    let gate = Arc::new(RejectingGate::new());
    let app = app(vec![adapter.clone()], gate.clone());

    let (status, envelope): (_, ErrorEnvelope) =
        request_json(&app, Method::DELETE, "/assets/story/healthz", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(envelope.category, "unauthenticated");
    assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_protected_path_requires_credential() {
    let gate = Arc::new(RejectingGate::new());
    let app = app(vec![Arc::new(MockAdapter::new("data"))], gate.clone());

    let (status, envelope): (_, ErrorEnvelope) =
        request_json(&app, Method::GET, "/assets/data/abc", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(envelope.category, "unauthenticated");
    assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Kind resolution
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_kind_is_404() {
    let app = app(
        vec![Arc::new(MockAdapter::new("package"))],
        Arc::new(LocalGate::new()),
    );

    let (status, envelope): (_, ErrorEnvelope) =
        request_json(&app, Method::GET, "/assets/widget/abc", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(envelope.category, "unknown_kind");

    // the registered kind still resolves
    let (status, metadata): (_, AssetMetadata) =
        request_json(&app, Method::GET, "/assets/package/abc", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metadata.kind, "package");
    assert_eq!(metadata.raw_id, "abc");
}

// ─────────────────────────────────────────────────────────────────────────────
// End-to-end scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_data_asset_with_valid_cookie() {
    let adapter = Arc::new(MockAdapter::new("data"));
    let verifier = Arc::new(FakeVerifier::ok());
    let app = app(vec![adapter.clone()], cookie_gate(verifier));

    let (status, response): (_, CreateAssetResponse) = request_json(
        &app,
        Method::POST,
        "/assets/data",
        Some(json!({
            "parentId": "folder-1",
            "payload": {"name": "foo"}
        })),
        Some("gw_session=valid-token"),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.raw_id, "raw-123");
    assert_eq!(adapter.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *adapter.created_payloads.lock().unwrap(),
        vec![json!({"name": "foo"})]
    );
}

#[tokio::test]
async fn test_unreachable_provider_is_503_not_401() {
    let adapter = Arc::new(MockAdapter::new("flux-project"));
    let verifier = Arc::new(FakeVerifier::failing(AuthError::ProviderUnavailable(
        "connection refused".into(),
    )));
    let app = app(vec![adapter.clone()], cookie_gate(verifier));

    // expired token, not cached: the gate must go to the provider
    let (status, envelope): (_, ErrorEnvelope) = request_json(
        &app,
        Method::GET,
        "/assets/flux-project/abc123",
        None,
        Some("gw_session=expired-token"),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(envelope.category, "identity_provider_unavailable");
    assert_eq!(adapter.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_token_is_401() {
    let verifier = Arc::new(FakeVerifier::failing(AuthError::Unauthenticated(
        "token rejected".into(),
    )));
    let app = app(
        vec![Arc::new(MockAdapter::new("flux-project"))],
        cookie_gate(verifier),
    );

    let (status, envelope): (_, ErrorEnvelope) = request_json(
        &app,
        Method::GET,
        "/assets/flux-project/abc123",
        None,
        Some("gw_session=bad-token"),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(envelope.category, "unauthenticated");
}

#[tokio::test]
async fn test_delete_story_backend_404_propagates() {
    let adapter = Arc::new(MockAdapter::failing(
        "story",
        StoreError::NotFound("xyz".into()),
    ));
    let app = app(vec![adapter], Arc::new(LocalGate::new()));

    let (status, envelope): (_, ErrorEnvelope) =
        request_json(&app, Method::DELETE, "/assets/story/xyz", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(envelope.category, "not_found");
    assert!(envelope.message.contains("story/xyz"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Gate caching behavior through the router
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cookie_token_validated_once_then_cached() {
    let verifier = Arc::new(FakeVerifier::ok());
    let app = app(
        vec![Arc::new(MockAdapter::new("data"))],
        cookie_gate(verifier.clone()),
    );

    for _ in 0..3 {
        let (status, _): (_, AssetMetadata) = request_json(
            &app,
            Method::GET,
            "/assets/data/abc",
            None,
            Some("gw_session=same-token"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(verifier.calls(), 1);
}

#[tokio::test]
async fn test_bearer_token_revalidated_every_request() {
    let verifier = Arc::new(FakeVerifier::ok());
    let app = app(
        vec![Arc::new(MockAdapter::new("data"))],
        Arc::new(BearerGate::new(verifier.clone())),
    );

    for i in 0..2 {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/assets/data/abc")
            .header(header::AUTHORIZATION, "Bearer same-token")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {i}");
    }

    assert_eq!(verifier.calls(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Remaining operations and envelope discipline
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_returns_no_content() {
    let app = app(
        vec![Arc::new(MockAdapter::new("story"))],
        Arc::new(LocalGate::new()),
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/assets/story/s-1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title": "renamed"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_list_children() {
    let app = app(
        vec![Arc::new(MockAdapter::new("package"))],
        Arc::new(LocalGate::new()),
    );

    let (status, response): (_, ListChildrenResponse) = request_json(
        &app,
        Method::GET,
        "/assets/package?parent=folder-9",
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.assets.len(), 2);
    assert_eq!(response.assets[0].raw_id, "child-1");
}

#[tokio::test]
async fn test_list_without_parent_is_validation_error() {
    let app = app(
        vec![Arc::new(MockAdapter::new("package"))],
        Arc::new(LocalGate::new()),
    );

    let (status, envelope): (_, ErrorEnvelope) =
        request_json(&app, Method::GET, "/assets/package", None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope.category, "validation_error");
}

#[tokio::test]
async fn test_backend_rejection_never_leaks_body() {
    let adapter = Arc::new(MockAdapter::failing(
        "data",
        StoreError::Rejected {
            status: 422,
            body: "docdb node scylla-3 rejected keyspace assets_v2".into(),
        },
    ));
    let app = app(vec![adapter], Arc::new(LocalGate::new()));

    let (status, envelope): (_, ErrorEnvelope) = request_json(
        &app,
        Method::POST,
        "/assets/data",
        Some(json!({"parentId": "folder-1", "payload": {"name": "foo"}})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope.category, "validation_error");
    assert!(!envelope.message.contains("scylla-3"));
    assert!(!envelope.message.contains("assets_v2"));
}

#[tokio::test]
async fn test_upstream_error_never_leaks_backend_body() {
    let adapter = Arc::new(MockAdapter::failing(
        "data",
        StoreError::Upstream {
            status: Some(500),
            message: "scylla node 10.0.3.7 keyspace assets down".into(),
        },
    ));
    let app = app(vec![adapter], Arc::new(LocalGate::new()));

    let (status, envelope): (_, ErrorEnvelope) =
        request_json(&app, Method::GET, "/assets/data/abc", None, None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(envelope.category, "upstream_error");
    assert!(!envelope.message.contains("scylla"));
    assert!(!envelope.message.contains("10.0.3.7"));
    assert!(envelope.correlation.is_some());
}
