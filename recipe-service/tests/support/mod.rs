#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use recipe_service::cache::InMemoryCache;
use recipe_service::credentials::{InMemoryCredentialStore, PasswordAuthenticator};
use recipe_service::gate::CredentialVerifier;
use recipe_service::metrics::ServiceMetrics;
use recipe_service::repository::RecipeRepository;
use recipe_service::sessions::{InMemorySessionBackend, SessionConfig, SessionManager};
use recipe_service::store::InMemoryRecipeStore;
use recipe_service::tokens::{TokenConfig, TokenIssuer};
use recipe_service::{build_router, AppState};
use serde_json::Value;
use tower::util::ServiceExt;

pub const ALICE: &str = "alice";
pub const ALICE_PASSWORD: &str = "wonderland";

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryRecipeStore,
    pub cache: InMemoryCache,
    pub session_backend: InMemorySessionBackend,
    pub issuer: Arc<TokenIssuer>,
    pub metrics: ServiceMetrics,
}

impl TestApp {
    /// App whose gate is chosen by `gate` from the freshly built issuer and session manager.
    pub fn with_gate<F>(gate: F) -> Self
    where
        F: FnOnce(Arc<TokenIssuer>, Arc<SessionManager>) -> CredentialVerifier,
    {
        let store = InMemoryRecipeStore::new();
        let cache = InMemoryCache::new();
        let session_backend = InMemorySessionBackend::new();
        let metrics = ServiceMetrics::new().expect("metrics");

        let credentials = InMemoryCredentialStore::new()
            .with_user(ALICE, ALICE_PASSWORD)
            .expect("hash password");
        let issuer = Arc::new(TokenIssuer::new(TokenConfig::new("integration-secret")).expect("issuer"));
        let sessions = Arc::new(SessionManager::new(
            Arc::new(session_backend.clone()),
            SessionConfig::default(),
        ));

        let state = AppState {
            repository: RecipeRepository::new(
                Arc::new(store.clone()),
                Arc::new(cache.clone()),
                metrics.clone(),
            ),
            authenticator: PasswordAuthenticator::new(Arc::new(credentials)),
            token_issuer: issuer.clone(),
            sessions: sessions.clone(),
            gate: gate(issuer.clone(), sessions),
            metrics: metrics.clone(),
        };

        Self {
            router: build_router(state),
            store,
            cache,
            session_backend,
            issuer,
            metrics,
        }
    }

    pub fn jwt() -> Self {
        Self::with_gate(|issuer, _| CredentialVerifier::Bearer(issuer))
    }

    pub fn session() -> Self {
        Self::with_gate(|_, sessions| CredentialVerifier::Session(sessions))
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("router response")
    }
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn with_header(mut req: Request<Body>, name: header::HeaderName, value: &str) -> Request<Body> {
    req.headers_mut()
        .insert(name, value.parse().expect("header value"));
    req
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// `name=value` part of a `Set-Cookie` header.
pub fn cookie_pair(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("set-cookie")
        .to_string()
}
