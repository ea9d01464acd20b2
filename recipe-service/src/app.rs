use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use common_http_errors::ApiError;

use crate::auth_handlers::{refresh_token, session_sign_in, sign_in, sign_out};
use crate::credentials::PasswordAuthenticator;
use crate::gate::{require_credentials, CredentialVerifier, GateState};
use crate::metrics::ServiceMetrics;
use crate::recipe_handlers::{
    create_recipe, delete_recipe, list_recipes, search_recipes, update_recipe,
};
use crate::repository::RecipeRepository;
use crate::sessions::SessionManager;
use crate::tokens::TokenIssuer;

/// Everything a request needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub repository: RecipeRepository,
    pub authenticator: PasswordAuthenticator,
    pub token_issuer: Arc<TokenIssuer>,
    pub sessions: Arc<SessionManager>,
    pub gate: CredentialVerifier,
    pub metrics: ServiceMetrics,
}

impl FromRef<AppState> for RecipeRepository {
    fn from_ref(state: &AppState) -> Self {
        state.repository.clone()
    }
}

impl FromRef<AppState> for ServiceMetrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(metrics): State<ServiceMetrics>) -> Response {
    match metrics.render() {
        Ok(resp) => resp,
        Err(err) => ApiError::internal(err).into_response(),
    }
}

pub fn build_router(state: AppState) -> Router {
    let gate = middleware::from_fn_with_state(
        GateState {
            verifier: state.gate.clone(),
            metrics: state.metrics.clone(),
        },
        require_credentials,
    );

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route(
            "/recipes",
            get(list_recipes).merge(post(create_recipe).route_layer(gate.clone())),
        )
        .route("/recipes/search", get(search_recipes))
        .route(
            "/recipes/:id",
            put(update_recipe).delete(delete_recipe).route_layer(gate),
        )
        .route("/signin", post(sign_in))
        .route("/refresh", post(refresh_token))
        .route("/session/signin", post(session_sign_in))
        .route("/signout", post(sign_out))
        .with_state(state)
}
