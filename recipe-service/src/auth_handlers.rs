use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use common_auth::bearer_token;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppState;
use crate::credentials::VerifiedIdentity;
use crate::error::ServiceError;
use crate::recipe_handlers::MessageResponse;
use crate::tokens::IssuedToken;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            expires: issued.expires_at,
        }
    }
}

async fn authenticate(
    state: &AppState,
    method: &'static str,
    req: &SignInRequest,
) -> ApiResult<VerifiedIdentity> {
    match state
        .authenticator
        .verify(req.username.trim(), &req.password)
        .await
    {
        Ok(identity) => {
            state.metrics.sign_in(method, "success");
            Ok(identity)
        }
        Err(ServiceError::Unauthenticated) => {
            state.metrics.sign_in(method, "invalid_credentials");
            Err(ApiError::unauthorized("invalid_credentials"))
        }
        Err(err) => {
            state.metrics.sign_in(method, "error");
            Err(err.into())
        }
    }
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let identity = authenticate(&state, "jwt", &req).await?;
    let issued = state.token_issuer.issue(&identity)?;
    info!(username = %identity.username, "Issued bearer token");
    Ok(Json(issued.into()))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenResponse>> {
    let token = bearer_token(&headers).map_err(|_| ApiError::from(ServiceError::Unauthenticated))?;
    let issued = state.token_issuer.refresh(&token)?;
    Ok(Json(issued.into()))
}

pub async fn session_sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    let identity = authenticate(&state, "session", &req).await?;
    let previous = state.sessions.session_id(&headers);
    let issued = state
        .sessions
        .sign_in(&identity, previous.as_deref())
        .await?;
    Ok((
        [(header::SET_COOKIE, issued.cookie)],
        Json(MessageResponse {
            message: "User signed in",
        }),
    ))
}

pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let session_id = state.sessions.session_id(&headers);
    let cookie = state.sessions.sign_out(session_id.as_deref()).await?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Signed out...",
        }),
    ))
}
