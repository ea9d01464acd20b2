use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_auth::{bearer_token, JwtVerifier};
use common_http_errors::ApiError;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::metrics::ServiceMetrics;
use crate::sessions::SessionManager;
use crate::tokens::TokenIssuer;

/// The identity-proving strategy guarding mutating routes.
#[derive(Clone)]
pub enum CredentialVerifier {
    Bearer(Arc<TokenIssuer>),
    Session(Arc<SessionManager>),
    External(Arc<JwtVerifier>),
}

impl CredentialVerifier {
    pub fn name(&self) -> &'static str {
        match self {
            CredentialVerifier::Bearer(_) => "jwt",
            CredentialVerifier::Session(_) => "session",
            CredentialVerifier::External(_) => "external",
        }
    }

    /// Succeeds when the request carries a credential this strategy accepts.
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        match self {
            CredentialVerifier::Bearer(issuer) => {
                let token = bearer_token(headers)
                    .map_err(|_| ApiError::from(ServiceError::Unauthenticated))?;
                issuer.validate(&token)?;
                Ok(())
            }
            CredentialVerifier::Session(sessions) => {
                let session_id = sessions.session_id(headers).ok_or_else(not_logged_in)?;
                if sessions.is_authenticated(&session_id).await? {
                    Ok(())
                } else {
                    Err(not_logged_in())
                }
            }
            CredentialVerifier::External(verifier) => {
                let token = bearer_token(headers)
                    .map_err(|_| ApiError::from(ServiceError::Unauthenticated))?;
                verifier.verify_on_demand(&token).await.map_err(|err| {
                    if err.is_credential_failure() {
                        debug!(error = %err, "Rejected external token");
                    } else {
                        warn!(error = %err, "Issuer keys unavailable");
                    }
                    ApiError::from(ServiceError::Unauthenticated)
                })?;
                Ok(())
            }
        }
    }
}

fn not_logged_in() -> ApiError {
    ApiError::Forbidden {
        code: "not_logged_in",
        message: Some("Not logged in".to_string()),
    }
}

#[derive(Clone)]
pub struct GateState {
    pub verifier: CredentialVerifier,
    pub metrics: ServiceMetrics,
}

/// Rejects the request before it reaches the handler unless the configured strategy accepts it.
pub async fn require_credentials(
    State(gate): State<GateState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let outcome = gate.verifier.authorize(req.headers()).await;
    match outcome {
        Ok(()) => next.run(req).await,
        Err(err) => {
            gate.metrics.gate_rejected(gate.verifier.name());
            err.into_response()
        }
    }
}
