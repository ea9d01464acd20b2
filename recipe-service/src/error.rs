use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure taxonomy shared by the repository and the authentication components.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("recipe not found")]
    NotFound,
    #[error("missing or invalid credentials")]
    Unauthenticated,
    #[error("token has expired")]
    Expired,
    #[error("token is not close enough to expiry to be refreshed")]
    TooEarly,
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn backend(err: anyhow::Error) -> Self {
        Self::BackendUnavailable(format!("{err:#}"))
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::NotFound => ApiError::NotFound {
                code: "recipe_not_found",
            },
            ServiceError::Unauthenticated => ApiError::unauthorized("unauthenticated"),
            ServiceError::Expired => ApiError::Unauthorized {
                code: "token_expired",
                message: Some(value.to_string()),
            },
            ServiceError::TooEarly => ApiError::BadRequest {
                code: "token_not_expired",
                message: Some("Token is not expired yet".to_string()),
            },
            ServiceError::BackendUnavailable(ref detail) | ServiceError::Internal(ref detail) => {
                error!(error = %detail, "Request failed");
                ApiError::Internal { message: None }
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
