use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

/// Error envelope shared by every handler: JSON `{code, message?}` plus an `X-Error-Code` header.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized { code: &'static str, message: Option<String> },
    Forbidden { code: &'static str, message: Option<String> },
    BadRequest { code: &'static str, message: Option<String> },
    NotFound { code: &'static str },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str) -> Self { Self::BadRequest { code, message: None } }
    pub fn unauthorized(code: &'static str) -> Self { Self::Unauthorized { code, message: None } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (body, error_code) = match self {
            ApiError::Unauthorized { code, message }
            | ApiError::Forbidden { code, message }
            | ApiError::BadRequest { code, message } => (
                ErrorBody { code: code.into(), message },
                code
            ),
            ApiError::NotFound { code } => (
                ErrorBody { code: code.into(), message: None },
                code
            ),
            ApiError::Internal { message } => (
                ErrorBody { code: "internal_error".into(), message },
                "internal_error"
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
