//! Error types for encore-ls

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use encore_common::votes::{ApiErrorBody, ApiErrorDetail};
use encore_common::VoteRejection;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// No voter identity on the request (401)
    #[error("Sign in or continue anonymously to vote")]
    Unauthenticated,

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Vote refused by ledger policy (404/409/429)
    #[error("{0}")]
    Rejected(VoteRejection),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<encore_common::Error> for ApiError {
    fn from(err: encore_common::Error) -> Self {
        match err {
            encore_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            encore_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            encore_common::Error::Rejected(rejection) => ApiError::Rejected(rejection),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Rejected(rejection) => {
                let status = match rejection {
                    VoteRejection::AlreadyVoted => StatusCode::CONFLICT,
                    VoteRejection::ShowLimitReached | VoteRejection::DailyLimitReached => {
                        StatusCode::TOO_MANY_REQUESTS
                    }
                    VoteRejection::NotFound => StatusCode::NOT_FOUND,
                };
                (status, rejection.code())
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ApiErrorBody {
            error: ApiErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        });

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
