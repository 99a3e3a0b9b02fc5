use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use core_auth::{AuthError, FailureReason};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Failed to bind to address: {0}")]
    Bind(String),

    #[error("Server error: {0}")]
    Serve(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// JSON body of every failed login or token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ServiceError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ServiceError::Auth(e) => e.reason(),
            ServiceError::Library(_) => FailureReason::Storage,
            _ => FailureReason::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.reason())
    }
}

/// HTTP status for a failure reason.
pub fn status_for(reason: FailureReason) -> StatusCode {
    match reason {
        FailureReason::ProviderUnknown
        | FailureReason::ProviderDisabled
        | FailureReason::UnsupportedProvider => StatusCode::NOT_FOUND,
        FailureReason::MissingToken => StatusCode::BAD_REQUEST,
        FailureReason::ProfileFetchFailed
        | FailureReason::AudienceMismatch
        | FailureReason::NotAuthenticated => StatusCode::UNAUTHORIZED,
        FailureReason::Storage | FailureReason::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let reason = self.reason();
        let status = status_for(reason);

        // Server-side details stay in the log.
        let message = if status.is_server_error() {
            error!(error = %self, code = reason.code(), "Request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            code: reason.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
