//! Error types for the coderun server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coderun_core::StoreError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error while binding or serving.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Host/port pair that does not parse as a socket address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// File store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Store(StoreError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            ServerError::Store(StoreError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Store(StoreError::Io(_))
            | ServerError::Io(_)
            | ServerError::InvalidAddress(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_status_mapping() {
        let cases = [
            (StoreError::NotFound("a.py".into()), StatusCode::NOT_FOUND),
            (
                StoreError::TooLarge {
                    size: 10,
                    limit: 5,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                StoreError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let err = ServerError::from(std::io::Error::other("bind failed"));
        assert_eq!(err.to_string(), "IO error: bind failed");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
