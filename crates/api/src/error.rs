//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{ErrorKind, MarketError};
use store::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// No caller identity was presented.
    Unauthorized(String),
    /// The caller is not the buyer or vendor the route acts for.
    Forbidden(String),
    /// Marketplace rule or storage error.
    Market(MarketError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Market(err) => market_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn market_error_to_response(err: MarketError) -> (StatusCode, String) {
    match err.kind() {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::Conflict => (StatusCode::CONFLICT, err.to_string()),
        ErrorKind::Invalid => (StatusCode::BAD_REQUEST, err.to_string()),
        ErrorKind::Internal => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        ApiError::Market(err)
    }
}

/// Failures while bringing the server up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to prepare store: {0}")]
    Store(#[from] StoreError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ItemId;
    use domain::{ConflictReason, NotFound};

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_market_errors_map_by_kind() {
        assert_eq!(
            status_of(MarketError::from(NotFound::Item(ItemId::new())).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(MarketError::from(ConflictReason::AmountMismatch).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(MarketError::Invalid("quantity must be greater than 0".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(MarketError::Timeout { operation: "get_item" }.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_identity_errors() {
        assert_eq!(
            status_of(ApiError::Unauthorized("missing".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("not yours".into())),
            StatusCode::FORBIDDEN
        );
    }
}
