//! Proxy failures mapped to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Symbol is required")]
    MissingSymbol,

    /// Exchange answered with a non-success status; relayed as is.
    #[error("Failed to fetch {resource} from Backpack Exchange")]
    Upstream {
        resource: &'static str,
        status: StatusCode,
    },

    /// Exchange unreachable or its body undecodable.
    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::MissingSymbol => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { resource, status } => {
                tracing::warn!(resource, status = %status, "Upstream request failed");
                *status
            }
            ProxyError::Internal(detail) => {
                // Details stay in the log
                tracing::error!(error = %detail, "Proxy request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        let upstream = ProxyError::Upstream {
            resource: "ticker",
            status: StatusCode::TOO_MANY_REQUESTS,
        };
        assert_eq!(upstream.to_string(), "Failed to fetch ticker from Backpack Exchange");
        assert_eq!(upstream.into_response().status(), StatusCode::TOO_MANY_REQUESTS);

        let internal = ProxyError::Internal("connection refused".to_string());
        assert_eq!(internal.to_string(), "Internal server error");
        assert_eq!(internal.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ProxyError::MissingSymbol.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
