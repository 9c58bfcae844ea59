//! Errors raised at the crate's outer boundaries.
//!
//! The payoff engine itself never fails; these cover request validation,
//! solver configuration and snapshot loading.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A request or CLI field was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The goal solver was given unusable bounds.
    #[error("invalid solve config: {0}")]
    InvalidSolveConfig(String),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::InvalidSolveConfig(_) => StatusCode::BAD_REQUEST,
            Self::Snapshot(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PlanError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = PlanError::InvalidInput("extraBudget must be >= 0".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "invalid input: extraBudget must be >= 0");
    }

    #[test]
    fn snapshot_errors_map_to_server_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PlanError::from(parse);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("snapshot error:"));
    }
}
