//! Gateway error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pagelift_foundation::pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Gateway-level errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request body could not be read as a multipart form.
    #[error("{message}")]
    InvalidForm { status: StatusCode, message: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidForm { status, .. } => *status,
            GatewayError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            GatewayError::Pipeline(
                PipelineError::ResourceLoadFailure(_) | PipelineError::ShuttingDown,
            ) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Client errors carry their own message; server-side detail is logged
        // and replaced with a generic one.
        let detail = match &self {
            GatewayError::InvalidForm { message, .. } => {
                warn!(
                    status = status.as_u16(),
                    detail = %message,
                    "rejected edit request"
                );
                message.clone()
            }
            GatewayError::Pipeline(e) if e.is_client_error() => {
                warn!(status = status.as_u16(), detail = %e, "rejected edit request");
                e.to_string()
            }
            GatewayError::Pipeline(e) => {
                error!(
                    status = status.as_u16(),
                    error = %e,
                    source = ?std::error::Error::source(e),
                    "edit request failed"
                );
                match e {
                    PipelineError::ResourceLoadFailure(_) => "Model unavailable".to_string(),
                    PipelineError::ShuttingDown => "Service is shutting down".to_string(),
                    _ => "Internal server error".to_string(),
                }
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
