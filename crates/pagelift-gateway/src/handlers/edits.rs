//! POST /v1/images/edits - crop the page out of each uploaded image
//!
//! Multipart form fields:
//!
//! | Field | Default | Notes |
//! |-------|---------|-------|
//! | `image` / `image[]` | *(required)* | One or more files, processed in upload order. |
//! | `prompt` | `page.` | Passed to the extractor. |
//! | `response_format` | `b64_json` | The only supported value. |
//!
//! `image[]` parts are read only when the form has no `image` part.
//! Any other field (`model`, `n`, `size`, ...) is accepted and ignored so that
//! stock OpenAI clients work unchanged.

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::HeaderMap,
};
use pagelift_foundation::pipeline::{EditRequest, EditResponse, ResponseFormat};
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::state::AppState;

/// POST /v1/images/edits
pub async fn create_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> GatewayResult<Json<EditResponse>> {
    if state.log_request_headers {
        debug!(?headers, "edit request headers");
    }

    let mut multipart = multipart.map_err(|rejection| GatewayError::InvalidForm {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;

    let mut images = Vec::new();
    let mut array_images = Vec::new();
    let mut prompt = None;
    let mut response_format = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let Some(name) = field.name().map(str::to_string) else {
            debug!(field = "<unnamed>", "ignoring form field");
            continue;
        };
        match name.as_str() {
            "image" => images.push(field.bytes().await.map_err(invalid_form)?.to_vec()),
            "image[]" => array_images.push(field.bytes().await.map_err(invalid_form)?.to_vec()),
            "prompt" => prompt = Some(field.text().await.map_err(invalid_form)?),
            "response_format" => {
                response_format = Some(field.text().await.map_err(invalid_form)?)
            }
            other => debug!(field = other, "ignoring form field"),
        }
    }

    if images.is_empty() {
        images = array_images;
    }
    debug!(images = images.len(), "edit request received");

    let request = EditRequest {
        images,
        prompt: prompt.unwrap_or_else(|| state.default_prompt.to_string()),
        response_format: response_format
            .unwrap_or_else(|| ResponseFormat::default().to_string()),
    };

    let response = state.pipeline.run(request).await?;
    Ok(Json(response))
}

fn invalid_form(err: MultipartError) -> GatewayError {
    GatewayError::InvalidForm {
        status: err.status(),
        message: format!("Invalid multipart body: {}", err.body_text()),
    }
}

/// Build the edits router sub-tree
pub fn edits_router() -> axum::Router<AppState> {
    use axum::routing::post;
    axum::Router::new().route("/v1/images/edits", post(create_edit))
}
