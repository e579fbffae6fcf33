use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use image::{DynamicImage, ImageError};
use pagelift_kernel::{ExtractError, LoadError};
use thiserror::Error;
use tracing::{debug, info};

use super::codec::{decode_image, encode_png, to_base64};
use super::types::{EditRequest, EditResponse, EditedImage, ResponseFormat};
use crate::lifecycle::{GateError, LifecycleGate, ResourceLease};

/// Why an edit request failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("Invalid response_format, only b64_json is supported (got '{0}')")]
    InvalidResponseFormat(String),

    #[error("No image provided")]
    NoImageProvided,

    #[error("Invalid image file (image {index})")]
    ImageDecodeFailure {
        index: usize,
        #[source]
        source: ImageError,
    },

    #[error("model could not be loaded: {0}")]
    ResourceLoadFailure(#[source] LoadError),

    #[error("page extraction failed for image {index}")]
    ExtractionFailure {
        index: usize,
        #[source]
        source: ExtractError,
    },

    #[error("failed to encode cropped image {index} as PNG")]
    ImageEncodeFailure {
        index: usize,
        #[source]
        source: ImageError,
    },

    #[error("service is shutting down")]
    ShuttingDown,

    #[error("worker task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    /// True for errors caused by the request itself (reported as 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidResponseFormat(_)
                | PipelineError::NoImageProvided
                | PipelineError::ImageDecodeFailure { .. }
        )
    }
}

impl From<GateError> for PipelineError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Load(e) => PipelineError::ResourceLoadFailure(e),
            GateError::Closed => PipelineError::ShuttingDown,
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::TaskFailed(err.to_string())
    }
}

/// Crops every image of a request through the gated extraction model.
#[derive(Debug, Clone)]
pub struct EditPipeline {
    gate: LifecycleGate,
}

impl EditPipeline {
    pub fn new(gate: LifecycleGate) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &LifecycleGate {
        &self.gate
    }

    /// Run the request. All-or-nothing: any failing image fails the request.
    pub async fn run(&self, request: EditRequest) -> Result<EditResponse, PipelineError> {
        let EditRequest {
            images,
            prompt,
            response_format,
        } = request;

        // An empty upload is reported as such whatever else the form says.
        if images.is_empty() {
            return Err(PipelineError::NoImageProvided);
        }
        let _format: ResponseFormat = response_format
            .parse()
            .map_err(PipelineError::InvalidResponseFormat)?;

        let decoded = tokio::task::spawn_blocking(move || decode_all(&images)).await??;
        let prompt: Arc<str> = Arc::from(prompt);
        let count = decoded.len();

        let mut data = Vec::with_capacity(count);
        for (index, image) in decoded.into_iter().enumerate() {
            let lease = self.gate.acquire().await?;
            let prompt = Arc::clone(&prompt);
            // The lease moves into the blocking task, so the extraction holds
            // the resource until it finishes even if this request is dropped.
            let b64_json = tokio::task::spawn_blocking(move || {
                crop_and_encode(lease, &image, &prompt, index)
            })
            .await??;
            data.push(EditedImage { b64_json });
        }

        info!(images = count, prompt = %prompt, "edit request completed");
        Ok(EditResponse {
            created: unix_now(),
            data,
        })
    }
}

fn decode_all(images: &[Vec<u8>]) -> Result<Vec<DynamicImage>, PipelineError> {
    images
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            decode_image(bytes)
                .map_err(|source| PipelineError::ImageDecodeFailure { index, source })
        })
        .collect()
}

fn crop_and_encode(
    lease: ResourceLease,
    image: &DynamicImage,
    prompt: &str,
    index: usize,
) -> Result<String, PipelineError> {
    let extraction = lease
        .extract_page(image, prompt)
        .map_err(|source| PipelineError::ExtractionFailure { index, source })?;
    drop(lease);

    debug!(
        index,
        score = extraction.score,
        width = extraction.cropped.width(),
        height = extraction.cropped.height(),
        "page extracted"
    );

    let png = encode_png(&extraction.cropped)
        .map_err(|source| PipelineError::ImageEncodeFailure { index, source })?;
    Ok(to_base64(&png))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
