//! The page extraction capability.

use image::{DynamicImage, GrayImage};
use thiserror::Error;

/// Errors raised by a [`PageExtractor`] while processing one image.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The input image cannot be processed (e.g. zero width or height).
    #[error("unsupported input image: {0}")]
    UnsupportedInput(String),

    /// The backend failed during inference.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Result of running the extractor over a single image.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Per-pixel page mask over the input image (255 = page).
    pub mask: GrayImage,
    /// Confidence that `cropped` is a page, in `0.0..=1.0`.
    pub score: f32,
    /// The page region cut out of the input image.
    pub cropped: DynamicImage,
}

/// A loaded page extraction resource.
///
/// Construction is expensive and happens through an
/// [`ExtractorLoader`](crate::ExtractorLoader); invocation is cheap and may be
/// repeated any number of times. `extract_page` is a blocking,
/// run-to-completion call and must not be invoked on an async worker thread.
pub trait PageExtractor: Send + Sync {
    /// Identifier of the variant this resource was built from.
    fn variant(&self) -> &str;

    /// Locate the page in `image` according to `prompt`.
    fn extract_page(&self, image: &DynamicImage, prompt: &str) -> Result<Extraction, ExtractError>;
}
