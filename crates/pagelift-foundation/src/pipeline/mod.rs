//! Image edit request pipeline.
//!
//! Validation happens before the model is touched: an unsupported response
//! format, an empty image list, or any undecodable image fails the request
//! without loading anything. Images are then cropped one by one, in input
//! order, each under its own [`ResourceLease`](crate::lifecycle::ResourceLease).

pub mod codec;
mod edit;
mod types;

pub use edit::{EditPipeline, PipelineError};
pub use types::{DEFAULT_PROMPT, EditRequest, EditResponse, EditedImage, ResponseFormat};
