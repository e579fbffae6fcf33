//! Shared application state for the HTTP handlers

use std::sync::Arc;

use pagelift_foundation::lifecycle::LifecycleGate;
use pagelift_foundation::pipeline::EditPipeline;

/// State shared across all request handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: EditPipeline,
    /// Prompt applied when the form has no `prompt` field.
    pub default_prompt: Arc<str>,
    pub log_request_headers: bool,
}

impl AppState {
    pub fn new(gate: LifecycleGate, default_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            pipeline: EditPipeline::new(gate),
            default_prompt: default_prompt.into(),
            log_request_headers: false,
        }
    }

    pub fn with_request_header_logging(mut self, enabled: bool) -> Self {
        self.log_request_headers = enabled;
        self
    }

    pub fn gate(&self) -> &LifecycleGate {
        self.pipeline.gate()
    }
}
