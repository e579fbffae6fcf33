//! Construction of page extraction resources.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extractor::PageExtractor;

/// Parameters a resource is loaded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Model variant identifier (e.g. `otsu`).
    pub variant: String,
    /// Target compute device identifier (e.g. `cpu`, `cuda`).
    pub device: String,
}

impl LoadConfig {
    pub fn new(variant: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            device: device.into(),
        }
    }
}

impl fmt::Display for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.variant, self.device)
    }
}

/// Failure to construct a resource.
///
/// Cloneable: a single failed load is reported to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The loader does not know the requested variant.
    #[error("unsupported model variant '{0}'")]
    UnsupportedVariant(String),

    /// The requested compute device is not available on this host.
    #[error("device '{0}' is unavailable")]
    DeviceUnavailable(String),

    /// The backend reported an error while loading.
    #[error("backend error: {0}")]
    Backend(String),

    /// The load task ended without producing a result.
    #[error("load aborted: {0}")]
    Aborted(String),
}

/// Builds [`PageExtractor`] instances.
#[async_trait]
pub trait ExtractorLoader: Send + Sync {
    /// Construct a new resource. May take seconds.
    async fn load(&self, config: &LoadConfig) -> Result<Arc<dyn PageExtractor>, LoadError>;
}
