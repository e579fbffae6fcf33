//! Built-in page extraction backend.
//!
//! | Variant | Device | Implementation |
//! |---------|--------|----------------|
//! | `otsu`  | `cpu`  | [`OtsuExtractor`]: global luma threshold + bounding box |

mod otsu;

use std::sync::Arc;

use async_trait::async_trait;
use pagelift_kernel::{ExtractorLoader, LoadConfig, LoadError, PageExtractor};

pub use otsu::OtsuExtractor;

pub const OTSU_VARIANT: &str = "otsu";
pub const CPU_DEVICE: &str = "cpu";

/// Loader for the variants shipped with pagelift.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinLoader;

#[async_trait]
impl ExtractorLoader for BuiltinLoader {
    async fn load(&self, config: &LoadConfig) -> Result<Arc<dyn PageExtractor>, LoadError> {
        if !config.device.eq_ignore_ascii_case(CPU_DEVICE) {
            return Err(LoadError::DeviceUnavailable(config.device.clone()));
        }
        match config.variant.as_str() {
            OTSU_VARIANT => Ok(Arc::new(OtsuExtractor::default())),
            other => Err(LoadError::UnsupportedVariant(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_otsu_on_cpu() {
        let extractor = BuiltinLoader
            .load(&LoadConfig::new("otsu", "cpu"))
            .await
            .unwrap();
        assert_eq!(extractor.variant(), OTSU_VARIANT);
    }

    #[tokio::test]
    async fn rejects_unknown_device() {
        let err = BuiltinLoader
            .load(&LoadConfig::new("otsu", "cuda"))
            .await
            .err()
            .unwrap();
        assert_eq!(err, LoadError::DeviceUnavailable("cuda".into()));
    }

    #[tokio::test]
    async fn rejects_unknown_variant() {
        let err = BuiltinLoader
            .load(&LoadConfig::new("sam2.1_hiera_tiny", "cpu"))
            .await
            .err()
            .unwrap();
        assert_eq!(err, LoadError::UnsupportedVariant("sam2.1_hiera_tiny".into()));
    }
}
