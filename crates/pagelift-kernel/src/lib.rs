//! `pagelift-kernel`: contracts shared by the pagelift crates.
//!
//! | Contract | Purpose |
//! |----------|---------|
//! | [`PageExtractor`] | The loaded inference resource: finds the page in an image. |
//! | [`ExtractorLoader`] | Constructs a [`PageExtractor`] from a [`LoadConfig`]. |
//! | [`IdlePolicy`] | How often idle state is inspected and when it triggers eviction. |
//!
//! Implementations live in `pagelift-foundation`; the HTTP surface lives in
//! `pagelift-gateway`.

pub mod extractor;
pub mod loader;
pub mod policy;

pub use extractor::{ExtractError, Extraction, PageExtractor};
pub use loader::{ExtractorLoader, LoadConfig, LoadError};
pub use policy::IdlePolicy;
