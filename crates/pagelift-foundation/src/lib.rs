//! `pagelift-foundation`: implementations behind the pagelift service.
//!
//! - [`lifecycle`]: lazy single-flight loading of the extraction model, idle
//!   eviction, and the mutual-exclusion boundary shared by both.
//! - [`pipeline`]: turns an [`pipeline::EditRequest`] into an
//!   [`pipeline::EditResponse`] using the gated model.
//! - [`backend`]: the built-in CPU page extractor.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagelift_foundation::backend::BuiltinLoader;
//! use pagelift_foundation::lifecycle::{IdleReaper, LifecycleGate};
//! use pagelift_foundation::pipeline::EditPipeline;
//! use pagelift_kernel::{IdlePolicy, LoadConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gate = LifecycleGate::new(Arc::new(BuiltinLoader), LoadConfig::new("otsu", "cpu"));
//!     let reaper = IdleReaper::spawn(gate.clone(), IdlePolicy::default());
//!     let pipeline = EditPipeline::new(gate.clone());
//!     // ... serve requests through `pipeline`
//!     reaper.shutdown().await;
//!     gate.drain().await;
//! }
//! ```

pub mod backend;
pub mod lifecycle;
pub mod pipeline;
