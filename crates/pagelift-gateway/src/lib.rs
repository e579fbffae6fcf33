//! `pagelift-gateway`: HTTP front end for pagelift.
//!
//! Exposes an OpenAI-style `POST /v1/images/edits` endpoint that returns the
//! page cropped out of each uploaded photo, plus `GET /health`.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | Layered configuration (defaults, file, `PAGELIFT__*` env) |
//! | [`handlers`] | Request handlers |
//! | [`server`] | [`server::PageliftServer`]: router, idle reaper, shutdown |
//! | [`error`] | Error to HTTP response mapping |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pagelift_gateway::config::GatewayConfig;
//! use pagelift_gateway::server::PageliftServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::load(None)?;
//!     PageliftServer::new(config).start().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::GatewayConfig;
pub use server::PageliftServer;
