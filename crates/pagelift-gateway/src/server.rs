//! Axum-based HTTP server.
//!
//! [`PageliftServer`] wires the lifecycle gate, the idle reaper and the
//! handlers into a running axum service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/v1/images/edits` | Crop the page out of each uploaded image. |
//! | `GET`  | `/health` | Liveness check with model lifecycle state. |
//!
//! # Shutdown order
//!
//! 1. stop accepting connections and let in-flight requests finish
//! 2. stop the idle reaper
//! 3. drain the gate, releasing the model if it is loaded

use std::future::Future;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use pagelift_foundation::backend::BuiltinLoader;
use pagelift_foundation::lifecycle::{IdleReaper, LifecycleGate};
use pagelift_kernel::ExtractorLoader;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::handlers::{edits_router, health_router};
use crate::state::AppState;

pub struct PageliftServer {
    config: GatewayConfig,
    gate: LifecycleGate,
}

impl PageliftServer {
    /// Create a server backed by the built-in extractors.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_loader(config, Arc::new(BuiltinLoader))
    }

    /// Create a server that loads its model through `loader`.
    pub fn with_loader(config: GatewayConfig, loader: Arc<dyn ExtractorLoader>) -> Self {
        let gate = LifecycleGate::with_max_concurrency(
            loader,
            config.load_config(),
            config.max_concurrent_extractions,
        );
        Self { config, gate }
    }

    pub fn gate(&self) -> &LifecycleGate {
        &self.gate
    }

    /// Build the axum [`Router`] for this server.
    pub fn build_app(&self) -> Router {
        let state = AppState::new(self.gate.clone(), self.config.default_prompt.as_str())
            .with_request_header_logging(self.config.log_request_headers);

        Router::new()
            .merge(health_router())
            .merge(edits_router())
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serve on `listener` until `shutdown` resolves, then stop the reaper
    /// and release the model.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.config.model.preload {
            match self.gate.preload().await {
                Ok(()) => info!(config = %self.config.load_config(), "model preloaded"),
                // The next request retries the load.
                Err(e) => warn!(error = %e, "model preload failed"),
            }
        }

        let reaper = IdleReaper::spawn(self.gate.clone(), self.config.idle_policy());
        let app = self.build_app();

        info!(addr = %listener.local_addr()?, "pagelift listening");
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        info!("shutting down");
        reaper.shutdown().await;
        self.gate.drain().await;
        served
    }

    /// Bind to the configured address and serve until ctrl-c or SIGTERM.
    pub async fn start(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        self.serve(listener, shutdown_signal()).await
    }
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
