//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::Config;
use crate::monitor::Monitor;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub monitor: Arc<Monitor>,
}

/// Web server for gracewatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: Config, monitor: Arc<Monitor>) -> Self {
        Self {
            state: AppState { config, monitor },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        let api = Router::new()
            .route("/stats", get(handlers::handle_get_stats))
            .route("/check", post(handlers::handle_check))
            .route("/checks", get(handlers::handle_get_checks))
            .route("/status", get(handlers::handle_status))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                handlers::require_token,
            ));

        Router::new()
            .route("/health", get(handlers::handle_health))
            .nest("/api", api)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(
        &self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.server.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
