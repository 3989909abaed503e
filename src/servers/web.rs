use axum::{routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};

use super::response::{panic_response, ApiResponse};
use crate::auth::{api_router, AuthService};
use crate::Result;

/// Listen address for the HTTP server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

pub struct WebServer {
    config: WebServerConfig,
    auth: Arc<AuthService>,
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    version: &'static str,
}

impl WebServer {
    pub fn new(config: WebServerConfig, auth: Arc<AuthService>) -> Self {
        Self { config, auth }
    }

    pub fn config(&self) -> &WebServerConfig {
        &self.config
    }

    /// Serve until Ctrl-C
    pub async fn start(&self) -> Result<()> {
        let app = self.create_router();
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;

        log::info!(
            "passgate listening on http://{}",
            listener.local_addr()?
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        log::info!("Server stopped");
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        build_router(Arc::clone(&self.auth))
    }
}

/// Full application: `/health` plus the API under `/v1`
pub fn build_router(auth: Arc<AuthService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/v1", api_router(auth))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health() -> ApiResponse<HealthData> {
    ApiResponse::success(
        "Service is healthy",
        HealthData {
            status: "ok",
            version: crate::VERSION,
        },
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
