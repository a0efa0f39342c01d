//! Web layer
//!
//! HTTP interface of the proxy: thin handlers over the catalog, playlist,
//! guide, and streaming modules, with consistent error mapping and
//! permissive CORS (playlist consumers are frequently browser-based).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::errors::AppResult;
use crate::utils::{HttpClientFactory, HttpClients};

pub mod extractors;
pub mod handlers;
pub mod responses;

/// Application state shared across all handlers
///
/// The only process-wide state: immutable configuration and the reqwest
/// connection pools. Everything else is request-scoped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: Arc<HttpClients>,
}

impl AppState {
    pub fn from_config(config: Config) -> AppResult<Self> {
        let factory = HttpClientFactory::new(&config.web, &config.http);
        Ok(Self {
            config: Arc::new(config),
            http: Arc::new(factory.build_clients()?),
        })
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/m3u",
            get(handlers::generate_playlist_get).post(handlers::generate_playlist_post),
        )
        .route("/categories", get(handlers::list_categories))
        .route("/xmltv", get(handlers::generate_guide))
        .route("/stream-proxy/{*url}", get(handlers::proxy_stream))
        .route("/image-proxy/{*url}", get(handlers::proxy_image))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    /// Create a new web server from configuration
    pub fn new(config: Config) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let state = AppState::from_config(config)?;

        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Start the web server and run until shutdown
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
