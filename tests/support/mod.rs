//! Shared helpers for integration tests: in-process HTTP servers acting as
//! the proxy under test and as mock upstream origins.

use std::net::SocketAddr;

use axum::Router;
use xtream_proxy::config::Config;
use xtream_proxy::web::{AppState, create_router};

/// Serve a router on an ephemeral local port and return its address
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Spawn the application under test with the given configuration
pub async fn spawn_app(config: Config) -> SocketAddr {
    let state = AppState::from_config(config).unwrap();
    spawn_server(create_router(state)).await
}

/// Spawn the application with default configuration and a fixed proxy base
pub async fn spawn_default_app() -> SocketAddr {
    let mut config = Config::default();
    config.web.base_url = "http://proxy.test".to_string();
    spawn_app(config).await
}

/// An address nothing is listening on
pub async fn unreachable_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
