//! HTTP Client Factory
//!
//! Centralized construction of the reqwest clients used by the application.
//! Each upstream concern gets its own client profile: the catalog client
//! carries no total timeout (per-endpoint budgets are applied per request),
//! the stream client has an idle-read timeout but no total deadline (live
//! streams stay open indefinitely), and the image client runs on a short
//! budget.
//!
//! DNS overrides from `[http.dns_overrides]` are injected here via
//! `ClientBuilder::resolve`, so name resolution behavior is explicit client
//! configuration rather than ambient process state.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Client;

use crate::config::{HttpConfig, WebConfig};
use crate::errors::{AppError, AppResult};

/// Factory for creating HTTP clients with shared transport configuration
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    user_agent: String,
    connect_timeout: Duration,
    stream_read_timeout: Duration,
    image_timeout: Duration,
    dns_overrides: Vec<(String, SocketAddr)>,
}

/// The pre-built clients held in application state for the process lifetime
#[derive(Debug, Clone)]
pub struct HttpClients {
    /// Catalog API requests (player_api.php, xmltv.php); per-request timeouts
    pub catalog: Client,
    /// Media stream passthrough
    pub stream: Client,
    /// Image passthrough
    pub image: Client,
}

impl HttpClientFactory {
    /// Create a new factory from the web and http configuration sections
    pub fn new(web: &WebConfig, http: &HttpConfig) -> Self {
        Self {
            user_agent: web.resolved_user_agent(),
            connect_timeout: http.connect_timeout,
            stream_read_timeout: http.stream_read_timeout,
            image_timeout: http.image_timeout,
            dns_overrides: http
                .dns_overrides
                .iter()
                .map(|(host, addr)| (host.clone(), *addr))
                .collect(),
        }
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        let mut builder = Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout);

        for (host, addr) in &self.dns_overrides {
            builder = builder.resolve(host, *addr);
        }

        builder
    }

    /// Client for catalog API calls; timeouts are applied per request
    /// because endpoint budgets differ by an order of magnitude
    pub fn catalog_client(&self) -> AppResult<Client> {
        self.builder()
            .build()
            .map_err(|e| AppError::internal(format!("failed to build catalog client: {e}")))
    }

    /// Client for proxied media streams: idle-read timeout only
    pub fn stream_client(&self) -> AppResult<Client> {
        self.builder()
            .read_timeout(self.stream_read_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build stream client: {e}")))
    }

    /// Client for proxied images
    pub fn image_client(&self) -> AppResult<Client> {
        self.builder()
            .read_timeout(self.image_timeout)
            .timeout(self.image_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build image client: {e}")))
    }

    /// Build the full client set used by the web layer
    pub fn build_clients(&self) -> AppResult<HttpClients> {
        Ok(HttpClients {
            catalog: self.catalog_client()?,
            stream: self.stream_client()?,
            image: self.image_client()?,
        })
    }
}
