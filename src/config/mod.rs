use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod duration_serde;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL of this service, used as the default
    /// proxy base when rewriting playlist/guide URLs. Overridable per request
    /// via the `proxy_url` parameter.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User agent sent upstream; empty means `xtream-proxy/<version>`
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect timeout applied to every upstream client
    #[serde(
        default = "default_connect_timeout",
        with = "duration_serde::duration"
    )]
    pub connect_timeout: Duration,
    /// Idle-read timeout for proxied media streams (no total deadline —
    /// live streams must stay open indefinitely)
    #[serde(
        default = "default_stream_read_timeout",
        with = "duration_serde::duration"
    )]
    pub stream_read_timeout: Duration,
    /// Timeout budget for proxied images
    #[serde(default = "default_image_timeout", with = "duration_serde::duration")]
    pub image_timeout: Duration,
    /// Static DNS overrides (host → address) injected into client
    /// construction; the port is ignored in favor of the request URL's port
    #[serde(default)]
    pub dns_overrides: HashMap<String, SocketAddr>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8453
}

fn default_base_url() -> String {
    format!("http://localhost:{}", default_port())
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_stream_read_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_image_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            user_agent: String::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            stream_read_timeout: default_stream_read_timeout(),
            image_timeout: default_image_timeout(),
            dns_overrides: HashMap::new(),
        }
    }
}

impl WebConfig {
    /// Resolved user agent, defaulting to the crate name and version
    pub fn resolved_user_agent(&self) -> String {
        if self.user_agent.trim().is_empty() {
            format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        } else {
            self.user_agent.trim().to_string()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.web.port, 8453);
        assert_eq!(parsed.http.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_durations_accept_humantime_strings() {
        let config: Config = toml::from_str(
            r#"
            [http]
            connect_timeout = "5s"
            stream_read_timeout = "2m"
            "#,
        )
        .unwrap();
        assert_eq!(config.http.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.http.stream_read_timeout, Duration::from_secs(120));
        assert_eq!(config.http.image_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_dns_overrides_parse_socket_addrs() {
        let config: Config = toml::from_str(
            r#"
            [http.dns_overrides]
            "cdn.example.com" = "203.0.113.7:0"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.http.dns_overrides["cdn.example.com"],
            "203.0.113.7:0".parse().unwrap()
        );
    }

    #[test]
    fn test_user_agent_defaults_to_crate_version() {
        let web = WebConfig::default();
        assert!(web.resolved_user_agent().starts_with("xtream-proxy/"));

        let web = WebConfig {
            user_agent: "custom/1.0".into(),
            ..WebConfig::default()
        };
        assert_eq!(web.resolved_user_agent(), "custom/1.0");
    }
}
