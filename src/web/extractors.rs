//! Thin request-parameter extraction
//!
//! Raw query/body fields come in as loosely typed strings (flags arrive as
//! `"true"` text from query strings and as booleans from JSON bodies); this
//! module normalizes them into validated parameter structs before any
//! business logic runs.

use serde::Deserialize;

use crate::errors::{AppError, AppResult};
use crate::models::FilterSpec;

/// A boolean flag that accepts both JSON booleans and `"true"`/`"false"`
/// strings, defaulting to false
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flag(pub bool);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Visitor;

        struct FlagVisitor;

        impl<'de> Visitor<'de> for FlagVisitor {
            type Value = Flag;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a boolean or \"true\"/\"false\" string")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Flag(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Flag(value.eq_ignore_ascii_case("true")))
            }
        }

        deserializer.deserialize_any(FlagVisitor)
    }
}

/// Validated upstream coordinates shared by every catalog-backed endpoint
#[derive(Debug, Clone)]
pub struct Credentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// Raw parameters of the `/categories` and `/xmltv` endpoints
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialQuery {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub proxy_url: Option<String>,
    pub include_vod: Flag,
}

impl CredentialQuery {
    pub fn credentials(&self) -> AppResult<Credentials> {
        required_credentials(
            self.url.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
        )
    }
}

/// Raw parameters of the `/m3u` endpoint (query string or JSON body)
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PlaylistQuery {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub proxy_url: Option<String>,
    pub wanted_groups: Option<String>,
    pub unwanted_groups: Option<String>,
    pub nostreamproxy: Flag,
    pub include_vod: Flag,
    pub include_channel_id: Flag,
    pub channel_id_tag: Option<String>,
}

/// Validated `/m3u` parameters
#[derive(Debug, Clone)]
pub struct PlaylistParams {
    pub credentials: Credentials,
    pub proxy_url: Option<String>,
    pub filter: FilterSpec,
    pub no_stream_proxy: bool,
    pub include_vod: bool,
    pub include_channel_id: bool,
    pub channel_id_tag: String,
}

impl PlaylistParams {
    /// Proxy base for URL rewriting: the caller-supplied value, falling back
    /// to the configured base URL; `None` when proxying is disabled
    pub fn resolve_proxy_base(&self, default_base: &str) -> Option<String> {
        if self.no_stream_proxy {
            return None;
        }
        let base = self
            .proxy_url
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(default_base);
        Some(base.trim_end_matches('/').to_string())
    }
}

impl TryFrom<PlaylistQuery> for PlaylistParams {
    type Error = AppError;

    fn try_from(query: PlaylistQuery) -> AppResult<Self> {
        let credentials = required_credentials(
            query.url.as_deref(),
            query.username.as_deref(),
            query.password.as_deref(),
        )?;

        Ok(Self {
            credentials,
            proxy_url: query.proxy_url.filter(|p| !p.is_empty()),
            filter: FilterSpec {
                wanted: parse_group_list(query.wanted_groups.as_deref()),
                unwanted: parse_group_list(query.unwanted_groups.as_deref()),
            },
            no_stream_proxy: query.nostreamproxy.0,
            include_vod: query.include_vod.0,
            include_channel_id: query.include_channel_id.0,
            channel_id_tag: query
                .channel_id_tag
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "channel-id".to_string()),
        })
    }
}

fn required_credentials(
    url: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> AppResult<Credentials> {
    match (non_empty(url), non_empty(username), non_empty(password)) {
        (Some(url), Some(username), Some(password)) => Ok(Credentials {
            base_url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => Err(AppError::missing_parameters(
            "Required parameters: url, username, and password",
        )),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a comma-separated group list into trimmed patterns
pub fn parse_group_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}
