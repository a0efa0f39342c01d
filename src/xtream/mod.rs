//! Xtream Codes API client
//!
//! This module talks to the upstream `player_api.php` and `xmltv.php`
//! endpoints: credential validation, concurrent catalog aggregation, and
//! per-series episode resolution.
//!
//! # Failure model
//!
//! The live category and stream lists are mandatory — a transport failure or
//! non-list payload on either fails the whole fetch. Every other endpoint is
//! best-effort: a failed or malformed optional endpoint contributes nothing
//! and the request carries on with a smaller catalog. Per-series episode
//! lookups degrade the same way.
//!
//! Endpoint requests run concurrently with a bounded fan-out and independent
//! per-endpoint timeouts; a slow endpoint never cancels its siblings, and the
//! aggregate waits for all of them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::models::{
    Catalog, Category, ContentKind, Episode, EpisodeIndex, SeasonMap, StreamEntry,
    opt_string_or_number,
};
use crate::utils::UrlUtils;

/// Concurrency bound for the catalog endpoint fan-out
const CATALOG_CONCURRENCY: usize = 10;

/// Concurrency bound for episode resolution; lower than the catalog bound
/// because this may fan out to hundreds of series
const EPISODE_CONCURRENCY: usize = 5;

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
const SERIES_INFO_TIMEOUT: Duration = Duration::from_secs(20);
const GUIDE_TIMEOUT: Duration = Duration::from_secs(20);

/// The catalog endpoints of the upstream API
///
/// Timeout budgets scale with the payloads: category lists are small, the
/// live stream list is large, and the VOD/series stream lists are an order
/// of magnitude larger still. The stream lists are only fetched on the
/// playlist path, never for categories-only requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CatalogEndpoint {
    LiveCategories,
    LiveStreams,
    VodCategories,
    SeriesCategories,
    VodStreams,
    Series,
}

impl CatalogEndpoint {
    fn action(self) -> &'static str {
        match self {
            Self::LiveCategories => "get_live_categories",
            Self::LiveStreams => "get_live_streams",
            Self::VodCategories => "get_vod_categories",
            Self::SeriesCategories => "get_series_categories",
            Self::VodStreams => "get_vod_streams",
            Self::Series => "get_series",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::LiveCategories => "live_categories",
            Self::LiveStreams => "live_streams",
            Self::VodCategories => "vod_categories",
            Self::SeriesCategories => "series_categories",
            Self::VodStreams => "vod_streams",
            Self::Series => "series",
        }
    }

    fn timeout(self) -> Duration {
        match self {
            Self::LiveCategories | Self::VodCategories | Self::SeriesCategories => {
                Duration::from_secs(60)
            }
            Self::LiveStreams => Duration::from_secs(180),
            Self::VodStreams | Self::Series => Duration::from_secs(240),
        }
    }
}

/// Validated upstream session: the credentials echoed by the server and the
/// media server base URL built from `server_info`
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub username: String,
    pub password: String,
    /// `http://{server_info.url}:{server_info.port}`
    pub server_url: String,
}

/// Client for one upstream Xtream server, scoped to a single request's
/// base URL and credentials
pub struct XtreamClient {
    client: Client,
    api_base: Url,
    base_url: String,
    username: String,
    password: String,
}

impl XtreamClient {
    /// Create a client for the given upstream
    ///
    /// The base URL is normalized (scheme added, trailing slashes stripped)
    /// and validated here so later URL construction cannot fail.
    pub fn new(client: Client, base_url: &str, username: &str, password: &str) -> AppResult<Self> {
        let base_url = UrlUtils::sanitize_base(base_url);
        let api_base = Url::parse(&format!("{base_url}/player_api.php")).map_err(|e| {
            AppError::missing_parameters(format!("parameter 'url' is not a valid URL: {e}"))
        })?;

        Ok(Self {
            client,
            api_base,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn api_url(&self, action: Option<&str>) -> Url {
        let mut url = self.api_base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("username", &self.username);
            pairs.append_pair("password", &self.password);
            if let Some(action) = action {
                pairs.append_pair("action", action);
            }
        }
        url
    }

    /// Validate the credentials and extract the media server address
    ///
    /// The auth response must contain `user_info` and `server_info` objects;
    /// `server_info` must name the media host and port. Media URLs use the
    /// username/password echoed by the server, falling back to the request
    /// credentials when the echo is absent.
    pub async fn authenticate(&self) -> AppResult<AuthSession> {
        let url = self.api_url(None);
        debug!(
            "Validating credentials against {}",
            UrlUtils::obfuscate_credentials(url.as_str())
        );

        let response = self
            .client
            .get(url)
            .timeout(AUTH_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?;

        let body: Value = response.json().await.map_err(|e| {
            AppError::AuthResponseMalformed {
                detail: format!("auth endpoint did not return JSON: {}", e.without_url()),
            }
        })?;

        let auth: AuthResponse =
            serde_json::from_value(body).map_err(|e| AppError::AuthResponseMalformed {
                detail: format!("unexpected auth response shape: {e}"),
            })?;

        let user_info = auth.user_info.ok_or_else(|| {
            AppError::invalid_credentials("server response missing required data (user_info)")
        })?;
        let server_info = auth.server_info.ok_or_else(|| {
            AppError::invalid_credentials("server response missing required data (server_info)")
        })?;

        let host = server_info
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::invalid_credentials("server_info is missing the media url"))?;
        let port = server_info.port.filter(|p| !p.is_empty()).ok_or_else(|| {
            AppError::invalid_credentials("server_info is missing the media port")
        })?;

        Ok(AuthSession {
            username: user_info.username.unwrap_or_else(|| self.username.clone()),
            password: user_info.password.unwrap_or_else(|| self.password.clone()),
            server_url: format!("http://{host}:{port}"),
        })
    }

    /// Fetch and aggregate the catalog
    ///
    /// `include_series_streams` is only true on the playlist-generation path;
    /// the categories-only path must never pull the massive VOD/series
    /// stream lists.
    pub async fn fetch_catalog(
        &self,
        include_vod: bool,
        include_series_streams: bool,
    ) -> AppResult<Catalog> {
        let mut endpoints = vec![CatalogEndpoint::LiveCategories, CatalogEndpoint::LiveStreams];
        if include_vod {
            endpoints.push(CatalogEndpoint::VodCategories);
            endpoints.push(CatalogEndpoint::SeriesCategories);
            if include_series_streams {
                endpoints.push(CatalogEndpoint::VodStreams);
                endpoints.push(CatalogEndpoint::Series);
            }
        }

        info!(
            "Starting concurrent fetch of {} catalog endpoints from {}",
            endpoints.len(),
            self.base_url
        );

        let mut results: HashMap<CatalogEndpoint, AppResult<Value>> = stream::iter(endpoints)
            .map(|endpoint| async move { (endpoint, self.fetch_endpoint(endpoint).await) })
            .buffer_unordered(CATALOG_CONCURRENCY)
            .collect()
            .await;

        let mut catalog = Catalog::default();

        let live_categories =
            mandatory_list(results.remove(&CatalogEndpoint::LiveCategories), "live_categories")?;
        let live_streams =
            mandatory_list(results.remove(&CatalogEndpoint::LiveStreams), "live_streams")?;
        append_categories(&mut catalog, live_categories, ContentKind::Live, "live_categories");
        append_streams(&mut catalog, live_streams, ContentKind::Live, "live_streams");

        if include_vod {
            let category_endpoints = [
                (CatalogEndpoint::VodCategories, ContentKind::Vod),
                (CatalogEndpoint::SeriesCategories, ContentKind::Series),
            ];
            for (endpoint, kind) in category_endpoints {
                let items = optional_list(results.remove(&endpoint), endpoint.name());
                append_categories(&mut catalog, items, kind, endpoint.name());
            }

            if include_series_streams {
                let stream_endpoints = [
                    (CatalogEndpoint::VodStreams, ContentKind::Vod),
                    (CatalogEndpoint::Series, ContentKind::Series),
                ];
                for (endpoint, kind) in stream_endpoints {
                    let items = optional_list(results.remove(&endpoint), endpoint.name());
                    append_streams(&mut catalog, items, kind, endpoint.name());
                }
            }
        }

        info!(
            "Catalog fetch complete: {} categories, {} streams",
            catalog.categories.len(),
            catalog.streams.len()
        );
        Ok(catalog)
    }

    async fn fetch_endpoint(&self, endpoint: CatalogEndpoint) -> AppResult<Value> {
        let url = self.api_url(Some(endpoint.action()));
        let started = Instant::now();
        debug!("Fetching {}", endpoint.name());

        let response = self
            .client
            .get(url)
            .timeout(endpoint.timeout())
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?;

        match response.json::<Value>().await {
            Ok(value) => {
                if let Value::Array(items) = &value {
                    info!(
                        "Completed {} in {:.1}s with {} items",
                        endpoint.name(),
                        started.elapsed().as_secs_f64(),
                        items.len()
                    );
                } else {
                    info!(
                        "Completed {} in {:.1}s",
                        endpoint.name(),
                        started.elapsed().as_secs_f64()
                    );
                }
                Ok(value)
            }
            // A non-JSON body is shape data, not a transport failure: mandatory
            // endpoints turn it into InvalidCatalogFormat, optional ones skip it
            Err(err) if err.is_decode() => {
                warn!(
                    "Endpoint {} returned undecodable data: {}",
                    endpoint.name(),
                    err.without_url()
                );
                Ok(Value::Null)
            }
            Err(err) => Err(transport_error(err)),
        }
    }

    /// Resolve episode listings for the given series ids
    ///
    /// Callers must pre-filter the ids: resolving episodes for an excluded
    /// series wastes one HTTP round-trip per series. Per-series failures
    /// yield no entry and never fail the batch.
    pub async fn resolve_episodes(&self, series_ids: &[String]) -> EpisodeIndex {
        if series_ids.is_empty() {
            return EpisodeIndex::new();
        }

        info!("Resolving episodes for {} series", series_ids.len());

        let results: Vec<(String, Option<SeasonMap>)> = stream::iter(series_ids.iter().cloned())
            .map(|series_id| async move {
                let seasons = self.fetch_series_episodes(&series_id).await;
                (series_id, seasons)
            })
            .buffer_unordered(EPISODE_CONCURRENCY)
            .collect()
            .await;

        let index: EpisodeIndex = results
            .into_iter()
            .filter_map(|(series_id, seasons)| seasons.map(|s| (series_id, s)))
            .collect();

        info!(
            "Resolved episodes for {} of {} series",
            index.len(),
            series_ids.len()
        );
        index
    }

    async fn fetch_series_episodes(&self, series_id: &str) -> Option<SeasonMap> {
        let mut url = self.api_url(Some("get_series_info"));
        url.query_pairs_mut().append_pair("series_id", series_id);
        let started = Instant::now();

        let result = async {
            self.client
                .get(url)
                .timeout(SERIES_INFO_TIMEOUT)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        }
        .await;

        match result {
            Ok(body) => {
                let seasons = body.get("episodes").and_then(parse_season_map);
                match &seasons {
                    Some(_) => debug!(
                        "Fetched episodes for series {} in {:.1}s",
                        series_id,
                        started.elapsed().as_secs_f64()
                    ),
                    None => warn!("No episodes found for series {}", series_id),
                }
                seasons
            }
            Err(err) => {
                warn!(
                    "Failed to fetch episodes for series {} after {:.1}s: {}",
                    series_id,
                    started.elapsed().as_secs_f64(),
                    err.without_url()
                );
                None
            }
        }
    }

    /// Fetch the raw XMLTV guide document
    pub async fn fetch_guide(&self) -> AppResult<String> {
        let mut url = Url::parse(&format!("{}/xmltv.php", self.base_url))
            .map_err(|e| AppError::internal(format!("invalid guide URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("username", &self.username);
            pairs.append_pair("password", &self.password);
        }

        let response = self
            .client
            .get(url)
            .timeout(GUIDE_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?;

        response.text().await.map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    AppError::upstream_transport(err.without_url().to_string())
}

fn mandatory_list(result: Option<AppResult<Value>>, name: &str) -> AppResult<Vec<Value>> {
    match result {
        Some(Ok(Value::Array(items))) => Ok(items),
        Some(Ok(_)) => Err(AppError::invalid_catalog_format(format!(
            "{name} data is not in the expected format"
        ))),
        Some(Err(err)) => Err(err),
        None => Err(AppError::internal(format!("endpoint {name} was not fetched"))),
    }
}

fn optional_list(result: Option<AppResult<Value>>, name: &str) -> Vec<Value> {
    match result {
        Some(Ok(Value::Array(items))) => items,
        Some(Ok(_)) => {
            warn!("Optional endpoint {name} returned non-list data, skipping");
            Vec::new()
        }
        Some(Err(err)) => {
            warn!("Optional endpoint {name} failed, skipping: {err}");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn append_categories(catalog: &mut Catalog, items: Vec<Value>, kind: ContentKind, name: &str) {
    let total = items.len();
    let mut categories: Vec<Category> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if categories.len() < total {
        warn!(
            "Skipped {} malformed entries from {}",
            total - categories.len(),
            name
        );
    }
    for category in &mut categories {
        category.kind = kind;
    }
    catalog.categories.append(&mut categories);
}

fn append_streams(catalog: &mut Catalog, items: Vec<Value>, kind: ContentKind, name: &str) {
    let total = items.len();
    let mut streams: Vec<StreamEntry> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if streams.len() < total {
        warn!("Skipped {} malformed entries from {}", total - streams.len(), name);
    }
    for stream in &mut streams {
        stream.kind = kind;
    }
    catalog.streams.append(&mut streams);
}

/// Normalize an `episodes` payload into a season map
///
/// The upstream returns either a mapping keyed by season number or a flat
/// list; flat entries are grouped by their own `season` field, defaulting to
/// season 1 when absent.
pub fn parse_season_map(episodes: &Value) -> Option<SeasonMap> {
    let mut seasons = SeasonMap::new();

    match episodes {
        Value::Object(by_season) => {
            for (season, entries) in by_season {
                let Some(entries) = entries.as_array() else {
                    continue;
                };
                let parsed = parse_episode_list(entries);
                if !parsed.is_empty() {
                    seasons.insert(season.clone(), parsed);
                }
            }
        }
        Value::Array(entries) => {
            for episode in parse_episode_list(entries) {
                let season = episode.season.clone().unwrap_or_else(|| "1".to_string());
                seasons.entry(season).or_default().push(episode);
            }
        }
        _ => return None,
    }

    if seasons.is_empty() { None } else { Some(seasons) }
}

fn parse_episode_list(entries: &[Value]) -> Vec<Episode> {
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect()
}

/// Xtream auth response envelope
#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    user_info: Option<UserInfo>,
    #[serde(default)]
    server_info: Option<ServerInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    username: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    port: Option<String>,
}
