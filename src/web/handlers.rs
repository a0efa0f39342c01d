//! HTTP request handlers
//!
//! Handlers stay thin: parameter extraction happens in
//! [`crate::web::extractors`], the work happens in the xtream/playlist/
//! guide/streaming modules, and errors bubble up as [`AppError`] for the
//! response mapping in [`crate::web::responses`].

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::filtering::GroupFilter;
use crate::guide;
use crate::models::EpisodeIndex;
use crate::playlist::{self, PlaylistOptions};
use crate::streaming::{self, ProxyKind};
use crate::utils::UrlUtils;
use crate::web::AppState;
use crate::web::extractors::{CredentialQuery, Credentials, PlaylistParams, PlaylistQuery};
use crate::xtream::XtreamClient;

/// Liveness endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /m3u`
pub async fn generate_playlist_get(
    State(state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
) -> Result<Response, AppError> {
    generate_playlist(state, PlaylistParams::try_from(query)?).await
}

/// `POST /m3u` — JSON body for filter lists too large for a query string
pub async fn generate_playlist_post(
    State(state): State<AppState>,
    Json(query): Json<PlaylistQuery>,
) -> Result<Response, AppError> {
    generate_playlist(state, PlaylistParams::try_from(query)?).await
}

async fn generate_playlist(state: AppState, params: PlaylistParams) -> Result<Response, AppError> {
    info!(
        "Generating playlist for {} (include_vod: {}, wanted: {}, unwanted: {})",
        UrlUtils::obfuscate_credentials(&params.credentials.base_url),
        params.include_vod,
        params.filter.wanted.len(),
        params.filter.unwanted.len(),
    );

    let client = catalog_client(&state, &params.credentials)?;
    let session = client.authenticate().await?;

    // Only the playlist path pulls the massive VOD/series stream lists
    let catalog = client.fetch_catalog(params.include_vod, true).await?;

    let filter = GroupFilter::compile(&params.filter);

    let episodes = if params.include_vod {
        let series_ids = playlist::series_prefilter(&catalog.categories, &catalog.streams, &filter);
        client.resolve_episodes(&series_ids).await
    } else {
        EpisodeIndex::new()
    };

    let options = PlaylistOptions {
        server_url: session.server_url,
        username: session.username,
        password: session.password,
        proxy_base: params.resolve_proxy_base(&state.config.web.base_url),
        include_channel_id: params.include_channel_id,
        channel_id_tag: params.channel_id_tag.clone(),
    };

    let document = playlist::synthesize(
        &catalog.categories,
        &catalog.streams,
        &episodes,
        &filter,
        &options,
    );

    let filename = if params.include_vod {
        "FullPlaylist.m3u"
    } else {
        "LiveStream.m3u"
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/x-scpls")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={filename}"),
        )
        .body(Body::from(document))
        .map_err(|e| AppError::internal(format!("failed to build playlist response: {e}")))
}

/// `GET /categories` — the tagged category list, without ever touching the
/// VOD/series stream-list endpoints
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CredentialQuery>,
) -> Result<Response, AppError> {
    let credentials = query.credentials()?;
    let client = catalog_client(&state, &credentials)?;
    client.authenticate().await?;

    let catalog = client.fetch_catalog(query.include_vod.0, false).await?;
    Ok(Json(catalog.categories).into_response())
}

/// `GET /xmltv` — the upstream guide with icon URLs routed through the
/// image proxy
pub async fn generate_guide(
    State(state): State<AppState>,
    Query(query): Query<CredentialQuery>,
) -> Result<Response, AppError> {
    let credentials = query.credentials()?;
    let client = catalog_client(&state, &credentials)?;
    client.authenticate().await?;

    let document = client.fetch_guide().await?;

    let proxy_base = query
        .proxy_url
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(&state.config.web.base_url)
        .trim_end_matches('/')
        .to_string();
    let document = guide::rewrite_icon_urls(&document, &proxy_base);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=guide.xml",
        )
        .body(Body::from(document))
        .map_err(|e| AppError::internal(format!("failed to build guide response: {e}")))
}

/// `GET /stream-proxy/{url}` — passthrough for media streams
pub async fn proxy_stream(
    State(state): State<AppState>,
    Path(url): Path<String>,
) -> Result<Response, AppError> {
    streaming::passthrough(&state.http.stream, &url, ProxyKind::Stream).await
}

/// `GET /image-proxy/{url}` — passthrough for images
pub async fn proxy_image(
    State(state): State<AppState>,
    Path(url): Path<String>,
) -> Result<Response, AppError> {
    streaming::passthrough(&state.http.image, &url, ProxyKind::Image).await
}

fn catalog_client(state: &AppState, credentials: &Credentials) -> AppResult<XtreamClient> {
    XtreamClient::new(
        state.http.catalog.clone(),
        &credentials.base_url,
        &credentials.username,
        &credentials.password,
    )
}
