//! M3U playlist synthesis
//!
//! Turns the aggregated catalog into the output playlist document. Streams
//! are processed in catalog order; series entries expand into one record per
//! resolved episode, sorted by numeric season. Media and logo URLs are
//! rewritten through the proxy endpoints unless proxying is disabled for the
//! request, in which case the direct upstream URLs pass through unchanged.
//!
//! Synthesis is deterministic: identical inputs produce byte-identical
//! output.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::filtering::GroupFilter;
use crate::models::{Category, ContentKind, Episode, EpisodeIndex, SeasonMap, StreamEntry};
use crate::utils::UrlUtils;

/// Per-request synthesis options
#[derive(Debug, Clone)]
pub struct PlaylistOptions {
    /// Media server base (`http://host:port`) from the auth response
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Proxy base for URL rewriting; `None` disables rewriting entirely
    pub proxy_base: Option<String>,
    /// Emit a caller-named tag carrying the entry's EPG channel id
    pub include_channel_id: bool,
    pub channel_id_tag: String,
}

/// One emitted playlist entry: a metadata line, an optional size directive,
/// and the media URL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRecord {
    /// Value of the `tvg-name` tag (the channel/series name)
    pub tvg_name: String,
    /// Display name after the comma; differs from `tvg_name` for episodes
    pub display_name: String,
    pub group_title: String,
    pub logo_url: Option<String>,
    pub media_url: String,
    /// Additional `key="value"` tags in emission order
    pub extra_tags: Vec<(String, String)>,
    /// Emits an `#EXTBYT:` directive when the upstream reported a size
    pub byte_size: Option<u64>,
}

impl PlaylistRecord {
    fn write_to(&self, out: &mut String) {
        out.push_str("#EXTINF:0");
        out.push_str(&format!(" tvg-name=\"{}\"", self.tvg_name));
        out.push_str(&format!(" group-title=\"{}\"", self.group_title));
        if let Some(logo) = &self.logo_url {
            out.push_str(&format!(" tvg-logo=\"{logo}\""));
        }
        for (key, value) in &self.extra_tags {
            out.push_str(&format!(" {key}=\"{value}\""));
        }
        out.push(',');
        out.push_str(&self.display_name);
        out.push('\n');
        if let Some(size) = self.byte_size {
            out.push_str(&format!("#EXTBYT:{size}\n"));
        }
        out.push_str(&self.media_url);
        out.push('\n');
    }
}

/// Compute the group title for a stream: the raw category name for live,
/// content-kind-prefixed for VOD and series
pub fn group_title_for(kind: ContentKind, category_name: &str) -> String {
    match kind {
        ContentKind::Live => category_name.to_string(),
        ContentKind::Vod => format!("VOD - {category_name}"),
        ContentKind::Series => format!("Series - {category_name}"),
    }
}

/// Select the series ids whose episodes are worth resolving
///
/// Applies the same inclusion test as synthesis to series entries only, so
/// excluded series never cost an episode-listing round-trip.
pub fn series_prefilter(
    categories: &[Category],
    streams: &[StreamEntry],
    filter: &GroupFilter,
) -> Vec<String> {
    let category_names = category_name_lookup(categories);

    streams
        .iter()
        .filter(|stream| stream.kind == ContentKind::Series)
        .filter(|stream| {
            let category_name = resolve_category_name(&category_names, stream);
            let group_title = group_title_for(ContentKind::Series, category_name);
            filter.includes(category_name, &group_title)
        })
        .filter_map(|stream| stream.series_id.clone())
        .collect()
}

/// Synthesize the playlist document
pub fn synthesize(
    categories: &[Category],
    streams: &[StreamEntry],
    episodes: &EpisodeIndex,
    filter: &GroupFilter,
    options: &PlaylistOptions,
) -> String {
    let category_names = category_name_lookup(categories);

    let mut playlist = String::from("#EXTM3U\n");
    let mut record_count = 0usize;

    for stream in streams {
        let category_name = resolve_category_name(&category_names, stream);
        let group_title = group_title_for(stream.kind, category_name);

        if !filter.includes(category_name, &group_title) {
            continue;
        }

        for record in build_records(stream, group_title, episodes, options) {
            record.write_to(&mut playlist);
            record_count += 1;
        }
    }

    debug!(
        "Synthesized playlist with {} records from {} streams",
        record_count,
        streams.len()
    );
    playlist
}

fn category_name_lookup(categories: &[Category]) -> HashMap<&str, &str> {
    categories
        .iter()
        .map(|category| (category.category_id.as_str(), category.category_name.as_str()))
        .collect()
}

fn resolve_category_name<'a>(
    category_names: &HashMap<&str, &'a str>,
    stream: &StreamEntry,
) -> &'a str {
    stream
        .category_id
        .as_deref()
        .and_then(|id| category_names.get(id).copied())
        .unwrap_or("Uncategorized")
}

fn build_records(
    stream: &StreamEntry,
    group_title: String,
    episodes: &EpisodeIndex,
    options: &PlaylistOptions,
) -> Vec<PlaylistRecord> {
    let name = match stream.kind {
        ContentKind::Series => stream.name.as_deref().unwrap_or("Unknown Series"),
        _ => stream.name.as_deref().unwrap_or("Unknown"),
    };

    let logo_url = stream
        .stream_icon
        .as_deref()
        .filter(|icon| !icon.is_empty())
        .map(|icon| routed_image_url(options, icon));

    let mut base_tags = Vec::new();
    if options.include_channel_id
        && let Some(channel_id) = stream.epg_channel_id.as_deref().filter(|id| !id.is_empty())
    {
        base_tags.push((options.channel_id_tag.clone(), channel_id.to_string()));
    }

    match stream.kind {
        ContentKind::Live => {
            let Some(stream_id) = stream.stream_id.as_deref() else {
                warn!("Skipping live stream '{}' without a stream id", name);
                return Vec::new();
            };
            let media_url = direct_media_url(options, ContentKind::Live, stream_id, "ts");
            vec![single_record(stream, name, group_title, logo_url, base_tags, media_url, options)]
        }
        ContentKind::Vod => {
            let Some(stream_id) = stream.stream_id.as_deref() else {
                warn!("Skipping VOD entry '{}' without a stream id", name);
                return Vec::new();
            };
            let extension = container_extension_or_default(stream.container_extension.as_deref());
            let media_url = direct_media_url(options, ContentKind::Vod, stream_id, extension);
            vec![single_record(stream, name, group_title, logo_url, base_tags, media_url, options)]
        }
        ContentKind::Series => {
            let seasons = stream.series_id.as_deref().and_then(|id| episodes.get(id));
            match seasons {
                Some(seasons) => episode_records(
                    seasons, name, group_title, logo_url, &base_tags, options,
                ),
                None => {
                    // No resolved episodes: one fallback record on the series id
                    let fallback_id = stream
                        .series_id
                        .clone()
                        .or_else(|| stream.stream_id.clone())
                        .unwrap_or_default();
                    let media_url =
                        direct_media_url(options, ContentKind::Series, &fallback_id, "mp4");
                    vec![single_record(
                        stream, name, group_title, logo_url, base_tags, media_url, options,
                    )]
                }
            }
        }
    }
}

fn single_record(
    stream: &StreamEntry,
    name: &str,
    group_title: String,
    logo_url: Option<String>,
    mut extra_tags: Vec<(String, String)>,
    media_url: String,
    options: &PlaylistOptions,
) -> PlaylistRecord {
    if let Some(added) = stream.added.as_deref().filter(|a| !a.is_empty()) {
        extra_tags.push(("added".to_string(), added.to_string()));
    }

    PlaylistRecord {
        tvg_name: name.to_string(),
        display_name: name.to_string(),
        group_title,
        logo_url,
        media_url: routed_media_url(options, media_url),
        extra_tags,
        byte_size: stream.size,
    }
}

fn episode_records(
    seasons: &SeasonMap,
    name: &str,
    group_title: String,
    logo_url: Option<String>,
    base_tags: &[(String, String)],
    options: &PlaylistOptions,
) -> Vec<PlaylistRecord> {
    let mut records = Vec::new();

    for (season_key, season_episodes) in seasons_in_order(seasons) {
        for (position, episode) in season_episodes.iter().enumerate() {
            records.push(episode_record(
                episode, position, season_key, name, &group_title, &logo_url, base_tags, options,
            ));
        }
    }

    records
}

#[allow(clippy::too_many_arguments)]
fn episode_record(
    episode: &Episode,
    position: usize,
    season_key: &str,
    name: &str,
    group_title: &str,
    logo_url: &Option<String>,
    base_tags: &[(String, String)],
    options: &PlaylistOptions,
) -> PlaylistRecord {
    let episode_label = episode
        .episode_num
        .clone()
        .unwrap_or_else(|| (position + 1).to_string());
    let display_name = format!(
        "{} - S{:0>2} - E{:0>2} - {}",
        name,
        season_key,
        episode_label,
        episode.title.as_deref().unwrap_or_default()
    );

    let extension = container_extension_or_default(episode.container_extension.as_deref());
    let media_url = direct_media_url(options, ContentKind::Series, &episode.id, extension);

    let mut extra_tags = base_tags.to_vec();
    if let Some(added) = episode.added.as_deref().filter(|a| !a.is_empty()) {
        extra_tags.push(("added".to_string(), added.to_string()));
    }

    PlaylistRecord {
        tvg_name: name.to_string(),
        display_name,
        group_title: group_title.to_string(),
        logo_url: logo_url.clone(),
        media_url: routed_media_url(options, media_url),
        extra_tags,
        byte_size: episode.size,
    }
}

/// Seasons ordered numerically ascending; non-numeric keys sort last in
/// their stored order
fn seasons_in_order(seasons: &SeasonMap) -> Vec<(&str, &Vec<Episode>)> {
    let mut entries: Vec<(&str, &Vec<Episode>)> = seasons
        .iter()
        .map(|(key, episodes)| (key.as_str(), episodes))
        .collect();
    entries.sort_by_key(|(key, _)| match key.parse::<u64>() {
        Ok(number) => (0u8, number),
        Err(_) => (1u8, 0),
    });
    entries
}

fn container_extension_or_default(extension: Option<&str>) -> &str {
    match extension {
        Some(ext) if !ext.is_empty() => ext,
        _ => "mp4",
    }
}

fn direct_media_url(options: &PlaylistOptions, kind: ContentKind, id: &str, ext: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}.{}",
        options.server_url,
        kind.media_path_segment(),
        options.username,
        options.password,
        id,
        ext
    )
}

fn routed_media_url(options: &PlaylistOptions, media_url: String) -> String {
    match &options.proxy_base {
        Some(base) => format!(
            "{}/stream-proxy/{}",
            base,
            UrlUtils::encode_component(&media_url)
        ),
        None => media_url,
    }
}

fn routed_image_url(options: &PlaylistOptions, image_url: &str) -> String {
    match &options.proxy_base {
        Some(base) => format!(
            "{}/image-proxy/{}",
            base,
            UrlUtils::encode_component(image_url)
        ),
        None => image_url.to_string(),
    }
}
