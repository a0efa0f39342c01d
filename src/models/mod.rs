//! Domain models for the Xtream proxy
//!
//! These types mirror the upstream Xtream Codes API payloads closely enough
//! to deserialize real-world servers, which are notoriously loose about
//! types: numeric ids arrive as strings or integers depending on the panel
//! software, sizes arrive as strings, integers, or floats. The
//! string-or-number visitors at the bottom of this module normalize all of
//! that at the deserialization boundary so the rest of the crate only deals
//! with `String` identifiers and `u64` sizes.
//!
//! All catalog entities are request-scoped: they are built from one upstream
//! fetch, consumed by one synthesis pass, and dropped with the response.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Classification of a catalog entry
///
/// The upstream API does not label content kind itself; the catalog fetcher
/// tags every category and stream with the kind of the endpoint it came
/// from. The enum is closed on purpose: synthesis and URL building match on
/// it exhaustively, so adding a kind is a compile-time-checked extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Live,
    Vod,
    Series,
}

impl ContentKind {
    /// Path segment used when building upstream media URLs
    /// (`http://host:port/<segment>/<user>/<pass>/<id>.<ext>`)
    pub fn media_path_segment(self) -> &'static str {
        match self {
            ContentKind::Live => "live",
            ContentKind::Vod => "movie",
            ContentKind::Series => "series",
        }
    }
}

/// A category as returned by the `get_*_categories` endpoints,
/// tagged with the content kind of its endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "string_or_number")]
    pub category_id: String,
    pub category_name: String,
    #[serde(rename = "content_type", default)]
    pub kind: ContentKind,
}

/// A stream, VOD entry, or series as returned by the stream-list endpoints
///
/// Live and VOD entries carry a `stream_id`; series carry a `series_id`.
/// `added` and `size` are only populated by servers that expose them and
/// feed the richer playlist tags (`added="..."`, `#EXTBYT:`).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub stream_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub series_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub added: Option<String>,
    #[serde(default, deserialize_with = "opt_u64_lenient")]
    pub size: Option<u64>,
    #[serde(skip)]
    pub kind: ContentKind,
}

/// One episode from a `get_series_info` response
#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub episode_num: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub season: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub added: Option<String>,
    #[serde(default, deserialize_with = "opt_u64_lenient")]
    pub size: Option<u64>,
}

/// Season number (as the upstream's string key) → episodes in returned order
pub type SeasonMap = BTreeMap<String, Vec<Episode>>;

/// Series id → season map, built once per request for the series that
/// survived the group pre-filter
pub type EpisodeIndex = HashMap<String, SeasonMap>;

/// The aggregated catalog produced by one fetch pass
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub streams: Vec<StreamEntry>,
}

/// Group filter as supplied by the caller
///
/// If `wanted` is non-empty the filter runs in inclusion mode and `unwanted`
/// is ignored entirely; only an empty `wanted` activates exclusion mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub wanted: Vec<String>,
    pub unwanted: Vec<String>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.wanted.is_empty() && self.unwanted.is_empty()
    }
}

// --- serde helpers ----------------------------------------------------------
//
// Xtream panels disagree on whether ids are strings or integers, and sizes
// additionally show up as floats. These visitors accept all of them.

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct StringOrNumberVisitor;

    impl<'de> Visitor<'de> for StringOrNumberVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumberVisitor)
}

pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct OptStringOrNumberVisitor;

    impl<'de> Visitor<'de> for OptStringOrNumberVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string, number, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value.to_string()))
            }
        }
    }

    deserializer.deserialize_any(OptStringOrNumberVisitor)
}

pub(crate) fn opt_u64_lenient<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct OptU64Visitor;

    impl<'de> Visitor<'de> for OptU64Visitor {
        type Value = Option<u64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an unsigned integer, numeric string, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(u64::try_from(value).ok())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value.is_finite() && value >= 0.0 {
                Ok(Some(value as u64))
            } else {
                Ok(None)
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.trim().parse().ok())
        }
    }

    deserializer.deserialize_any(OptU64Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_accepts_numeric_and_string_ids() {
        let cat: Category =
            serde_json::from_value(json!({"category_id": 7, "category_name": "News"})).unwrap();
        assert_eq!(cat.category_id, "7");
        assert_eq!(cat.kind, ContentKind::Live);

        let cat: Category =
            serde_json::from_value(json!({"category_id": "12", "category_name": "Sports"}))
                .unwrap();
        assert_eq!(cat.category_id, "12");
    }

    #[test]
    fn test_stream_entry_size_accepts_string_and_int() {
        let entry: StreamEntry = serde_json::from_value(json!({
            "name": "Movie",
            "stream_id": 101,
            "category_id": "1",
            "size": "104857600"
        }))
        .unwrap();
        assert_eq!(entry.size, Some(104_857_600));

        let entry: StreamEntry = serde_json::from_value(json!({
            "name": "Movie",
            "stream_id": "101",
            "size": 52428800
        }))
        .unwrap();
        assert_eq!(entry.stream_id.as_deref(), Some("101"));
        assert_eq!(entry.size, Some(52_428_800));
    }

    #[test]
    fn test_episode_requires_id() {
        let ok: Result<Episode, _> =
            serde_json::from_value(json!({"id": "ep1", "episode_num": 1, "title": "Pilot"}));
        assert!(ok.is_ok());

        let missing: Result<Episode, _> = serde_json::from_value(json!({"episode_num": 1}));
        assert!(missing.is_err());
    }

    #[test]
    fn test_content_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ContentKind::Series).unwrap(),
            "\"series\""
        );
        assert_eq!(ContentKind::Vod.media_path_segment(), "movie");
    }
}
