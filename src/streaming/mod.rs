//! Pass-through byte relay for proxied media and images
//!
//! Forwards an upstream HTTP response body to the caller chunk by chunk,
//! without ever holding the full payload in memory. Backpressure is implicit:
//! both sides of the copy are chunk-synchronous, so the client's read rate
//! paces the upstream fetch rate.
//!
//! # Failure model
//!
//! Once the outbound response has started, nothing is allowed to raise —
//! injecting an error after the headers are committed would corrupt the
//! chunked framing instead of producing a clean error. Mid-stream transport
//! failures therefore terminate the relay silently; the bytes already sent
//! stand as the final response. The terminal state is modeled explicitly as
//! a [`RelayOutcome`] rather than a swallowed exception. Failures *before*
//! streaming starts surface as distinct HTTP statuses: timeout → 504,
//! upstream HTTP error → the upstream's own status, wrong content category
//! on the image variant → 415, anything else → 500.
//!
//! The upstream response handle is dropped on every exit path — completion,
//! mid-stream error, or client disconnect — which releases the connection.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode, header};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::utils::UrlUtils;

/// How a relayed stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    /// Upstream body was forwarded to completion
    Completed,
    /// Upstream failed mid-stream; the partial bytes stand as the response
    UpstreamClosed,
}

/// Terminal result of one relayed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub bytes_copied: u64,
    pub status: RelayStatus,
}

/// Which passthrough endpoint is being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Stream,
    Image,
}

/// Wrap an upstream byte stream into an infallible outbound stream
///
/// Upstream errors end the stream instead of propagating; `on_done` receives
/// the terminal outcome when the relay finishes. The callback does not run if
/// the client disconnects first — dropping the stream is its own clean exit.
pub fn relay_stream<S, E, F>(
    upstream: S,
    on_done: F,
) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
    F: FnOnce(RelayOutcome),
{
    async_stream::stream! {
        let mut upstream = std::pin::pin!(upstream);
        let mut bytes_copied: u64 = 0;

        let status = loop {
            match upstream.next().await {
                Some(Ok(chunk)) => {
                    bytes_copied += chunk.len() as u64;
                    yield Ok::<Bytes, Infallible>(chunk);
                }
                Some(Err(err)) => {
                    warn!("Upstream closed after {} bytes: {}", bytes_copied, err);
                    break RelayStatus::UpstreamClosed;
                }
                None => break RelayStatus::Completed,
            }
        };

        on_done(RelayOutcome { bytes_copied, status });
    }
}

/// Content type inferred from the requested path when the upstream does not
/// provide one
pub fn content_type_for_path(url: &str) -> &'static str {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if path.ends_with(".ts") {
        "video/MP2T"
    } else if path.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else {
        "application/octet-stream"
    }
}

/// Content-Length to forward: only when the upstream provided one and is not
/// using a transfer encoding; everything else goes out chunked
pub fn forwarded_content_length(headers: &HeaderMap) -> Option<u64> {
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return None;
    }
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Fetch `target_url` and relay its body to the caller
pub async fn passthrough(
    client: &Client,
    target_url: &str,
    kind: ProxyKind,
) -> AppResult<Response<Body>> {
    let display_url = UrlUtils::obfuscate_credentials(target_url);
    debug!("Proxy request for {}", display_url);

    let response = client
        .get(target_url)
        .send()
        .await
        .map_err(pre_stream_error)?;

    let upstream_status = response.status();
    if !upstream_status.is_success() {
        return Err(AppError::ProxyUpstreamHttp {
            status: StatusCode::from_u16(upstream_status.as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY),
        });
    }

    let header_content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let content_type = match kind {
        ProxyKind::Image => {
            let content_type = header_content_type.unwrap_or_default();
            if !content_type.starts_with("image/") {
                return Err(AppError::ProxyUnsupportedContentType { content_type });
            }
            content_type
        }
        ProxyKind::Stream => {
            header_content_type.unwrap_or_else(|| content_type_for_path(target_url).to_string())
        }
    };

    let content_length = forwarded_content_length(response.headers());
    debug!(
        "Relaying {} (content-type: {}, content-length: {:?})",
        display_url, content_type, content_length
    );

    let body = Body::from_stream(relay_stream(response.bytes_stream(), move |outcome| {
        debug!(
            "Relay for {} ended ({:?}) after {} bytes",
            display_url, outcome.status, outcome.bytes_copied
        );
    }));

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");

    if let Some(length) = content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(body)
        .map_err(|e| AppError::internal(format!("failed to build relay response: {e}")))
}

fn pre_stream_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::ProxyUpstreamTimeout
    } else {
        AppError::proxy_failure(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::mpsc;

    fn collect_relay(
        chunks: Vec<Result<Bytes, &'static str>>,
    ) -> (Vec<Bytes>, RelayOutcome) {
        let (tx, rx) = mpsc::channel();
        let relayed = relay_stream(stream::iter(chunks), move |outcome| {
            tx.send(outcome).unwrap();
        });
        let collected: Vec<Result<Bytes, Infallible>> =
            tokio_test::block_on(relayed.collect::<Vec<_>>());
        let bytes = collected.into_iter().map(|item| item.unwrap()).collect();
        (bytes, rx.recv().unwrap())
    }

    #[test]
    fn test_relay_forwards_all_chunks_on_success() {
        let (bytes, outcome) = collect_relay(vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ]);
        assert_eq!(bytes.concat(), b"hello world");
        assert_eq!(
            outcome,
            RelayOutcome {
                bytes_copied: 11,
                status: RelayStatus::Completed,
            }
        );
    }

    #[test]
    fn test_relay_ends_silently_on_mid_stream_error() {
        let (bytes, outcome) = collect_relay(vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"de")),
            Err("connection reset"),
            Ok(Bytes::from_static(b"never delivered")),
        ]);
        // Exactly the bytes before the failure, no error payload after
        assert_eq!(bytes.concat(), b"abcde");
        assert_eq!(
            outcome,
            RelayOutcome {
                bytes_copied: 5,
                status: RelayStatus::UpstreamClosed,
            }
        );
    }

    #[test]
    fn test_relay_of_empty_stream_completes() {
        let (bytes, outcome) = collect_relay(vec![]);
        assert!(bytes.is_empty());
        assert_eq!(outcome.status, RelayStatus::Completed);
        assert_eq!(outcome.bytes_copied, 0);
    }

    #[test]
    fn test_content_type_inference_by_extension() {
        assert_eq!(content_type_for_path("http://h/live/1.ts"), "video/MP2T");
        assert_eq!(
            content_type_for_path("http://h/playlist.m3u8"),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(
            content_type_for_path("http://h/playlist.m3u8?token=abc"),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(
            content_type_for_path("http://h/movie.mkv"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_content_length_forwarded_only_without_transfer_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "1000".parse().unwrap());
        assert_eq!(forwarded_content_length(&headers), Some(1000));

        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        assert_eq!(forwarded_content_length(&headers), None);

        let empty = HeaderMap::new();
        assert_eq!(forwarded_content_length(&empty), None);

        let mut invalid = HeaderMap::new();
        invalid.insert(header::CONTENT_LENGTH, "not-a-number".parse().unwrap());
        assert_eq!(forwarded_content_length(&invalid), None);
    }
}
