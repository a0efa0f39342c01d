//! Integration tests for the /stream-proxy and /image-proxy passthrough
//! endpoints against in-process mock origins.

mod support;

use std::convert::Infallible;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::StreamExt;

use support::{spawn_app, spawn_default_app, spawn_server, unreachable_addr};
use xtream_proxy::config::Config;
use xtream_proxy::utils::UrlUtils;

fn proxied(app: std::net::SocketAddr, endpoint: &str, target: &str) -> String {
    format!(
        "http://{}/{}/{}",
        app,
        endpoint,
        UrlUtils::encode_component(target)
    )
}

#[tokio::test]
async fn test_stream_proxy_forwards_body_and_content_length() {
    let payload = vec![0xABu8; 4096];
    let body = payload.clone();
    let origin = spawn_server(Router::new().route(
        "/live/1.ts",
        get(move || {
            let body = body.clone();
            async move {
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "video/mp2t")
                    .header(header::CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap()
            }
        }),
    ))
    .await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "stream-proxy", &format!("http://{origin}/live/1.ts")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp2t");
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        payload.len().to_string().as_str()
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), payload.as_slice());
}

#[tokio::test]
async fn test_stream_proxy_stays_chunked_for_chunked_upstream() {
    let origin = spawn_server(Router::new().route(
        "/live/2.ts",
        get(|| async {
            let chunks: Vec<Result<Bytes, Infallible>> = vec![
                Ok(Bytes::from_static(b"first-")),
                Ok(Bytes::from_static(b"second-")),
                Ok(Bytes::from_static(b"third")),
            ];
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "video/mp2t")
                .body(Body::from_stream(futures::stream::iter(chunks)))
                .unwrap()
        }),
    ))
    .await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "stream-proxy", &format!("http://{origin}/live/2.ts")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"first-second-third");
}

#[tokio::test]
async fn test_stream_proxy_ends_cleanly_when_upstream_dies_mid_stream() {
    let origin = spawn_server(Router::new().route(
        "/live/3.ts",
        get(|| async {
            let failing = async_stream::stream! {
                for _ in 0..3 {
                    yield Ok::<Bytes, std::io::Error>(Bytes::from(vec![0x47u8; 188]));
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                yield Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "upstream reset",
                ));
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "video/mp2t")
                .body(Body::from_stream(failing))
                .unwrap()
        }),
    ))
    .await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "stream-proxy", &format!("http://{origin}/live/3.ts")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The body ends after exactly the bytes that made it through; the relay
    // terminates the chunked stream cleanly instead of erroring
    let mut received = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received.len(), 3 * 188);
    assert!(received.iter().all(|byte| *byte == 0x47));
}

#[tokio::test]
async fn test_stream_proxy_forwards_upstream_error_status() {
    let origin = spawn_server(
        Router::new().route("/missing.ts", get(|| async { StatusCode::NOT_FOUND })),
    )
    .await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "stream-proxy", &format!("http://{origin}/missing.ts")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_stream_proxy_infers_content_type_from_extension() {
    let origin = spawn_server(Router::new().route(
        "/bare/4.ts",
        get(|| async {
            // No Content-Type header from the origin
            Response::builder()
                .status(StatusCode::OK)
                .body(Body::from_stream(futures::stream::iter(vec![Ok::<
                    Bytes,
                    Infallible,
                >(
                    Bytes::from_static(b"data"),
                )])))
                .unwrap()
        }),
    ))
    .await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "stream-proxy", &format!("http://{origin}/bare/4.ts")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/MP2T");
}

#[tokio::test]
async fn test_stream_proxy_unreachable_origin_returns_500() {
    let origin = unreachable_addr().await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "stream-proxy", &format!("http://{origin}/live/5.ts")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_image_proxy_forwards_images() {
    let png_bytes: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let origin = spawn_server(Router::new().route(
        "/logo.png",
        get(move || async move {
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "image/png")
                .body(Body::from(png_bytes))
                .unwrap()
        }),
    ))
    .await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "image-proxy", &format!("http://{origin}/logo.png")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.bytes().await.unwrap().as_ref(), png_bytes);
}

#[tokio::test]
async fn test_image_proxy_rejects_non_image_content() {
    let origin = spawn_server(Router::new().route(
        "/logo.png",
        get(|| async {
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/html")
                .body(Body::from("<html>not an image</html>"))
                .unwrap()
        }),
    ))
    .await;
    let app = spawn_default_app().await;

    let response = reqwest::Client::new()
        .get(proxied(app, "image-proxy", &format!("http://{origin}/logo.png")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 415);
}

#[tokio::test]
async fn test_image_proxy_times_out_slow_origin() {
    let origin = spawn_server(Router::new().route(
        "/slow.png",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    ))
    .await;

    let mut config = Config::default();
    config.web.base_url = "http://proxy.test".to_string();
    config.http.image_timeout = Duration::from_millis(250);
    let app = spawn_app(config).await;

    let response = reqwest::Client::new()
        .get(proxied(app, "image-proxy", &format!("http://{origin}/slow.png")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 504);
}
