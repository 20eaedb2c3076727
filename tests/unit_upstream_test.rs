use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use modproxy::core::cache::CacheStore;
use modproxy::core::request::parse;
use modproxy::core::upstream::UpstreamProxy;
use std::io::Write;
use std::net::SocketAddr;
use url::Url;

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn proxy_for(addr: SocketAddr) -> UpstreamProxy {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let base = Url::parse(&format!("http://{addr}")).unwrap();
    UpstreamProxy::new(client, base)
}

fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_success_is_relayed_and_cached() {
    let upstream = Router::new().fallback(|| async {
        (
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"Version":"v1.0.0","Time":"2023-01-01T00:00:00Z"}"#,
        )
    });
    let addr = spawn_server(upstream).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    let request = parse("/example.com/m/@v/v1.0.0.info").unwrap();

    let response = proxy_for(addr).fetch(&cache, &request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body = body_bytes(response).await;

    let cached = tokio::fs::read(dir.path().join("example.com/m/@v/v1.0.0.info"))
        .await
        .unwrap();
    assert_eq!(cached, body);
    assert_eq!(
        body,
        br#"{"Version":"v1.0.0","Time":"2023-01-01T00:00:00Z"}"#
    );
}

#[tokio::test]
async fn test_gzip_body_is_decompressed_before_caching() {
    let payload = b"module example.com/m\n".to_vec();
    let compressed = gzip_bytes(&payload);
    let upstream = Router::new().fallback(move || {
        let compressed = compressed.clone();
        async move {
            (
                [
                    (header::CONTENT_ENCODING, "gzip"),
                    (header::CONTENT_TYPE, "text/plain; charset=UTF-8"),
                ],
                compressed,
            )
        }
    });
    let addr = spawn_server(upstream).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    let request = parse("/example.com/m/@v/v1.0.0.mod").unwrap();

    let response = proxy_for(addr).fetch(&cache, &request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // The encoding header is not relayed; the body is already plain.
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body_bytes(response).await, payload);

    let cached = tokio::fs::read(dir.path().join("example.com/m/@v/v1.0.0.mod"))
        .await
        .unwrap();
    assert_eq!(cached, payload);
}

#[tokio::test]
async fn test_redirect_is_followed_once_and_cached_under_original_path() {
    let mirror = Router::new().fallback(|| async { "mirror payload" });
    let mirror_addr = spawn_server(mirror).await;

    let upstream = Router::new().fallback(move || async move {
        (
            StatusCode::FOUND,
            [(
                header::LOCATION,
                format!("http://{mirror_addr}/elsewhere/blob"),
            )],
        )
    });
    let addr = spawn_server(upstream).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    let request = parse("/example.com/m/@v/v1.0.0.zip").unwrap();

    let response = proxy_for(addr).fetch(&cache, &request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"mirror payload");

    let cached = tokio::fs::read(dir.path().join("example.com/m/@v/v1.0.0.zip"))
        .await
        .unwrap();
    assert_eq!(cached, b"mirror payload");
}

#[tokio::test]
async fn test_redirect_without_location_is_an_error() {
    let upstream = Router::new().fallback(|| async { StatusCode::FOUND });
    let addr = spawn_server(upstream).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    let request = parse("/example.com/m/@v/v1.0.0.zip").unwrap();

    let err = proxy_for(addr).fetch(&cache, &request).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_other_statuses_are_relayed_uncached() {
    let upstream =
        Router::new().fallback(|| async { (StatusCode::NOT_FOUND, "not found: no such module") });
    let addr = spawn_server(upstream).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    let request = parse("/example.com/m/@v/v9.9.9.info").unwrap();

    let response = proxy_for(addr).fetch(&cache, &request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(response).await, b"not found: no such module");
    assert!(
        tokio::fs::metadata(dir.path().join("example.com/m/@v/v9.9.9.info"))
            .await
            .is_err()
    );
}
