use async_trait::async_trait;
use axum::http::{StatusCode, header};
use chrono::{TimeZone, Utc};
use modproxy::core::direct::DirectServer;
use modproxy::core::errors::ProxyError;
use modproxy::core::request::parse;
use modproxy::core::resolver::{ModuleVersion, OriginResolver, ResolvedFile, version_info};
use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;

/// An in-memory resolver standing in for the module toolchain.
struct FakeResolver {
    module: String,
    versions: Vec<String>,
    head: String,
    zip_data: Vec<u8>,
}

impl FakeResolver {
    fn new(module: &str, versions: &[&str], head: &str, zip_data: Vec<u8>) -> Self {
        Self {
            module: module.to_string(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
            head: head.to_string(),
            zip_data,
        }
    }

    fn check_module(&self, module: &str) -> Result<(), ProxyError> {
        if module == self.module {
            Ok(())
        } else {
            Err(ProxyError::NotFound(format!("module {module}: not found")))
        }
    }
}

#[async_trait]
impl OriginResolver for FakeResolver {
    async fn list(&self, module: &str) -> Result<ResolvedFile, ProxyError> {
        self.check_module(module)?;
        let mut body = self.versions.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        Ok(ResolvedFile::new(body, SystemTime::now()))
    }

    async fn latest(&self, module: &str) -> Result<ResolvedFile, ProxyError> {
        self.check_module(module)?;
        let time = Utc.with_ymd_and_hms(2018, 10, 14, 17, 58, 6).unwrap();
        Ok(version_info(&self.head, time))
    }

    async fn info(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError> {
        self.check_module(&module.path)?;
        // Arbitrary refs resolve to the head version, the way a real
        // resolver normalizes `master`.
        let resolved = if self.versions.contains(&module.version) {
            module.version.clone()
        } else if module.version == "master" {
            self.head.clone()
        } else {
            return Err(ProxyError::NotFound(format!(
                "unknown revision {}",
                module.version
            )));
        };
        let time = Utc.with_ymd_and_hms(2018, 10, 14, 17, 58, 6).unwrap();
        Ok(version_info(&resolved, time))
    }

    async fn go_mod(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError> {
        self.check_module(&module.path)?;
        let body = format!("module {}\n", module.path);
        Ok(ResolvedFile::new(body, SystemTime::now()))
    }

    async fn zip(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError> {
        self.check_module(&module.path)?;
        Ok(ResolvedFile::new(self.zip_data.clone(), SystemTime::now()))
    }
}

fn build_zip(prefix: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, contents) in files {
        writer.start_file(format!("{prefix}/{name}"), options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn vgotest_server() -> DirectServer {
    let resolver = FakeResolver::new(
        "github.com/rsc/vgotest1",
        &[
            "v0.0.0",
            "v0.0.1",
            "v1.0.0",
            "v1.0.1",
            "v1.0.2",
            "v1.0.3",
            "v1.1.0",
            "v2.0.0+incompatible",
        ],
        "v1.1.0",
        build_zip(
            "github.com/rsc/vgotest1@v1.0.0",
            &[("go.mod", "module github.com/rsc/vgotest1\n"), ("pkg/p.go", "package p\n")],
        ),
    );
    DirectServer::new(Arc::new(resolver))
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_version_list_body() {
    let server = vgotest_server();
    let request = parse("/github.com/rsc/vgotest1/@v/list").unwrap();
    let response = server.serve(&request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=UTF-8"
    );
    let body = body_bytes(response).await;
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "v0.0.0\nv0.0.1\nv1.0.0\nv1.0.1\nv1.0.2\nv1.0.3\nv1.1.0\nv2.0.0+incompatible\n"
    );
}

#[tokio::test]
async fn test_empty_version_list_has_empty_body() {
    let resolver = FakeResolver::new("example.com/empty", &[], "v0.0.1", Vec::new());
    let server = DirectServer::new(Arc::new(resolver));
    let request = parse("/example.com/empty/@v/list").unwrap();
    let response = server.serve(&request).await.unwrap();
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_latest_info_json() {
    let server = vgotest_server();
    let request = parse("/github.com/rsc/vgotest1/@latest").unwrap();
    let response = server.serve(&request).await.unwrap();

    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("\"Version\":\"v1.1.0\""), "body: {body}");
    assert!(body.contains("\"Time\":\"2018-10-14T17:58:06Z\""), "body: {body}");
}

#[tokio::test]
async fn test_info_for_escaped_module_path() {
    let resolver = FakeResolver::new(
        "github.com/PuerkitoBio/goquery",
        &["v0.0.0-20181014175806-2af3d16e2bb8"],
        "v0.0.0-20181014175806-2af3d16e2bb8",
        Vec::new(),
    );
    let server = DirectServer::new(Arc::new(resolver));
    let request =
        parse("/github.com/!puerkito!bio/goquery/@v/v0.0.0-20181014175806-2af3d16e2bb8.info")
            .unwrap();
    let response = server.serve(&request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(
        body.contains("\"Version\":\"v0.0.0-20181014175806-2af3d16e2bb8\""),
        "body: {body}"
    );
    assert!(body.contains("\"Time\":\"2018-10-14T17:58:06Z\""), "body: {body}");
}

#[tokio::test]
async fn test_info_accepts_arbitrary_ref() {
    let server = vgotest_server();
    let request = parse("/github.com/rsc/vgotest1/@v/master.info").unwrap();
    let response = server.serve(&request).await.unwrap();
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("\"Version\":\"v1.1.0\""), "body: {body}");
}

#[tokio::test]
async fn test_latest_token_is_disallowed_outside_latest_info() {
    let server = vgotest_server();
    let request = parse("/github.com/rsc/vgotest1/@v/latest.info").unwrap();
    let err = server.serve(&request).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(err.to_string(), "version latest is disallowed");
}

#[tokio::test]
async fn test_non_canonical_version_is_rejected() {
    let server = vgotest_server();
    for path in [
        "/github.com/rsc/vgotest1/@v/v1.0.zip",
        "/github.com/rsc/vgotest1/@v/master.mod",
        "/github.com/rsc/vgotest1/@v/v1.0.0+build.zip",
    ] {
        let request = parse(path).unwrap();
        let err = server.serve(&request).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND, "path: {path}");
        assert!(
            err.to_string().contains("is not in canonical form"),
            "path: {path}, err: {err}"
        );
    }
}

#[tokio::test]
async fn test_unknown_module_is_not_found() {
    let server = vgotest_server();
    let request = parse("/example.com/nope/@v/list").unwrap();
    let err = server.serve(&request).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zip_archive_entries_are_prefixed() {
    let server = vgotest_server();
    let request = parse("/github.com/rsc/vgotest1/@v/v1.0.0.zip").unwrap();
    let response = server.serve(&request).await.unwrap();

    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let body = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body)).unwrap();
    assert!(archive.len() > 0);
    for i in 0..archive.len() {
        let name = archive.by_index(i).unwrap().name().to_string();
        assert!(
            name.starts_with("github.com/rsc/vgotest1@v1.0.0/"),
            "entry {name} is not prefixed"
        );
    }
}
