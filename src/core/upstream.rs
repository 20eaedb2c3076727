// src/core/upstream.rs

//! The proxied fetch path: forward one request to the configured upstream,
//! materialize the response into the download cache, and relay it.

use crate::core::cache::CacheStore;
use crate::core::errors::ProxyError;
use crate::core::request::ModRequest;
use crate::core::response::relay_response;
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;
use url::Url;

pub struct UpstreamProxy {
    client: reqwest::Client,
    base: Url,
}

impl UpstreamProxy {
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    /// The outbound URL keeps the original escaped path and query-free shape;
    /// only scheme and host (and any upstream path prefix) come from the
    /// configured base.
    fn target_url(&self, fingerprint: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), fingerprint)
    }

    /// Forwards the request, applying the response rules in order: a 200 is
    /// decompressed if needed, persisted, and relayed; a 302 is followed once
    /// with a fresh GET and the followed response goes through the same
    /// rules; anything else is relayed unchanged and left uncached.
    pub async fn fetch(
        &self,
        cache: &CacheStore,
        request: &ModRequest,
    ) -> Result<Response, ProxyError> {
        let url = self.target_url(&request.fingerprint);
        let mut resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;
        let mut followed = false;

        loop {
            let status = resp.status();

            if status == StatusCode::OK {
                let content_type = header_value(&resp, header::CONTENT_TYPE);
                let gzipped = header_value(&resp, header::CONTENT_ENCODING)
                    .is_some_and(|enc| enc.to_ascii_lowercase().contains("gzip"));
                let mut body = resp
                    .bytes()
                    .await
                    .map_err(|e| ProxyError::Upstream(e.to_string()))?;
                if gzipped {
                    body = Bytes::from(gunzip(&body)?);
                }
                // The cache write completes before the response is produced;
                // a write failure fails the whole request.
                cache.store(&request.fingerprint, &body).await?;
                return Ok(relay_response(
                    StatusCode::OK,
                    content_type.as_deref(),
                    body,
                ));
            }

            if status == StatusCode::FOUND && !followed {
                let location = header_value(&resp, header::LOCATION).ok_or_else(|| {
                    ProxyError::Upstream(format!("upstream redirect for {url} carries no Location"))
                })?;
                resp = self
                    .client
                    .get(&location)
                    .send()
                    .await
                    .map_err(|e| ProxyError::Upstream(e.to_string()))?;
                followed = true;
                continue;
            }

            let content_type = header_value(&resp, header::CONTENT_TYPE);
            let body = resp
                .bytes()
                .await
                .map_err(|e| ProxyError::Upstream(e.to_string()))?;
            return Ok(relay_response(status, content_type.as_deref(), body));
        }
    }
}

fn header_value(resp: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, ProxyError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ProxyError::Upstream(format!("gzip decode failed: {e}")))?;
    Ok(out)
}
