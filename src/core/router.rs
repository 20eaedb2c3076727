// src/core/router.rs

//! Per-request dispatch: sumdb handoff, direct-vs-proxy routing, and the
//! cache-first serving path with freshness rules for volatile entries.

use crate::config::Config;
use crate::core::cache::{CacheStore, Freshness, Lookup};
use crate::core::direct::DirectServer;
use crate::core::errors::ProxyError;
use crate::core::metrics;
use crate::core::request::{self, ModRequest};
use crate::core::resolver::OriginResolver;
use crate::core::response::file_response;
use crate::core::sumdb::SumDbProxy;
use crate::core::upstream::UpstreamProxy;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{error, info};
use url::Url;

/// Immutable per-daemon routing state, shared by every request task.
pub struct AppState {
    pub cache: CacheStore,
    pub direct: DirectServer,
    pub upstream: Option<UpstreamProxy>,
    pub sumdb: SumDbProxy,
    exclude: Option<String>,
    list_expire: Duration,
}

impl AppState {
    pub fn new(config: &Config, resolver: Arc<dyn OriginResolver>) -> Result<Self, ProxyError> {
        // One connection-pooled client serves the upstream path and the
        // sumdb race. Redirects are never followed automatically; the 302
        // rule is applied by hand in the upstream proxy.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(config.insecure_upstream)
            .build()?;

        let upstream = match &config.proxy {
            Some(raw) => {
                let base = Url::parse(raw).map_err(|e| {
                    ProxyError::Internal(format!("invalid upstream proxy URL '{raw}': {e}"))
                })?;
                Some(UpstreamProxy::new(client.clone(), base))
            }
            None => None,
        };

        Ok(Self {
            cache: CacheStore::new(config.download_root()),
            direct: DirectServer::new(resolver),
            upstream,
            sumdb: SumDbProxy::new(client, config.sumdb.databases.clone(), config.sumdb.timeout),
            exclude: config.exclude.clone(),
            list_expire: config.list_expire,
        })
    }

    /// Private modules bypass the upstream. Matching runs on the escaped
    /// path with the leading `/` removed.
    fn excluded(&self, fingerprint: &str) -> bool {
        match &self.exclude {
            Some(globs) => globs_match_path(globs, fingerprint),
            None => false,
        }
    }

    async fn route(&self, path: &str) -> (&'static str, Response) {
        if path.starts_with("/sumdb/") {
            let response = self
                .sumdb
                .handle(path)
                .await
                .unwrap_or_else(|e| error_response(path, e));
            return ("sumdb", response);
        }

        let request = match request::parse(path) {
            Ok(request) => request,
            Err(e) => return ("error", error_response(path, e)),
        };

        if self.upstream.is_none() || self.excluded(&request.fingerprint) {
            let response = self
                .direct
                .serve(&request)
                .await
                .unwrap_or_else(|e| error_response(path, e));
            return ("direct", response);
        }

        match self.serve_proxied(&request).await {
            Ok(outcome) => outcome,
            Err(e) => ("proxy", error_response(path, e)),
        }
    }

    /// Cache-first serving for the proxied path: immutable entries are
    /// served whenever present, volatile entries only while fresh;
    /// everything else goes to the upstream and lands in the cache.
    async fn serve_proxied(
        &self,
        request: &ModRequest,
    ) -> Result<(&'static str, Response), ProxyError> {
        let upstream = self
            .upstream
            .as_ref()
            .ok_or_else(|| ProxyError::Internal("upstream proxy not configured".to_string()))?;

        let cached = if request.kind.is_volatile() {
            match self
                .cache
                .fresh_lookup(&request.fingerprint, self.list_expire)
                .await?
            {
                Freshness::Fresh(entry) => Some(entry),
                Freshness::Stale | Freshness::Miss => None,
            }
        } else {
            match self.cache.lookup(&request.fingerprint).await? {
                Lookup::Hit(entry) => Some(entry),
                Lookup::Miss => None,
            }
        };

        if let Some(entry) = cached {
            let data = fs::read(&entry.path).await?;
            let response = file_response(
                request.kind.cached_content_type(),
                Bytes::from(data),
                entry.mod_time,
            );
            return Ok(("cache", response));
        }

        let response = upstream.fetch(&self.cache, request).await?;
        Ok(("proxy", response))
    }
}

/// The axum fallback handler: every non-metrics request lands here.
pub async fn dispatch(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    if req.method() != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    // The classifier works on the decoded path; percent-escapes are rare in
    // practice but legal in a URL.
    let raw_path = req.uri().path();
    let path = match urlencoding::decode(raw_path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            let response = error_response(
                raw_path,
                ProxyError::BadRequest(format!("bad module path: {raw_path}")),
            );
            metrics::observe_request("error", response.status().as_u16());
            return response;
        }
    };
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "-".to_string());
    info!("modproxy: {} download {}", remote, path);

    let (mode, response) = state.route(&path).await;
    metrics::observe_request(mode, response.status().as_u16());
    response
}

fn error_response(path: &str, err: ProxyError) -> Response {
    error!("modproxy: {}: {}", path, err);
    err.into_response()
}

/// Reports whether any path prefix of `target` matches one of the
/// shell-style glob patterns in the comma-separated `globs` list. Empty and
/// malformed patterns are ignored.
pub fn globs_match_path(globs: &str, target: &str) -> bool {
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut rest = globs;
    while !rest.is_empty() {
        let glob;
        match rest.find(',') {
            Some(i) => {
                glob = &rest[..i];
                rest = &rest[i + 1..];
            }
            None => {
                glob = rest;
                rest = "";
            }
        }
        if glob.is_empty() {
            continue;
        }

        // A glob with N+1 path elements (N slashes) is matched against the
        // first N+1 path elements of target, which end just before the
        // N+1'th slash.
        let mut n = glob.bytes().filter(|b| *b == b'/').count();
        let mut prefix = target;
        for (i, b) in target.bytes().enumerate() {
            if b == b'/' {
                if n == 0 {
                    prefix = &target[..i];
                    break;
                }
                n -= 1;
            }
        }
        if n > 0 {
            // Not enough prefix elements.
            continue;
        }

        let Ok(pattern) = glob::Pattern::new(glob) else {
            continue;
        };
        if pattern.matches_with(prefix, options) {
            return true;
        }
    }
    false
}
