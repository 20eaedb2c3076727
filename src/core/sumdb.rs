// src/core/sumdb.rs

//! Dumb proxy for checksum-database requests.
//!
//! The proxy never interprets sumdb content. For each request it races one
//! GET per configured mirror under a shared deadline and forwards whichever
//! response arrives first, success or failure status alike. Losing requests
//! are dropped, which cancels them.

use crate::core::errors::ProxyError;
use crate::core::response::relay_response;
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::time::Duration;

pub struct SumDbProxy {
    client: reqwest::Client,
    databases: HashMap<String, Vec<String>>,
    timeout: Duration,
}

impl SumDbProxy {
    pub fn new(
        client: reqwest::Client,
        databases: HashMap<String, Vec<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            databases,
            timeout,
        }
    }

    /// Handles a `/sumdb/<db>/<sub-path>` request.
    pub async fn handle(&self, path: &str) -> Result<Response, ProxyError> {
        let rest = path
            .strip_prefix("/sumdb/")
            .ok_or_else(|| ProxyError::BadRequest(format!("bad sumdb path: {path}")))?;
        let (db, sub_path) = match rest.split_once('/') {
            Some((db, sub_path)) => (db, sub_path),
            None => (rest, ""),
        };

        let mirrors = self
            .databases
            .get(db)
            .ok_or(ProxyError::SumDbUnsupported)?;

        // A `supported` probe is answered locally; the allow-list is the
        // whole answer.
        if sub_path == "supported" {
            return Ok(relay_response(StatusCode::OK, None, Bytes::new()));
        }
        if sub_path.is_empty() {
            return Err(ProxyError::BadRequest(format!("bad sumdb path: {path}")));
        }

        let mut pending = FuturesUnordered::new();
        for mirror in mirrors {
            let url = format!("{}/{}", mirror.trim_end_matches('/'), sub_path);
            let client = self.client.clone();
            pending.push(async move { client.get(&url).send().await });
        }

        // First response of any status wins; transport errors only count
        // when every mirror produced one.
        let race = tokio::time::timeout(self.timeout, async {
            let mut last_error = None;
            while let Some(result) = pending.next().await {
                match result {
                    Ok(resp) => return Ok(resp),
                    Err(e) => last_error = Some(e),
                }
            }
            Err(last_error)
        });

        match race.await {
            Ok(Ok(resp)) => {
                let status = resp.status();
                let content_type = resp
                    .headers()
                    .get(axum::http::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| ProxyError::SumDbUnavailable(e.to_string()))?;
                Ok(relay_response(status, content_type.as_deref(), body))
            }
            Ok(Err(Some(e))) => Err(ProxyError::SumDbUnavailable(e.to_string())),
            Ok(Err(None)) => Err(ProxyError::SumDbUnavailable(format!(
                "no mirrors configured for {db}"
            ))),
            Err(_) => Err(ProxyError::SumDbUnavailable(format!(
                "no mirror responded within {:?}",
                self.timeout
            ))),
        }
    }
}
