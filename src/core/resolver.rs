// src/core/resolver.rs

//! The origin-resolver abstraction: how module data is obtained when a
//! request is served directly from source control rather than through an
//! upstream proxy.

use crate::core::errors::ProxyError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

/// A module identified by decoded path and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    pub path: String,
    pub version: String,
}

/// A fully materialized file to be sent to a client, with the modification
/// time used for the `Last-Modified` header.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub data: Bytes,
    pub mod_time: SystemTime,
}

impl ResolvedFile {
    pub fn new(data: impl Into<Bytes>, mod_time: SystemTime) -> Self {
        Self {
            data: data.into(),
            mod_time,
        }
    }
}

/// Builds the JSON info file for a resolved `(version, time)` pair.
pub fn version_info(version: &str, time: DateTime<Utc>) -> ResolvedFile {
    let body = serde_json::json!({
        "Version": version,
        "Time": time.to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    ResolvedFile::new(body.to_string(), time.into())
}

/// Resolves module data from its source-control origin.
///
/// `list` returns the tagged canonical versions of a module, one per line
/// with a trailing newline, or an empty body when there are none.
/// `latest` and `info` return the JSON info shape produced by
/// [`version_info`]. `info` accepts arbitrary revision identifiers such as
/// `master` and resolves them to canonical versions; every other operation
/// requires a canonical version on input.
///
/// Implementations signal a missing module or version with
/// [`ProxyError::NotFound`], which the direct server maps to a 404; any
/// other error becomes a 500.
#[async_trait]
pub trait OriginResolver: Send + Sync {
    async fn list(&self, module: &str) -> Result<ResolvedFile, ProxyError>;
    async fn latest(&self, module: &str) -> Result<ResolvedFile, ProxyError>;
    async fn info(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError>;
    async fn go_mod(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError>;
    async fn zip(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError>;
}
