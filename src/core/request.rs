// src/core/request.rs

//! Classification of incoming URL paths into module-protocol requests.

use crate::core::errors::ProxyError;
use crate::core::escape::{unescape_path, unescape_version};

/// The five shapes a module-protocol request can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `/<path>/@v/list`: enumerate tagged versions.
    VersionList,
    /// `/<path>/@latest`: resolve the head commit to a concrete version.
    LatestInfo,
    /// `/<path>/@v/<version>.info`: version metadata.
    VersionInfo,
    /// `/<path>/@v/<version>.mod`: the module descriptor file.
    GoModFile,
    /// `/<path>/@v/<version>.zip`: the source archive.
    ZipArchive,
}

impl RequestKind {
    /// Volatile entries are only served from cache while fresh; everything
    /// else is immutable once written.
    pub fn is_volatile(&self) -> bool {
        matches!(self, RequestKind::VersionList | RequestKind::LatestInfo)
    }

    /// The content type used when the response body is produced by the
    /// origin resolver.
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestKind::VersionList | RequestKind::GoModFile => "text/plain; charset=UTF-8",
            RequestKind::LatestInfo | RequestKind::VersionInfo => "application/json",
            RequestKind::ZipArchive => "application/octet-stream",
        }
    }

    /// The content type used when serving a cache hit. Volatile entries are
    /// labeled plain text even when the body is JSON; clients never sniff.
    pub fn cached_content_type(&self) -> &'static str {
        if self.is_volatile() {
            "text/plain; charset=UTF-8"
        } else {
            self.content_type()
        }
    }
}

/// A parsed module-protocol request. `module` and `version` are in decoded
/// form; `fingerprint` retains the escaped URL path (leading `/` removed) and
/// doubles as the cache key and on-disk relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRequest {
    pub kind: RequestKind,
    pub module: String,
    /// Empty for `VersionList` and `LatestInfo`.
    pub version: String,
    pub fingerprint: String,
}

/// Classifies an already-URL-decoded request path. The first matching shape
/// wins; anything else is a bad request.
pub fn parse(path: &str) -> Result<ModRequest, ProxyError> {
    let bad = || ProxyError::BadRequest(format!("bad module path: {path}"));

    let escaped = path.strip_prefix('/').ok_or_else(bad)?;

    let (kind, raw_module, raw_version) = if let Some(m) = escaped.strip_suffix("/@v/list") {
        (RequestKind::VersionList, m, "")
    } else if let Some(m) = escaped.strip_suffix("/@latest") {
        (RequestKind::LatestInfo, m, "")
    } else {
        let mut split = escaped.splitn(3, "/@v/");
        match (split.next(), split.next(), split.next()) {
            (Some(m), Some(rest), None) if !rest.contains('/') => {
                let (base, ext) = rest.rsplit_once('.').ok_or_else(bad)?;
                let kind = match ext {
                    "info" => RequestKind::VersionInfo,
                    "mod" => RequestKind::GoModFile,
                    "zip" => RequestKind::ZipArchive,
                    _ => return Err(bad()),
                };
                (kind, m, base)
            }
            _ => return Err(bad()),
        }
    };

    if raw_module.is_empty() || (!kind.is_volatile() && raw_version.is_empty()) {
        return Err(bad());
    }

    Ok(ModRequest {
        kind,
        module: unescape_path(raw_module)?,
        version: if raw_version.is_empty() {
            String::new()
        } else {
            unescape_version(raw_version)?
        },
        fingerprint: escaped.to_string(),
    })
}
