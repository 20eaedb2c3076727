// src/core/direct.rs

//! Serves module requests straight from the origin resolver, bypassing any
//! upstream proxy. Used when no upstream is configured and for private
//! modules matched by the exclude globs.

use crate::core::errors::ProxyError;
use crate::core::request::{ModRequest, RequestKind};
use crate::core::resolver::{ModuleVersion, OriginResolver};
use crate::core::response::file_response;
use crate::core::version;
use axum::response::Response;
use std::sync::Arc;

pub struct DirectServer {
    resolver: Arc<dyn OriginResolver>,
}

impl DirectServer {
    pub fn new(resolver: Arc<dyn OriginResolver>) -> Self {
        Self { resolver }
    }

    pub async fn serve(&self, request: &ModRequest) -> Result<Response, ProxyError> {
        // The head of a module is requested as `/@latest`, never as a
        // version token. Disallow it early to avoid confusing the resolver.
        if request.version == "latest" {
            return Err(ProxyError::not_found("version latest is disallowed"));
        }

        // Everything except an info request requires the version in
        // canonical form; info alone accepts arbitrary revision identifiers
        // and relies on the resolver to normalize them.
        if !request.version.is_empty()
            && request.kind != RequestKind::VersionInfo
            && !version::is_canonical(&request.version)
        {
            return Err(ProxyError::not_found(format!(
                "version {} is not in canonical form",
                request.version
            )));
        }

        let module = ModuleVersion {
            path: request.module.clone(),
            version: request.version.clone(),
        };
        let file = match request.kind {
            RequestKind::VersionList => self.resolver.list(&request.module).await?,
            RequestKind::LatestInfo => self.resolver.latest(&request.module).await?,
            RequestKind::VersionInfo => self.resolver.info(&module).await?,
            RequestKind::GoModFile => self.resolver.go_mod(&module).await?,
            RequestKind::ZipArchive => self.resolver.zip(&module).await?,
        };

        Ok(file_response(
            request.kind.content_type(),
            file.data,
            file.mod_time,
        ))
    }
}
