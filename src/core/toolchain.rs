// src/core/toolchain.rs

//! The production origin resolver: shells out to the `go` binary.
//!
//! Every invocation runs in a stub workspace beneath the cache root with a
//! dedicated GOPATH, so downloads land in the same tree the daemon serves
//! from. The child environment carries `GIT_TERMINAL_PROMPT=0`; the
//! toolchain may consult source-control credentials (e.g. a `.netrc`) but
//! must never block on an interactive prompt.

use crate::core::errors::ProxyError;
use crate::core::resolver::{ModuleVersion, OriginResolver, ResolvedFile, version_info};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Output;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

/// Toolchain failure strings that mean "no such module or version" rather
/// than an infrastructure problem.
const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "unknown revision",
    "no matching versions",
    "does not contain",
    "malformed module path",
    "missing dot in first path element",
    "invalid version",
];

#[derive(Debug, Clone)]
pub struct GoToolchain {
    go_bin: String,
    gopath: PathBuf,
    work_dir: PathBuf,
}

/// Output shape of `go list -m -json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedModule {
    version: String,
    time: Option<String>,
}

/// Output shape of `go mod download -json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DownloadedModule {
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    go_mod: Option<String>,
    #[serde(default)]
    zip: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GoToolchain {
    pub fn new(cachedir: impl Into<PathBuf>) -> Self {
        // GOPATH must be absolute; the configured cache dir may not be.
        let gopath = cachedir.into();
        let gopath = std::path::absolute(&gopath).unwrap_or(gopath);
        let work_dir = gopath.join("modproxy-fetch");
        Self {
            go_bin: "go".to_string(),
            gopath,
            work_dir,
        }
    }

    /// `go list -m` and `go mod download` both require a module context, so
    /// invocations run from a stub module beneath the cache root.
    async fn ensure_workspace(&self) -> Result<(), ProxyError> {
        fs::create_dir_all(&self.work_dir).await?;
        let go_mod = self.work_dir.join("go.mod");
        if fs::metadata(&go_mod).await.is_err() {
            fs::write(&go_mod, b"module modproxy.localhost/fetch\n").await?;
        }
        Ok(())
    }

    async fn run_go(&self, args: &[&str]) -> Result<Output, ProxyError> {
        self.ensure_workspace().await?;
        debug!("go {}", args.join(" "));
        let output = Command::new(&self.go_bin)
            .args(args)
            .current_dir(&self.work_dir)
            .env("GOPATH", &self.gopath)
            .env("GO111MODULE", "on")
            .env("GOFLAGS", "-mod=mod")
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await?;
        Ok(output)
    }

    fn classify_failure(query: &str, stderr: &str) -> ProxyError {
        let msg = stderr.trim();
        let lower = msg.to_lowercase();
        if NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker)) {
            ProxyError::NotFound(format!("{query}: {msg}"))
        } else {
            ProxyError::Resolver(format!("{query}: {msg}"))
        }
    }

    async fn read_file(path: &str) -> Result<ResolvedFile, ProxyError> {
        let metadata = fs::metadata(path).await?;
        let data = fs::read(path).await?;
        Ok(ResolvedFile::new(data, metadata.modified()?))
    }

    /// Runs `go mod download -json` for one module version and returns the
    /// paths of the files it materialized.
    async fn download(&self, module: &ModuleVersion) -> Result<DownloadedModule, ProxyError> {
        let query = format!("{}@{}", module.path, module.version);
        let output = self.run_go(&["mod", "download", "-json", &query]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // On failure the toolchain reports the reason as JSON on stdout.
        if let Ok(downloaded) = serde_json::from_str::<DownloadedModule>(&stdout) {
            if let Some(error) = &downloaded.error {
                return Err(Self::classify_failure(&query, error));
            }
            if output.status.success() {
                return Ok(downloaded);
            }
        }
        Err(Self::classify_failure(
            &query,
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

#[async_trait]
impl OriginResolver for GoToolchain {
    async fn list(&self, module: &str) -> Result<ResolvedFile, ProxyError> {
        let query = format!("{module}@latest");
        let output = self.run_go(&["list", "-m", "-versions", &query]).await?;
        if !output.status.success() {
            return Err(Self::classify_failure(
                module,
                &String::from_utf8_lossy(&output.stderr),
            ));
        }
        // Output is `<path> <v1> <v2> ...` on a single line.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let versions: Vec<&str> = stdout.split_whitespace().skip(1).collect();
        let mut body = versions.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        Ok(ResolvedFile::new(body, std::time::SystemTime::now()))
    }

    async fn latest(&self, module: &str) -> Result<ResolvedFile, ProxyError> {
        let query = format!("{module}@latest");
        let output = self.run_go(&["list", "-m", "-json", &query]).await?;
        if !output.status.success() {
            return Err(Self::classify_failure(
                module,
                &String::from_utf8_lossy(&output.stderr),
            ));
        }
        let listed: ListedModule = serde_json::from_slice(&output.stdout)?;
        let time = listed
            .time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        Ok(version_info(&listed.version, time))
    }

    async fn info(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError> {
        let downloaded = self.download(module).await?;
        match downloaded.info {
            Some(path) => Self::read_file(&path).await,
            None => Err(ProxyError::Resolver(format!(
                "toolchain returned no info file for {}@{}",
                module.path, module.version
            ))),
        }
    }

    async fn go_mod(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError> {
        let downloaded = self.download(module).await?;
        match downloaded.go_mod {
            Some(path) => Self::read_file(&path).await,
            None => Err(ProxyError::Resolver(format!(
                "toolchain returned no go.mod file for {}@{}",
                module.path, module.version
            ))),
        }
    }

    async fn zip(&self, module: &ModuleVersion) -> Result<ResolvedFile, ProxyError> {
        let downloaded = self.download(module).await?;
        match downloaded.zip {
            Some(path) => Self::read_file(&path).await,
            None => Err(ProxyError::Resolver(format!(
                "toolchain returned no zip file for {}@{}",
                module.path, module.version
            ))),
        }
    }
}
