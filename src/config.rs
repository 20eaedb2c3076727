// src/config.rs

//! Manages daemon configuration: loading, per-field defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Top-level daemon configuration. Immutable for the lifetime of the process;
/// constructed once at startup from an optional TOML file plus CLI overrides.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// The address the HTTP listener binds to.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// The root directory handed to the module toolchain (its GOPATH).
    /// The download cache lives under `<cachedir>/pkg/mod/cache/download`.
    #[serde(default = "default_cachedir")]
    pub cachedir: String,

    /// Optional upstream proxy base URL. When unset, every module request is
    /// resolved directly from its source-control origin.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Comma-separated list of path globs that must never be fetched through
    /// the upstream proxy (private modules).
    #[serde(default)]
    pub exclude: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Disables TLS certificate verification for outbound requests.
    /// Off unless explicitly requested, for proxying self-signed mirrors.
    #[serde(default)]
    pub insecure_upstream: bool,

    /// Maximum age at which a cached version list or latest-info entry is
    /// still served without consulting the upstream.
    #[serde(default = "default_list_expire", with = "humantime_serde")]
    pub list_expire: Duration,

    /// How long in-flight requests are given to drain on shutdown.
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub sumdb: SumDbConfig,
}

/// Configuration for the Prometheus metrics endpoint on the main listener.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

/// Configuration for the checksum-database proxy.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SumDbConfig {
    /// Recognized databases, each mapping to the mirror base URLs raced for
    /// its content. Requests for any other database are rejected.
    #[serde(default = "default_sumdb_databases")]
    pub databases: HashMap<String, Vec<String>>,

    /// Shared deadline for the mirror race.
    #[serde(default = "default_sumdb_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SumDbConfig {
    fn default() -> Self {
        Self {
            databases: default_sumdb_databases(),
            timeout: default_sumdb_timeout(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_cachedir() -> String {
    // Mirror the toolchain's own convention: the first GOPATH entry when one
    // is set, a local directory otherwise.
    std::env::var("GOPATH")
        .ok()
        .and_then(|gp| gp.split(':').next().map(str::to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "./cache".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_list_expire() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_sumdb_databases() -> HashMap<String, Vec<String>> {
    HashMap::from([(
        "sum.golang.org".to_string(),
        vec![
            "https://sum.golang.org".to_string(),
            "https://gosum.io".to_string(),
        ],
    )])
}

fn default_sumdb_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cachedir: default_cachedir(),
            proxy: None,
            exclude: None,
            log_level: default_log_level(),
            insecure_upstream: false,
            list_expire: default_list_expire(),
            shutdown_grace: default_shutdown_grace(),
            metrics: MetricsConfig::default(),
            sumdb: SumDbConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(proxy) = &self.proxy {
            let url = Url::parse(proxy)
                .with_context(|| format!("Invalid upstream proxy URL '{proxy}'"))?;
            if url.host_str().is_none() {
                return Err(anyhow!("Upstream proxy URL '{proxy}' has no host"));
            }
        }
        for (db, mirrors) in &self.sumdb.databases {
            if mirrors.is_empty() {
                return Err(anyhow!("sumdb database '{db}' has no mirrors configured"));
            }
            for mirror in mirrors {
                Url::parse(mirror)
                    .with_context(|| format!("Invalid mirror URL '{mirror}' for sumdb '{db}'"))?;
            }
        }
        Ok(())
    }

    /// The on-disk download cache root, laid out exactly like the module
    /// toolchain's own cache so the two can share a directory.
    pub fn download_root(&self) -> PathBuf {
        PathBuf::from(&self.cachedir)
            .join("pkg")
            .join("mod")
            .join("cache")
            .join("download")
    }
}
