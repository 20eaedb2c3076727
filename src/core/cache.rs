// src/core/cache.rs

//! The on-disk download cache.
//!
//! The cache is content-addressed by the escaped URL path: the request
//! fingerprint is both the cache key and the relative path under the
//! download root, e.g. `golang.org/x/net/@v/v0.1.0.zip`. There is no
//! separate index; deleting a file evicts the entry.
//!
//! Writes go through a temporary file followed by a rename, so a concurrent
//! reader sees either the previous snapshot or the new one, never a torn
//! write. Concurrent writers for the same fingerprint are allowed; the last
//! rename wins.

use crate::core::errors::ProxyError;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;

/// A cache entry that exists on disk.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub mod_time: SystemTime,
    pub size: u64,
}

/// Result of an unconditional lookup.
#[derive(Debug)]
pub enum Lookup {
    Hit(CacheEntry),
    Miss,
}

/// Result of a freshness-gated lookup for volatile entries.
#[derive(Debug)]
pub enum Freshness {
    Fresh(CacheEntry),
    Stale,
    Miss,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a fingerprint to its absolute path, refusing anything that would
    /// escape the download root.
    fn entry_path(&self, fingerprint: &str) -> Result<PathBuf, ProxyError> {
        let rel = Path::new(fingerprint.trim_start_matches('/'));
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(ProxyError::BadRequest(format!(
                        "bad module path: {fingerprint}"
                    )));
                }
            }
        }
        Ok(self.root.join(rel))
    }

    pub async fn lookup(&self, fingerprint: &str) -> Result<Lookup, ProxyError> {
        let path = self.entry_path(fingerprint)?;
        match fs::metadata(&path).await {
            Ok(md) if md.is_file() => Ok(Lookup::Hit(CacheEntry {
                mod_time: md.modified()?,
                size: md.len(),
                path,
            })),
            // A missing or unreadable entry is simply a miss; the fetch path
            // will rewrite it.
            _ => Ok(Lookup::Miss),
        }
    }

    pub async fn fresh_lookup(
        &self,
        fingerprint: &str,
        max_age: Duration,
    ) -> Result<Freshness, ProxyError> {
        match self.lookup(fingerprint).await? {
            Lookup::Miss => Ok(Freshness::Miss),
            Lookup::Hit(entry) => {
                let age = SystemTime::now()
                    .duration_since(entry.mod_time)
                    .unwrap_or(Duration::ZERO);
                if age < max_age {
                    Ok(Freshness::Fresh(entry))
                } else {
                    Ok(Freshness::Stale)
                }
            }
        }
    }

    /// Persists `data` under `fingerprint`. The entry becomes visible to
    /// readers only once the rename completes.
    pub async fn store(&self, fingerprint: &str, data: &[u8]) -> Result<(), ProxyError> {
        let path = self.entry_path(fingerprint)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = format!("{}.tmp.{}", path.display(), rand::random::<u32>());
        fs::write(&temp_path, data).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}
