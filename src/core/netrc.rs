// src/core/netrc.rs

//! Startup bootstrap of a `.netrc` file from environment credentials.
//!
//! When both `GITHUB_TOKEN_LOGIN` and `GITHUB_TOKEN_PASSWORD` are set, the
//! toolchain gets a `~/.netrc` entry for github.com so private modules can
//! be fetched without an interactive prompt. Absent variables are not an
//! error; a half-set pair is skipped with a warning.

use crate::core::errors::ProxyError;
use std::env;
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

/// Writes `~/.netrc` from the environment. Returns whether a file was
/// written.
pub async fn write_netrc() -> Result<bool, ProxyError> {
    let login = env::var("GITHUB_TOKEN_LOGIN").ok().filter(|s| !s.is_empty());
    let password = env::var("GITHUB_TOKEN_PASSWORD")
        .ok()
        .filter(|s| !s.is_empty());

    let (login, password) = match (login, password) {
        (Some(login), Some(password)) => (login, password),
        (None, None) => return Ok(false),
        _ => {
            warn!("only one of GITHUB_TOKEN_LOGIN/GITHUB_TOKEN_PASSWORD is set; skipping .netrc");
            return Ok(false);
        }
    };

    let home = home_dir().ok_or_else(|| {
        ProxyError::Internal("cannot locate a home directory for .netrc".to_string())
    })?;
    let contents = format!("machine github.com\nlogin {login}\npassword {password}\n");
    fs::write(home.join(".netrc"), contents).await?;
    Ok(true)
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
