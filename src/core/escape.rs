// src/core/escape.rs

//! Escaping of module paths and versions for use in URLs and on disk.
//!
//! The download cache is served from case-insensitive filesystems, so any
//! uppercase letter is escaped as `!` followed by its lowercase form
//! (`github.com/Azure` becomes `github.com/!azure`). A literal `!` or a
//! non-ASCII rune in the input indicates a caller bug and is rejected.

use crate::core::errors::ProxyError;

/// Escapes a module path for use as a URL segment or cache directory.
pub fn escape_path(path: &str) -> Result<String, ProxyError> {
    escape(path).map_err(|e| ProxyError::BadRequest(format!("invalid module path: {e}")))
}

/// Reverses [`escape_path`].
pub fn unescape_path(escaped: &str) -> Result<String, ProxyError> {
    unescape(escaped).map_err(|e| ProxyError::BadRequest(format!("invalid escaped module path: {e}")))
}

/// Escapes a version string for use in a URL segment or cache file name.
pub fn escape_version(version: &str) -> Result<String, ProxyError> {
    escape(version).map_err(|e| ProxyError::BadRequest(format!("invalid version: {e}")))
}

/// Reverses [`escape_version`].
pub fn unescape_version(escaped: &str) -> Result<String, ProxyError> {
    unescape(escaped).map_err(|e| ProxyError::BadRequest(format!("invalid escaped version: {e}")))
}

fn escape(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if !c.is_ascii() {
            return Err(format!("non-ASCII character {c:?} in {s:?}"));
        }
        if c == '!' {
            return Err(format!("'!' is reserved in {s:?}"));
        }
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn unescape(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut pending_bang = false;
    for c in s.chars() {
        if !c.is_ascii() {
            return Err(format!("non-ASCII character {c:?} in {s:?}"));
        }
        if pending_bang {
            if !c.is_ascii_lowercase() {
                return Err(format!("'!' must be followed by a lowercase letter in {s:?}"));
            }
            out.push(c.to_ascii_uppercase());
            pending_bang = false;
        } else if c == '!' {
            pending_bang = true;
        } else if c.is_ascii_uppercase() {
            return Err(format!("unexpected uppercase letter {c:?} in {s:?}"));
        } else {
            out.push(c);
        }
    }
    if pending_bang {
        return Err(format!("trailing '!' in {s:?}"));
    }
    Ok(out)
}
