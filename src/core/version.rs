// src/core/version.rs

//! Canonical semantic-version handling.
//!
//! A canonical version is `vMAJOR.MINOR.PATCH` with an optional pre-release
//! suffix. Build metadata is stripped, with one exception: the literal
//! `+incompatible` marker survives canonicalization, because it is part of
//! the module version identity for pre-modules major versions.

use semver::Version;

/// Returns the canonical form of `v`, or `None` when `v` is not a valid
/// semantic version with a leading `v`.
pub fn canonical(v: &str) -> Option<String> {
    let rest = v.strip_prefix('v')?;
    let parsed = Version::parse(rest).ok()?;
    let mut out = format!("v{}.{}.{}", parsed.major, parsed.minor, parsed.patch);
    if !parsed.pre.is_empty() {
        out.push('-');
        out.push_str(parsed.pre.as_str());
    }
    if parsed.build.as_str() == "incompatible" {
        out.push_str("+incompatible");
    }
    Some(out)
}

/// Reports whether `v` already is its own canonical form.
pub fn is_canonical(v: &str) -> bool {
    canonical(v).as_deref() == Some(v)
}
