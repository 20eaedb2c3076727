use modproxy::core::version::{canonical, is_canonical};

#[test]
fn test_plain_release_is_canonical() {
    assert!(is_canonical("v1.0.0"));
    assert!(is_canonical("v0.1.2"));
}

#[test]
fn test_partial_versions_are_not_canonical() {
    assert!(!is_canonical("v1"));
    assert!(!is_canonical("v1.0"));
    assert!(!is_canonical("1.0.0"));
}

#[test]
fn test_branch_names_are_not_canonical() {
    assert!(!is_canonical("master"));
    assert!(!is_canonical("latest"));
}

#[test]
fn test_pseudo_version_is_canonical() {
    assert!(is_canonical("v0.0.0-20181220203305-927f97764cc3"));
}

#[test]
fn test_prerelease_is_canonical() {
    assert!(is_canonical("v1.0.0-rc.1"));
}

#[test]
fn test_incompatible_marker_survives() {
    assert!(is_canonical("v2.0.0+incompatible"));
    assert_eq!(
        canonical("v2.0.0+incompatible").as_deref(),
        Some("v2.0.0+incompatible")
    );
}

#[test]
fn test_other_build_metadata_is_stripped() {
    assert!(!is_canonical("v1.0.0+build.5"));
    assert_eq!(canonical("v1.0.0+build.5").as_deref(), Some("v1.0.0"));
}
