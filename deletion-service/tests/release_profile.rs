//! Build profile guarantees the deletion worker relies on.

use std::path::Path;

fn workspace_manifest() -> toml::Table {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../Cargo.toml");
    let text = std::fs::read_to_string(&path).unwrap();
    toml::from_str::<toml::Table>(&text).unwrap()
}

/// The worker turns a panicking job into an audit record with `catch_unwind`,
/// which only works when panics unwind.
#[test]
fn test_release_profile_unwinds_on_panic() {
    let manifest = workspace_manifest();

    for profile in ["release", "dev"] {
        let panic = manifest
            .get("profile")
            .and_then(|p| p.get(profile))
            .and_then(|p| p.get("panic"))
            .and_then(|v| v.as_str());

        assert!(
            matches!(panic, None | Some("unwind")),
            "profile.{} sets panic = {:?}",
            profile,
            panic
        );
    }
}

#[test]
fn test_package_has_no_authors_field() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let manifest: toml::Table = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let package = manifest.get("package").unwrap();
    assert!(package.get("authors").is_none());
}
