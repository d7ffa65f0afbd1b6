//! Layering guardrails that keep `buildtest_core` a pure value crate.
//!
//! The diagnostic vocabulary (`buildtest_core`) is shared by every harness consumer and must stay
//! free of IO, logging and archive handling. This test scans its `Cargo.toml` and fails if
//! `[dependencies]` names anything but the optional `serde` derive.

const ALLOWED: &[&str] = &["serde"];

fn dependency_names(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut names = Vec::new();

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if let Some((name, _)) = line_no_comment.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

#[test]
fn core_crate_has_no_io_dependencies() {
    let manifest = include_str!("../crates/buildtest_core/Cargo.toml");
    for name in dependency_names(manifest) {
        assert!(
            ALLOWED.contains(&name.as_str()),
            "`{name}` must not appear in buildtest_core [dependencies]; keep IO in the harness crate"
        );
    }
}

#[test]
fn core_serde_is_optional() {
    let manifest = include_str!("../crates/buildtest_core/Cargo.toml");
    let serde_line = manifest
        .lines()
        .find(|line| line.trim_start().starts_with("serde ="))
        .unwrap_or_default();
    assert!(serde_line.contains("optional = true"), "serde must stay behind the `serde` feature");
}

#[test]
fn harness_depends_on_core() {
    let manifest = include_str!("../Cargo.toml");
    assert!(dependency_names(manifest).iter().any(|name| name == "buildtest_core"));
}
