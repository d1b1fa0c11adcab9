//! Shared fixtures for integration tests.

#![allow(dead_code)]

use literal_patcher::config::{load_from_path, PatchConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TARGET: &str = "components/incorporation/IncorporationDashboard.tsx";
pub const ADMIN_ANCHOR: &str = "// ─── Admin Package Editor Modal";

pub fn bundled_patch_set() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("patches/service-detail-popup.toml")
}

pub fn bundled_config() -> PatchConfig {
    load_from_path(bundled_patch_set()).expect("bundled patch set should load")
}

/// A dashboard stub containing every anchor the bundled rules look for.
///
/// Anchors are taken from the loaded rules so the fixture tracks the patch set.
pub fn dashboard_source(config: &PatchConfig, include_admin_anchor: bool) -> String {
    let mut source = String::from("import { useState } from \"react\";\n\n");

    source.push_str("function PackageCard({ pkg }: { pkg: Package }) {\n");
    source.push_str(&config.rules[1].search);
    source.push_str("\n    return (\n        <div>\n");
    source.push_str(&config.rules[2].search);
    source.push('\n');
    source.push_str(&config.rules[3].search);
    source.push_str(" ─────────────────────────────────────────────────────\n");
    source.push_str("function GetStartedModal() {\n    return null;\n}\n\n");

    if include_admin_anchor {
        source.push_str(&config.rules[0].search);
        source.push_str(" ──────────────────────────────────────────────\n");
        source.push_str("function AdminPackageEditor() {\n    return null;\n}\n");
    }

    source
}

/// Temp workspace with the dashboard stub (written with CRLF) and the bundled
/// patch set copied into `patches/`.
pub fn setup_workspace(include_admin_anchor: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    let config = bundled_config();

    let target = dir.path().join(TARGET);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    let source = dashboard_source(&config, include_admin_anchor).replace('\n', "\r\n");
    fs::write(&target, source).unwrap();

    let patches_dir = dir.path().join("patches");
    fs::create_dir(&patches_dir).unwrap();
    fs::copy(
        bundled_patch_set(),
        patches_dir.join("service-detail-popup.toml"),
    )
    .unwrap();

    dir
}
