//! End-to-end workflow test
//!
//! Runs the bundled service-detail-popup patch set against a dashboard stub:
//! 1. Load the patch set
//! 2. Apply the rules
//! 3. Verify the markers
//! 4. Check that a rerun changes nothing

mod common;

use common::{setup_workspace, ADMIN_ANCHOR, TARGET};
use literal_patcher::config::load_from_path;
use literal_patcher::{check_file, patch_file, verify, RuleOutcome};
use std::fs;

#[test]
fn test_full_pipeline_inserts_popup_before_admin_anchor() {
    let workspace = setup_workspace(true);
    let config = load_from_path(workspace.path().join("patches/service-detail-popup.toml")).unwrap();
    let target = config.target_path(workspace.path());

    let report = patch_file(&target, &config.rules, config.meta.line_ending).unwrap();
    assert!(report.changed);
    assert_eq!(report.applied(), 4);
    assert_eq!(report.missing_anchors(), 0);

    let verification = verify(&target, &config.markers).unwrap();
    assert_eq!(verification.checks.len(), 4);
    assert!(verification.all_present(), "{verification}");

    let patched = fs::read_to_string(&target).unwrap();
    let popup = patched.find("function ServiceDetailPopup").unwrap();
    let admin = patched.find(ADMIN_ANCHOR).unwrap();
    assert!(popup < admin);
    assert!(patched.contains("+₹{addon.price.toLocaleString()}"));
}

#[test]
fn test_output_uses_crlf_throughout() {
    let workspace = setup_workspace(true);
    let config = load_from_path(workspace.path().join("patches/service-detail-popup.toml")).unwrap();
    let target = workspace.path().join(TARGET);

    let _ = patch_file(&target, &config.rules, config.meta.line_ending).unwrap();

    let raw = fs::read(&target).unwrap();
    assert!(!raw.starts_with(&[0xef, 0xbb, 0xbf]));
    let text = String::from_utf8(raw).unwrap();
    let lf = text.matches('\n').count();
    let crlf = text.matches("\r\n").count();
    assert_eq!(lf, crlf);
    assert!(crlf > 0);
}

#[test]
fn test_rerun_is_idempotent() {
    let workspace = setup_workspace(true);
    let config = load_from_path(workspace.path().join("patches/service-detail-popup.toml")).unwrap();
    let target = workspace.path().join(TARGET);

    let _ = patch_file(&target, &config.rules, config.meta.line_ending).unwrap();
    let after_first = fs::read(&target).unwrap();

    let second = patch_file(&target, &config.rules, config.meta.line_ending).unwrap();
    assert!(!second.changed);
    assert!(second
        .rules
        .iter()
        .all(|r| r.outcome == RuleOutcome::AlreadyApplied));
    assert_eq!(fs::read(&target).unwrap(), after_first);

    let patched = String::from_utf8(after_first).unwrap();
    assert_eq!(patched.matches("function ServiceDetailPopup").count(), 1);
}

#[test]
fn test_missing_anchor_is_reported_and_rest_still_applies() {
    let workspace = setup_workspace(false);
    let config = load_from_path(workspace.path().join("patches/service-detail-popup.toml")).unwrap();
    let target = workspace.path().join(TARGET);

    let report = patch_file(&target, &config.rules, config.meta.line_ending).unwrap();
    assert!(report.rules[0].outcome.is_anchor_missing());
    assert_eq!(report.applied(), 3);

    let verification = verify(&target, &config.markers).unwrap();
    assert_eq!(
        verification.is_present("function ServiceDetailPopup"),
        Some(false)
    );
    assert_eq!(verification.is_present("setInfoAddon(addon)"), Some(true));
    assert_eq!(verification.is_present("infoAddon && ("), Some(true));
}

#[test]
fn test_check_leaves_target_untouched() {
    let workspace = setup_workspace(true);
    let config = load_from_path(workspace.path().join("patches/service-detail-popup.toml")).unwrap();
    let target = workspace.path().join(TARGET);
    let before = fs::read(&target).unwrap();

    let report = check_file(&target, &config.rules).unwrap();
    assert!(report.changed);
    assert_eq!(report.applied(), 4);
    assert_eq!(fs::read(&target).unwrap(), before);
}
