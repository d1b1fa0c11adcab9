//! The load → apply rules → save → verify pipeline.

use crate::document::{self, DocumentError, LineEnding, SourceDocument};
use crate::rule::{apply_rule, RuleOutcome, SubstitutionRule};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// A literal whose presence after patching signals success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub label: String,
    pub text: String,
}

impl Marker {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerCheck {
    pub label: String,
    pub text: String,
    pub present: bool,
}

/// Result of re-reading a file and looking for markers.
///
/// Presence only: a marker that occurs twice, or in the wrong place, still
/// counts as present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub file: PathBuf,
    pub checks: Vec<MarkerCheck>,
    /// File size in characters after line-ending normalization
    pub char_count: usize,
}

impl VerifyReport {
    pub fn all_present(&self) -> bool {
        self.checks.iter().all(|c| c.present)
    }

    /// Look up a marker by its text.
    pub fn is_present(&self, text: &str) -> Option<bool> {
        self.checks.iter().find(|c| c.text == text).map(|c| c.present)
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            writeln!(f, "{}: {}", check.label, check.present)?;
        }
        write!(f, "File size: {}", self.char_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub id: String,
    pub outcome: RuleOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "PatchReport carries per-rule outcomes that may include missing anchors"]
pub struct PatchReport {
    pub file: PathBuf,
    pub rules: Vec<RuleReport>,
    /// Whether the final text differs from what was loaded
    pub changed: bool,
}

impl PatchReport {
    pub fn applied(&self) -> usize {
        self.rules.iter().filter(|r| r.outcome.is_applied()).count()
    }

    pub fn already_applied(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| r.outcome == RuleOutcome::AlreadyApplied)
            .count()
    }

    pub fn missing_anchors(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| r.outcome.is_anchor_missing())
            .count()
    }
}

/// Fold every rule over a document in order.
///
/// A rule that misses does not stop the ones after it.
pub fn apply_rules(
    doc: SourceDocument,
    rules: &[SubstitutionRule],
) -> (SourceDocument, Vec<RuleReport>) {
    let mut reports = Vec::with_capacity(rules.len());
    let doc = rules.iter().fold(doc, |doc, rule| {
        let (doc, outcome) = apply_rule(doc, rule);
        match &outcome {
            RuleOutcome::AnchorNotFound { hint } => {
                tracing::warn!(rule = %rule.id, hint = ?hint, "anchor not found");
            }
            _ => tracing::debug!(rule = %rule.id, %outcome, "rule evaluated"),
        }
        reports.push(RuleReport {
            id: rule.id.clone(),
            outcome,
        });
        doc
    });
    (doc, reports)
}

/// Load `path`, apply `rules`, and write the result back unconditionally.
pub fn patch_file(
    path: &Path,
    rules: &[SubstitutionRule],
    line_ending: LineEnding,
) -> Result<PatchReport, PatchError> {
    let original = document::load(path)?;
    let (patched, rules) = apply_rules(original.clone(), rules);
    let changed = patched != original;

    document::save(path, &patched, line_ending)?;
    tracing::info!(file = %path.display(), changed, "saved patched document");

    Ok(PatchReport {
        file: path.to_path_buf(),
        rules,
        changed,
    })
}

/// Evaluate `rules` against `path` without writing anything.
///
/// `Applied` outcomes here mean "would apply".
pub fn check_file(path: &Path, rules: &[SubstitutionRule]) -> Result<PatchReport, PatchError> {
    preview_file(path, rules).map(|(report, _, _)| report)
}

/// Like [`check_file`] but also returns the before/after text, for diff display.
pub fn preview_file(
    path: &Path,
    rules: &[SubstitutionRule],
) -> Result<(PatchReport, SourceDocument, SourceDocument), PatchError> {
    let original = document::load(path)?;
    let (patched, reports) = apply_rules(original.clone(), rules);
    let report = PatchReport {
        file: path.to_path_buf(),
        rules: reports,
        changed: patched != original,
    };
    Ok((report, original, patched))
}

/// Re-read `path` and report which markers occur in it.
pub fn verify(path: &Path, markers: &[Marker]) -> Result<VerifyReport, PatchError> {
    let doc = document::load(path)?;
    Ok(verify_document(path, &doc, markers))
}

pub fn verify_document(path: &Path, doc: &SourceDocument, markers: &[Marker]) -> VerifyReport {
    let checks = markers
        .iter()
        .map(|m| MarkerCheck {
            label: m.label.clone(),
            text: m.text.clone(),
            present: doc.contains(m.text.as_str()),
        })
        .collect();

    VerifyReport {
        file: path.to_path_buf(),
        checks,
        char_count: doc.char_count(),
    }
}
