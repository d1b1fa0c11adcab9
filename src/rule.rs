//! Literal substitution rules.
//!
//! A rule never fails. When its search literal is absent the document comes
//! back untouched, and the [`RuleOutcome`] says whether that is because the
//! rule already ran or because the anchor drifted away.

use crate::document::SourceDocument;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity a line must reach before it is offered as a near-miss hint.
const HINT_THRESHOLD: f64 = 0.6;

fn default_count() -> usize {
    1
}

/// One ordered (search, replacement, max-count) substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub id: String,
    /// Literal anchor text; never interpreted as a pattern
    pub search: String,
    pub replace: String,
    /// Maximum number of leftmost occurrences to replace
    #[serde(default = "default_count")]
    pub count: usize,
    /// Literal whose presence means the rule has already run
    #[serde(default)]
    pub skip_if_present: Option<String>,
}

impl SubstitutionRule {
    pub fn new(id: impl Into<String>, search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            search: search.into(),
            replace: replace.into(),
            count: 1,
            skip_if_present: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn skip_if_present(mut self, guard: impl Into<String>) -> Self {
        self.skip_if_present = Some(guard.into());
        self
    }
}

/// What happened when a rule was applied to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[must_use = "RuleOutcome distinguishes a missing anchor from an already-applied rule"]
pub enum RuleOutcome {
    /// The anchor was found and replaced this many times
    Applied { replacements: usize },
    /// The rule's guard is present, or (for an unguarded rule whose
    /// replacement does not embed its anchor) the anchor is gone and the
    /// replacement text is present.
    ///
    /// The second form is a heuristic: a short or common replacement string
    /// can be present even though the anchor drifted. Give such rules a
    /// distinctive `skip_if_present` guard.
    AlreadyApplied,
    /// Neither the anchor nor any trace of the rule was found
    AnchorNotFound { hint: Option<NearMiss> },
}

impl RuleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RuleOutcome::Applied { .. })
    }

    pub fn is_anchor_missing(&self) -> bool {
        matches!(self, RuleOutcome::AnchorNotFound { .. })
    }
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutcome::Applied { replacements } => {
                write!(f, "applied ({replacements} replacement(s))")
            }
            RuleOutcome::AlreadyApplied => write!(f, "already applied"),
            RuleOutcome::AnchorNotFound { hint: None } => write!(f, "anchor not found"),
            RuleOutcome::AnchorNotFound { hint: Some(hint) } => {
                write!(f, "anchor not found (closest: {hint})")
            }
        }
    }
}

/// The document line most similar to the first line of a missing anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearMiss {
    /// 1-based line number
    pub line: usize,
    pub text: String,
    pub similarity: f64,
}

impl Eq for NearMiss {}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} {:?} ({:.0}% similar)",
            self.line,
            self.text,
            self.similarity * 100.0
        )
    }
}

/// Replace the first `n` occurrences of `search` in `text`.
///
/// Returns the new text and how many replacements were made. An empty
/// `search` or `n == 0` leaves the text alone.
pub fn replace_first_n(text: &str, search: &str, replace: &str, n: usize) -> (String, usize) {
    if search.is_empty() || n == 0 {
        return (text.to_string(), 0);
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut replaced = 0;

    for (start, matched) in text.match_indices(search).take(n) {
        out.push_str(&text[last..start]);
        out.push_str(replace);
        last = start + matched.len();
        replaced += 1;
    }
    out.push_str(&text[last..]);

    (out, replaced)
}

/// Apply one rule to a document.
pub fn apply_rule(doc: SourceDocument, rule: &SubstitutionRule) -> (SourceDocument, RuleOutcome) {
    if let Some(guard) = rule.skip_if_present.as_deref() {
        if !guard.is_empty() && doc.contains(guard) {
            return (doc, RuleOutcome::AlreadyApplied);
        }
    }

    let (text, replacements) = replace_first_n(&doc, &rule.search, &rule.replace, rule.count);
    if replacements > 0 {
        return (
            SourceDocument::new(text),
            RuleOutcome::Applied { replacements },
        );
    }

    if replacement_marks_applied(rule) && doc.contains(rule.replace.as_str()) {
        return (doc, RuleOutcome::AlreadyApplied);
    }

    let hint = nearest_line(&doc, &rule.search);
    (doc, RuleOutcome::AnchorNotFound { hint })
}

/// Whether finding the replacement text may stand in for "already applied".
///
/// Guarded rules answer that through their guard alone. An insertion whose
/// replacement embeds the anchor can never have the replacement present with
/// the anchor missing, so it is excluded too.
fn replacement_marks_applied(rule: &SubstitutionRule) -> bool {
    rule.skip_if_present.is_none()
        && !rule.replace.is_empty()
        && !rule.replace.contains(rule.search.as_str())
}

/// Find the line closest to the first non-blank line of `search`.
fn nearest_line(text: &str, search: &str) -> Option<NearMiss> {
    let needle = search.lines().map(str::trim).find(|l| !l.is_empty())?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let similarity = strsim::normalized_levenshtein(line.trim(), needle);
            (idx, line, similarity)
        })
        .filter(|(_, _, similarity)| *similarity >= HINT_THRESHOLD)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(idx, line, similarity)| NearMiss {
            line: idx + 1,
            text: line.trim().to_string(),
            similarity,
        })
}
