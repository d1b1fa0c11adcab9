//! Literal Patcher: ordered find-and-replace patching with marker verification
//!
//! A patch set names one target file, an ordered list of literal substitution
//! rules, and a list of markers. Patching loads the file, folds every rule over
//! it, writes it back once, and then re-reads it to check the markers.
//!
//! # Behavior
//!
//! - Search text is literal, never a pattern
//! - Each rule replaces at most `count` leftmost occurrences (default 1)
//! - A rule whose anchor is missing is a no-op and never aborts the run; its
//!   [`RuleOutcome`] tells "already applied" apart from "anchor not found"
//! - Files are read as UTF-8 with line endings normalized to `\n`, and written
//!   atomically with the configured line ending (CRLF by default)
//!
//! # Example
//!
//! ```no_run
//! use literal_patcher::{patch_file, verify, LineEnding, Marker, SubstitutionRule};
//! use std::path::Path;
//!
//! let path = Path::new("components/Dashboard.tsx");
//! let rules = vec![SubstitutionRule::new(
//!     "insert-popup",
//!     "// ─── Admin Package Editor Modal",
//!     "function Popup() {}\n\n// ─── Admin Package Editor Modal",
//! )
//! .skip_if_present("function Popup")];
//!
//! let report = patch_file(path, &rules, LineEnding::Crlf)?;
//! println!("{} rule(s) applied", report.applied());
//!
//! let markers = [Marker::new("Popup function", "function Popup")];
//! println!("{}", verify(path, &markers)?);
//! # Ok::<(), literal_patcher::PatchError>(())
//! ```

pub mod config;
pub mod document;
pub mod patcher;
pub mod rule;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, PatchConfig};
pub use document::{load, save, DocumentError, LineEnding, SourceDocument};
pub use patcher::{
    apply_rules, check_file, patch_file, preview_file, verify, verify_document, Marker,
    MarkerCheck, PatchError, PatchReport, RuleReport, VerifyReport,
};
pub use rule::{apply_rule, replace_first_n, NearMiss, RuleOutcome, SubstitutionRule};
