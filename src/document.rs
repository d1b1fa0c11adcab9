use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use thiserror::Error;

const UTF8_BOM: char = '\u{feff}';

/// Full text of one target file, with line endings normalized to `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDocument {
    text: String,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Length in characters (not bytes), as reported by the verification step.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

impl Deref for SourceDocument {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl From<String> for SourceDocument {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for SourceDocument {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl fmt::Display for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Line-ending convention used when writing a document back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("File is not valid UTF-8: {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Permission denied writing {0}")]
    PermissionDenied(PathBuf),

    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DocumentError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => DocumentError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => DocumentError::PermissionDenied(path.to_path_buf()),
            _ => DocumentError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Read a file as UTF-8 text.
///
/// A leading byte-order mark is dropped and `\r\n` / lone `\r` are folded into
/// `\n`, so multi-line search literals match regardless of how the file was
/// last written.
pub fn load(path: impl AsRef<Path>) -> Result<SourceDocument, DocumentError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| DocumentError::from_io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|source| DocumentError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text);
    Ok(SourceDocument::new(normalize_newlines(text)))
}

/// Write a document, overwriting `path`, with every line break written as `line_ending`.
///
/// Output is UTF-8 without a byte-order mark. An existing target keeps its
/// permissions; a read-only target is refused.
pub fn save(
    path: impl AsRef<Path>,
    doc: &SourceDocument,
    line_ending: LineEnding,
) -> Result<(), DocumentError> {
    let path = path.as_ref();

    let permissions = match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {
            return Err(DocumentError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "target is a directory"),
            });
        }
        Ok(meta) if meta.permissions().readonly() => {
            return Err(DocumentError::PermissionDenied(path.to_path_buf()));
        }
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(DocumentError::from_io(path, e)),
    };

    let normalized = normalize_newlines(doc.as_str());
    let content = match line_ending {
        LineEnding::Lf => normalized,
        LineEnding::Crlf => normalized.replace('\n', LineEnding::Crlf.as_str()),
    };
    atomic_write(path, content.as_bytes(), permissions)
        .map_err(|e| DocumentError::from_io(path, e))
}

/// Fold `\r\n` and lone `\r` into `\n`.
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(
    path: &Path,
    content: &[u8],
    permissions: Option<fs::Permissions>,
) -> io::Result<()> {
    // Tempfile must live on the same filesystem for rename to be atomic
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(dir.path().join("absent.tsx"));
        assert!(matches!(result, Err(DocumentError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.tsx");
        fs::write(&path, b"fo\xff\xfeo").unwrap();

        let result = load(&path);
        assert!(matches!(result, Err(DocumentError::Decode { .. })));
    }

    #[test]
    fn test_load_normalizes_line_endings_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.tsx");
        fs::write(&path, "\u{feff}one\r\ntwo\rthree\n").unwrap();

        let doc = load(&path).unwrap();
        assert_eq!(doc.as_str(), "one\ntwo\nthree\n");
    }

    #[test]
    fn test_save_writes_crlf_without_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsx");

        save(&path, &SourceDocument::from("a\nb\n"), LineEnding::Crlf).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(raw, b"a\r\nb\r\n");
    }

    #[test]
    fn test_save_lf_keeps_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsx");

        save(&path, &SourceDocument::from("a\nb"), LineEnding::Lf).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb");
    }

    #[test]
    fn test_save_overwrites_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsx");
        fs::write(&path, "a much longer original body").unwrap();

        save(&path, &SourceDocument::from("short"), LineEnding::Crlf).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.tsx");

        let result = save(&path, &SourceDocument::from("x"), LineEnding::Crlf);
        assert!(matches!(result, Err(DocumentError::NotFound(_))));
    }

    #[test]
    fn test_save_refuses_read_only_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.tsx");
        fs::write(&path, "original").unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        let result = save(&path, &SourceDocument::from("patched"), LineEnding::Crlf);
        assert!(matches!(result, Err(DocumentError::PermissionDenied(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_save_onto_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("components");
        fs::create_dir(&path).unwrap();

        let result = save(&path, &SourceDocument::from("x"), LineEnding::Crlf);
        assert!(matches!(result, Err(DocumentError::Io { .. })));
        assert!(path.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_preserves_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.tsx");
        fs::write(&path, "a\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save(&path, &SourceDocument::from("b\n"), LineEnding::Crlf).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(fs::read(&path).unwrap(), b"b\r\n");
    }

    #[test]
    fn test_save_does_not_double_existing_carriage_returns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.tsx");

        save(&path, &SourceDocument::from("a\r\nb\rc\n"), LineEnding::Crlf).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"a\r\nb\r\nc\r\n");

        save(&path, &SourceDocument::from("a\r\nb"), LineEnding::Lf).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"a\nb");
    }

    #[test]
    fn test_char_count_counts_chars_not_bytes() {
        let doc = SourceDocument::from("+₹100");
        assert_eq!(doc.char_count(), 5);
        assert_eq!(doc.len(), 7);
    }

    proptest! {
        #[test]
        fn prop_save_then_load_round_trips(text in "[a-z₹─ \\r\\n]{0,64}") {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("round.txt");
            let doc = SourceDocument::new(text.clone());

            save(&path, &doc, LineEnding::Crlf).unwrap();
            let loaded = load(&path).unwrap();

            prop_assert_eq!(loaded.as_str(), normalize_newlines(&text));
        }
    }
}
