use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Byte-span replacement with verification of the text being replaced.
///
/// Patch transformations compile down to one of these: the span covers the
/// matched search pattern and the new text is the pattern followed by the
/// insertion, so the surrounding file content is never re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply() is called"]
pub struct Edit {
    /// File to edit (already resolved)
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Text written over [byte_start, byte_end)
    pub new_text: String,
    /// What we expect to find at the span before writing
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (used for long search patterns)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at {file}:{byte_start}")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in file of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("Byte range [{byte_start}, {byte_end}) splits a UTF-8 character")]
    NotCharBoundary { byte_start: usize, byte_end: usize },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    Applied { file: PathBuf, bytes_changed: usize },
    /// Current text at the span already equals new_text
    AlreadyApplied { file: PathBuf },
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(&expected),
        }
    }

    /// Check the span against `content` and return the text currently there.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                file_len: content.len(),
            });
        }

        let current = content
            .get(self.byte_start..self.byte_end)
            .ok_or(EditError::NotCharBoundary {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            })?;

        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            });
        }

        Ok(current)
    }

    /// Splice the edit into `content` without touching the filesystem.
    ///
    /// Returns `None` when the span already holds `new_text`.
    pub fn splice(&self, content: &str) -> Result<Option<String>, EditError> {
        let current = self.validate(content)?;
        if current == self.new_text {
            return Ok(None);
        }

        let mut spliced =
            String::with_capacity(content.len() + self.new_text.len() - current.len());
        spliced.push_str(&content[..self.byte_start]);
        spliced.push_str(&self.new_text);
        spliced.push_str(&content[self.byte_end..]);
        Ok(Some(spliced))
    }

    /// Apply this edit to the file atomically.
    ///
    /// The file is re-read so a change made after the span was computed is
    /// caught by verification instead of being overwritten.
    pub fn apply(&self) -> Result<EditResult, EditError> {
        let original = fs::read_to_string(&self.file)?;

        let Some(new_content) = self.splice(&original)? else {
            return Ok(EditResult::AlreadyApplied {
                file: self.file.clone(),
            });
        };

        atomic_write(&self.file, new_content.as_bytes())?;

        // Bump mtime so incremental builds pick up the patched source
        filetime::set_file_mtime(&self.file, filetime::FileTime::now())?;

        Ok(EditResult::Applied {
            file: self.file.clone(),
            bytes_changed: self.new_text.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The replacement keeps the permissions of the file it replaces.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Some(permissions) = permissions {
        fs::set_permissions(temp.path(), permissions)?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
