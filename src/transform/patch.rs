use super::{TransformError, TransformOutcome};
use crate::edit::{Edit, EditResult};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Lines scoring below this are not worth suggesting.
const MIN_HINT_SIMILARITY: f64 = 0.6;

/// The line of a drifted file that most resembles the search pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftHint {
    /// 1-based line number
    pub line_number: usize,
    pub line: String,
    /// Normalized Levenshtein similarity in [0, 1]
    pub similarity: f64,
}

// Similarity comes from normalized_levenshtein and is never NaN
impl Eq for DriftHint {}

enum Plan {
    AlreadyApplied,
    PatternNotFound(Option<DriftHint>),
    Insert { edit: Edit, occurrences: usize },
}

fn plan(target: &Path, content: &str, search: &str, insertion: &str, marker: &str) -> Plan {
    // Marker first: a patched file must never be searched again
    if content.contains(marker) {
        return Plan::AlreadyApplied;
    }

    let starts: Vec<usize> = content.match_indices(search).map(|(idx, _)| idx).collect();
    let (Some(&first), Some(&last)) = (starts.first(), starts.last()) else {
        return Plan::PatternNotFound(closest_line(content, search));
    };

    // One span from the first match to the end of the last, so every
    // occurrence is patched in a single verified write
    let span_end = last + search.len();
    let mut new_text =
        String::with_capacity(span_end - first + starts.len() * insertion.len());
    let mut cursor = first;
    for start in &starts {
        let end = start + search.len();
        new_text.push_str(&content[cursor..end]);
        new_text.push_str(insertion);
        cursor = end;
    }

    Plan::Insert {
        edit: Edit::new(target, first, span_end, new_text, &content[first..span_end]),
        occurrences: starts.len(),
    }
}

/// An empty search, insertion or marker cannot move a file from unpatched
/// to patched.
fn ensure_well_formed(
    target: &Path,
    search: &str,
    insertion: &str,
    marker: &str,
) -> Result<(), TransformError> {
    let reason = if search.is_empty() {
        "search pattern is empty"
    } else if insertion.is_empty() {
        "insertion is empty"
    } else if marker.is_empty() {
        "idempotence marker is empty"
    } else {
        return Ok(());
    };
    Err(TransformError::InvalidPatch {
        path: target.to_path_buf(),
        reason,
    })
}

fn read(target: &Path) -> Result<Option<String>, TransformError> {
    match fs::read_to_string(target) {
        Ok(content) => Ok(Some(content)),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TransformError::io(target, source)),
    }
}

pub(super) fn apply(
    target: &Path,
    search: &str,
    insertion: &str,
    marker: &str,
) -> Result<TransformOutcome, TransformError> {
    ensure_well_formed(target, search, insertion, marker)?;
    let Some(content) = read(target)? else {
        warn!(path = %target.display(), "patch target not found");
        return Ok(TransformOutcome::TargetMissing {
            path: target.to_path_buf(),
        });
    };

    match plan(target, &content, search, insertion, marker) {
        Plan::AlreadyApplied => {
            info!(path = %target.display(), "patch already applied");
            Ok(TransformOutcome::AlreadyApplied {
                path: target.to_path_buf(),
            })
        }
        Plan::PatternNotFound(closest) => {
            match &closest {
                Some(hint) => warn!(
                    path = %target.display(),
                    line = hint.line_number,
                    closest = %hint.line.trim(),
                    "search pattern not found, upstream content may have changed"
                ),
                None => warn!(
                    path = %target.display(),
                    "search pattern not found, upstream content may have changed"
                ),
            }
            Ok(TransformOutcome::PatternNotFound {
                path: target.to_path_buf(),
                closest,
            })
        }
        Plan::Insert { edit, occurrences } => match edit.apply()? {
            EditResult::Applied { .. } => {
                info!(path = %target.display(), occurrences, "patched");
                Ok(TransformOutcome::Applied {
                    path: target.to_path_buf(),
                })
            }
            // Only reachable if the file changed between the read and the
            // write; the marker decides on the next run
            EditResult::AlreadyApplied { .. } => Ok(TransformOutcome::AlreadyApplied {
                path: target.to_path_buf(),
            }),
        },
    }
}

pub(super) fn check(
    target: &Path,
    search: &str,
    insertion: &str,
    marker: &str,
) -> Result<TransformOutcome, TransformError> {
    ensure_well_formed(target, search, insertion, marker)?;
    let path = target.to_path_buf();
    let Some(content) = read(target)? else {
        return Ok(TransformOutcome::TargetMissing { path });
    };

    Ok(match plan(target, &content, search, insertion, marker) {
        Plan::AlreadyApplied => TransformOutcome::AlreadyApplied { path },
        Plan::PatternNotFound(closest) => TransformOutcome::PatternNotFound { path, closest },
        Plan::Insert { edit, .. } => {
            edit.splice(&content)?;
            TransformOutcome::Applied { path }
        }
    })
}

/// Find the line most similar to the first non-blank line of `search`.
fn closest_line(content: &str, search: &str) -> Option<DriftHint> {
    let needle = search.lines().map(str::trim).find(|l| !l.is_empty())?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| DriftHint {
            line_number: idx + 1,
            line: line.to_string(),
            similarity: strsim::normalized_levenshtein(needle, line.trim()),
        })
        .filter(|hint| hint.similarity >= MIN_HINT_SIMILARITY)
        .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
}
