//! Transformation executor.
//!
//! A transformation is a pure function of the current file tree and its
//! descriptor: every run re-inspects the filesystem to decide what to do, so
//! repeated runs across clean and incremental builds are safe.
//!
//! - [`apply`] mutates the tree and logs what happened
//! - [`check`] evaluates the same decision without writing anything
//! - [`execute`] resolves the target from a [`BuildContext`] first

mod patch;
mod prune;

pub use patch::DriftHint;

use crate::context::BuildContext;
use crate::edit::EditError;
use crate::resolve::{self, ResolutionError};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A declared mutation of a vendored dependency tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformation {
    /// Recursively delete a subtree that must not be compiled.
    PruneSubtree { relative_path: PathBuf },
    /// Insert text right after every occurrence of `search_pattern`.
    ///
    /// `idempotence_marker` must be absent before the patch and present
    /// after it; its presence short-circuits the patch.
    PatchFile {
        relative_path: PathBuf,
        search_pattern: String,
        insertion: String,
        idempotence_marker: String,
    },
}

impl Transformation {
    pub fn prune(relative_path: impl Into<PathBuf>) -> Self {
        Transformation::PruneSubtree {
            relative_path: relative_path.into(),
        }
    }

    pub fn patch(
        relative_path: impl Into<PathBuf>,
        search_pattern: impl Into<String>,
        insertion: impl Into<String>,
        idempotence_marker: impl Into<String>,
    ) -> Self {
        Transformation::PatchFile {
            relative_path: relative_path.into(),
            search_pattern: search_pattern.into(),
            insertion: insertion.into(),
            idempotence_marker: idempotence_marker.into(),
        }
    }

    /// Path of the target relative to `<cache_root>/<target_id>`.
    pub fn relative_path(&self) -> &Path {
        match self {
            Transformation::PruneSubtree { relative_path }
            | Transformation::PatchFile { relative_path, .. } => relative_path,
        }
    }

    /// Name of the dependency directory the target lives in.
    pub fn dependency(&self) -> Option<&str> {
        self.relative_path()
            .components()
            .find_map(|c| match c {
                std::path::Component::Normal(name) => name.to_str(),
                _ => None,
            })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Transformation::PruneSubtree { .. } => "prune-subtree",
            Transformation::PatchFile { .. } => "patch-file",
        }
    }
}

/// Terminal status of a single invocation. None of these abort a build.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "TransformOutcome should be reported"]
pub enum TransformOutcome {
    /// The tree was changed (or, from [`check`], would be)
    Applied { path: PathBuf },
    /// The idempotence marker is already present
    AlreadyApplied { path: PathBuf },
    /// Nothing exists at the resolved path
    TargetMissing { path: PathBuf },
    /// The file exists but no longer contains the search pattern
    PatternNotFound {
        path: PathBuf,
        closest: Option<DriftHint>,
    },
    /// The build context did not yet allow resolving a path
    ResolutionFailed { reason: ResolutionError },
    /// The installed dependency version is outside the declared range
    SkippedVersion { reason: String },
}

impl TransformOutcome {
    /// Applied or already applied.
    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            TransformOutcome::Applied { .. } | TransformOutcome::AlreadyApplied { .. }
        )
    }
}

impl fmt::Display for TransformOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOutcome::Applied { path } => write!(f, "Applied to {}", path.display()),
            TransformOutcome::AlreadyApplied { path } => {
                write!(f, "Already applied to {}", path.display())
            }
            TransformOutcome::TargetMissing { path } => {
                write!(f, "Target missing: {}", path.display())
            }
            TransformOutcome::PatternNotFound { path, .. } => {
                write!(f, "Pattern not found in {}", path.display())
            }
            TransformOutcome::ResolutionFailed { reason } => {
                write!(f, "Unresolved: {}", reason)
            }
            TransformOutcome::SkippedVersion { reason } => {
                write!(f, "Skipped (version): {}", reason)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("{} is not valid UTF-8 text", path.display())]
    Encoding { path: PathBuf },

    #[error("patch for {} is malformed: {reason}", path.display())]
    InvalidPatch { path: PathBuf, reason: &'static str },

    #[error("edit error: {0}")]
    Edit(#[from] EditError),
}

impl TransformError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::InvalidData {
            TransformError::Encoding {
                path: path.to_path_buf(),
            }
        } else {
            TransformError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Apply `transformation` to the already-resolved `target`.
pub fn apply(
    target: &Path,
    transformation: &Transformation,
) -> Result<TransformOutcome, TransformError> {
    match transformation {
        Transformation::PruneSubtree { .. } => prune::apply(target),
        Transformation::PatchFile {
            search_pattern,
            insertion,
            idempotence_marker,
            ..
        } => patch::apply(target, search_pattern, insertion, idempotence_marker),
    }
}

/// Read-only counterpart of [`apply`]; `Applied` means "would apply".
pub fn check(
    target: &Path,
    transformation: &Transformation,
) -> Result<TransformOutcome, TransformError> {
    match transformation {
        Transformation::PruneSubtree { .. } => prune::check(target),
        Transformation::PatchFile {
            search_pattern,
            insertion,
            idempotence_marker,
            ..
        } => patch::check(target, search_pattern, insertion, idempotence_marker),
    }
}

/// Resolve the transformation's target from `ctx` and apply it.
///
/// An unresolvable context is reported as [`TransformOutcome::ResolutionFailed`]
/// and no filesystem access happens.
pub fn execute(
    ctx: &BuildContext,
    transformation: &Transformation,
) -> Result<TransformOutcome, TransformError> {
    match resolve::resolve(ctx, transformation.relative_path()) {
        Ok(target) => apply(&target, transformation),
        Err(reason) => {
            debug!(%reason, "skipping transformation, target not resolvable");
            Ok(TransformOutcome::ResolutionFailed { reason })
        }
    }
}

/// Read-only counterpart of [`execute`].
pub fn inspect(
    ctx: &BuildContext,
    transformation: &Transformation,
) -> Result<TransformOutcome, TransformError> {
    match resolve::resolve(ctx, transformation.relative_path()) {
        Ok(target) => check(&target, transformation),
        Err(reason) => Ok(TransformOutcome::ResolutionFailed { reason }),
    }
}
