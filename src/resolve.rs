//! Dependency tree path resolution.
//!
//! Resolution is purely syntactic: it joins the cache root, the target id and
//! the relative segments of a transformation. It never touches the
//! filesystem, so it is safe to call before the dependency cache exists.

use crate::context::BuildContext;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("dependency cache root is not known yet")]
    MissingCacheRoot,

    #[error("build target id is not known yet")]
    MissingTargetId,

    #[error("target id '{0}' is not a single path segment")]
    InvalidTargetId(String),

    #[error("relative path '{}' must stay inside the dependency tree", .0.display())]
    EscapesTree(PathBuf),
}

impl ResolutionError {
    /// Missing inputs are expected during early configuration and are not
    /// worth surfacing; a malformed path is a manifest bug.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ResolutionError::MissingCacheRoot | ResolutionError::MissingTargetId
        )
    }
}

/// Root of the per-target dependency tree: `<cache_root>/<target_id>`.
pub fn target_root(ctx: &BuildContext) -> Result<PathBuf, ResolutionError> {
    let cache_root = ctx
        .cache_root()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(ResolutionError::MissingCacheRoot)?;
    // Blank means unset; anything else is joined exactly as given
    let target_id = ctx
        .target_id()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ResolutionError::MissingTargetId)?;

    let mut components = Path::new(target_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return Err(ResolutionError::InvalidTargetId(target_id.to_string())),
    }

    Ok(cache_root.join(target_id))
}

/// Check that `relative` names something strictly below the tree root.
///
/// Absolute paths, `..` components and paths with no normal segment are
/// rejected.
pub fn validate_relative(relative: &Path) -> Result<(), ResolutionError> {
    let mut normal = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ResolutionError::EscapesTree(relative.to_path_buf()));
            }
        }
    }

    if normal == 0 {
        return Err(ResolutionError::EscapesTree(relative.to_path_buf()));
    }
    Ok(())
}

/// Resolve `relative` against `<cache_root>/<target_id>`.
///
/// `relative` is the dependency-internal layout, e.g.
/// `lvgl/src/core/lv_refr.c`.
pub fn resolve(ctx: &BuildContext, relative: &Path) -> Result<PathBuf, ResolutionError> {
    let root = target_root(ctx)?;
    validate_relative(relative)?;

    Ok(relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .fold(root, |mut resolved, segment| {
            resolved.push(segment);
            resolved
        }))
}

/// Convenience form of [`resolve`] taking individual segments.
pub fn resolve_segments<I, S>(ctx: &BuildContext, segments: I) -> Result<PathBuf, ResolutionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<Path>,
{
    let relative: PathBuf = segments.into_iter().collect();
    resolve(ctx, &relative)
}
