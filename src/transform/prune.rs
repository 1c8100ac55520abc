use super::{TransformError, TransformOutcome};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

pub(super) fn apply(target: &Path) -> Result<TransformOutcome, TransformError> {
    let metadata = match fs::symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            debug!(path = %target.display(), "prune target absent, nothing to remove");
            return Ok(TransformOutcome::TargetMissing {
                path: target.to_path_buf(),
            });
        }
        Err(source) => return Err(TransformError::io(target, source)),
    };

    if metadata.is_dir() {
        let files = count_files(target);
        fs::remove_dir_all(target).map_err(|source| TransformError::io(target, source))?;
        info!(path = %target.display(), files, "removed subtree");
    } else {
        // Plain files and symlinks: only the entry itself goes
        fs::remove_file(target).map_err(|source| TransformError::io(target, source))?;
        info!(path = %target.display(), "removed file");
    }

    Ok(TransformOutcome::Applied {
        path: target.to_path_buf(),
    })
}

pub(super) fn check(target: &Path) -> Result<TransformOutcome, TransformError> {
    match fs::symlink_metadata(target) {
        Ok(_) => Ok(TransformOutcome::Applied {
            path: target.to_path_buf(),
        }),
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            Ok(TransformOutcome::TargetMissing {
                path: target.to_path_buf(),
            })
        }
        Err(source) => Err(TransformError::io(target, source)),
    }
}

fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .count()
}
