use std::path::{Path, PathBuf};

/// Configuration a pipeline hands to every hook invocation.
///
/// Both values may be unknown while the pipeline is still being configured
/// (the dependency cache is populated later), so they are optional rather
/// than required. Nothing in the library reads process-wide state; callers
/// construct a context explicitly and pass it down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    /// Dependency cache root (PlatformIO: `PROJECT_LIBDEPS_DIR`)
    pub cache_root: Option<PathBuf>,
    /// Build target / environment identifier (PlatformIO: `PIOENV`)
    pub target_id: Option<String>,
}

impl BuildContext {
    pub fn new(cache_root: impl Into<PathBuf>, target_id: impl Into<String>) -> Self {
        Self {
            cache_root: Some(cache_root.into()),
            target_id: Some(target_id.into()),
        }
    }

    /// Build a context from values that may be missing or blank.
    ///
    /// Blank strings are normalized to `None` so resolution treats them the
    /// same way as an unset variable.
    pub fn from_parts(cache_root: Option<PathBuf>, target_id: Option<String>) -> Self {
        Self {
            cache_root: cache_root.filter(|p| !p.as_os_str().is_empty()),
            target_id: target_id.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn cache_root(&self) -> Option<&Path> {
        self.cache_root.as_deref()
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// True once both values needed for resolution are known.
    pub fn is_complete(&self) -> bool {
        self.cache_root().is_some_and(|p| !p.as_os_str().is_empty())
            && self.target_id().is_some_and(|t| !t.trim().is_empty())
    }
}
