//! Finding, reading and validating a patch manifest.
//!
//! Discovery order:
//! 1. an explicit path (`--manifest` or `LIBDEPS_PATCHES`)
//! 2. `libdeps-patches.toml` in the project directory
//! 3. the built-in manifest
//!
//! An explicit path that cannot be read is an error; it never falls back.

use crate::config::builtin::BUILTIN_MANIFEST;
use crate::config::schema::{PatchManifest, ValidationError};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name looked up in the project directory.
pub const LOCAL_MANIFEST: &str = "libdeps-patches.toml";

/// Where a manifest came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Explicit(PathBuf),
    /// `libdeps-patches.toml` next to the project
    Local(PathBuf),
    Builtin,
    /// Parsed from a string handed in by the caller
    Inline,
}

impl ManifestSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ManifestSource::Explicit(path) | ManifestSource::Local(path) => Some(path),
            ManifestSource::Builtin | ManifestSource::Inline => None,
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::Explicit(path) | ManifestSource::Local(path) => {
                write!(f, "{}", path.display())
            }
            ManifestSource::Builtin => f.write_str("built-in"),
            ManifestSource::Inline => f.write_str("<inline>"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest {origin} is not valid TOML: {source}")]
    Parse {
        origin: ManifestSource,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("manifest {origin} is invalid:\n{source}")]
    Invalid {
        origin: ManifestSource,
        #[source]
        source: ValidationError,
    },
}

/// Parse and validate manifest text, attributing errors to `origin`.
pub fn parse(input: &str, origin: ManifestSource) -> Result<PatchManifest, ConfigError> {
    let manifest: PatchManifest = match toml_edit::de::from_str(input) {
        Ok(manifest) => manifest,
        Err(source) => return Err(ConfigError::Parse { origin, source }),
    };
    match manifest.validate() {
        Ok(()) => Ok(manifest),
        Err(source) => Err(ConfigError::Invalid { origin, source }),
    }
}

pub fn load_from_str(input: &str) -> Result<PatchManifest, ConfigError> {
    parse(input, ManifestSource::Inline)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchManifest, ConfigError> {
    let path = path.as_ref();
    read_and_parse(ManifestSource::Explicit(path.to_path_buf()))
}

fn read_and_parse(origin: ManifestSource) -> Result<PatchManifest, ConfigError> {
    let Some(path) = origin.path() else {
        return parse(BUILTIN_MANIFEST, origin);
    };
    let input = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&input, origin)
}

/// Pick the manifest for a project rooted at `project_dir`.
///
/// Pass an empty path to look in the current working directory and keep the
/// reported path relative.
pub fn discover(
    project_dir: &Path,
    explicit: Option<&Path>,
) -> Result<(ManifestSource, PatchManifest), ConfigError> {
    let origin = match explicit {
        Some(path) => ManifestSource::Explicit(path.to_path_buf()),
        None => {
            let local = project_dir.join(LOCAL_MANIFEST);
            if local.is_file() {
                ManifestSource::Local(local)
            } else {
                debug!(path = %local.display(), "no project manifest, using built-in");
                ManifestSource::Builtin
            }
        }
    };

    let manifest = read_and_parse(origin.clone())?;
    Ok((origin, manifest))
}
