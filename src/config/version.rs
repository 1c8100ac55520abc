//! Version gating against the installed dependency
//!
//! A transformation may declare `version_range = ">=9.0.0, <9.3.0"`. The
//! installed version is read from the dependency's own library manifest
//! (`library.json`, falling back to `library.properties`).

use crate::context::BuildContext;
use crate::resolve;
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Errors parsing version constraints
#[derive(Debug, Clone)]
pub enum VersionError {
    /// Invalid version string (e.g., "not-a-version")
    InvalidVersion { value: String, source: String },
    /// Invalid version requirement (e.g., ">=bad")
    InvalidRequirement { value: String, source: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid version '{}': {}", value, source)
            }
            VersionError::InvalidRequirement { value, source } => {
                write!(f, "invalid version requirement '{}': {}", value, source)
            }
        }
    }
}

impl std::error::Error for VersionError {}

pub fn parse_requirement(requirement: &str) -> Result<VersionReq, VersionError> {
    let trimmed = requirement.trim();
    VersionReq::parse(trimmed).map_err(|e| VersionError::InvalidRequirement {
        value: trimmed.to_string(),
        source: e.to_string(),
    })
}

/// Parse a version as dependency manifests write it (`v9.2.2`, `9.2`).
pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    let trimmed = version.trim().trim_start_matches('v');
    let padded = match trimmed.matches('.').count() {
        0 => format!("{trimmed}.0.0"),
        1 => format!("{trimmed}.0"),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        source: e.to_string(),
    })
}

/// Check if a version matches a requirement string
///
/// # Examples
///
/// ```
/// use libdeps_patcher::config::version::matches_requirement;
///
/// assert!(matches_requirement("9.2.2", Some(">=9.0.0")).unwrap());
/// assert!(!matches_requirement("8.3.11", Some(">=9.0.0")).unwrap());
///
/// // None requirement means "apply to all versions"
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    let Some(req_str) = requirement else {
        return Ok(true);
    };
    if req_str.trim().is_empty() {
        return Ok(true);
    }

    let version = parse_version(version)?;
    let req = parse_requirement(req_str)?;
    Ok(req.matches(&version))
}

#[derive(Deserialize)]
struct LibraryJson {
    version: Option<String>,
}

/// Read the version declared by the dependency installed at `dependency_dir`.
pub fn installed_version(dependency_dir: &Path) -> Option<String> {
    if let Ok(raw) = fs::read_to_string(dependency_dir.join("library.json")) {
        match serde_json::from_str::<LibraryJson>(&raw) {
            Ok(manifest) => return manifest.version,
            Err(e) => debug!(path = %dependency_dir.display(), error = %e, "unreadable library.json"),
        }
    }

    let raw = fs::read_to_string(dependency_dir.join("library.properties")).ok()?;
    raw.lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "version")
        .map(|(_, value)| value.trim().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionGate {
    Proceed,
    Skip { reason: String },
}

/// Decide whether a transformation on `dependency` may run.
///
/// An unknown or unparseable installed version lets the transformation
/// proceed; its own existence checks decide what happens next.
pub fn gate(ctx: &BuildContext, dependency: &str, range: &VersionReq) -> VersionGate {
    let Ok(dependency_dir) = resolve::resolve(ctx, Path::new(dependency)) else {
        return VersionGate::Proceed;
    };

    let Some(raw) = installed_version(&dependency_dir) else {
        debug!(dependency, "installed version unknown, not gating");
        return VersionGate::Proceed;
    };

    match parse_version(&raw) {
        Ok(version) if range.matches(&version) => VersionGate::Proceed,
        Ok(version) => VersionGate::Skip {
            reason: format!("{dependency} {version} does not satisfy version_range {range}"),
        },
        Err(e) => {
            debug!(dependency, error = %e, "installed version unparseable, not gating");
            VersionGate::Proceed
        }
    }
}
