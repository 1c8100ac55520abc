pub mod builtin;
pub mod loader;
pub mod schema;
pub mod version;

pub use loader::{
    discover, load_from_path, load_from_str, ConfigError, ManifestSource, LOCAL_MANIFEST,
};
pub use schema::{
    Action, Metadata, PatchManifest, TransformDefinition, ValidationError, ValidationIssue,
};
pub use version::{matches_requirement, VersionError};
