use crate::config::version::parse_requirement;
use crate::hooks::{Binding, Job, LifecycleEvent};
use crate::resolve::validate_relative;
use crate::transform::Transformation;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchManifest {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub transforms: Vec<TransformDefinition>,
}

impl PatchManifest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.transforms.is_empty() {
            issues.push(ValidationIssue::EmptyTransformList);
        }

        let mut seen = HashSet::new();
        for transform in &self.transforms {
            let id = transform.id.trim();
            if id.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: None,
                    field: "id",
                });
            } else if !seen.insert(id) {
                issues.push(ValidationIssue::DuplicateId { id: id.to_string() });
            }

            transform.validate_into(&mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Bindings for every transformation, in manifest order.
    ///
    /// Assumes the manifest has been validated.
    pub fn bindings(&self) -> Vec<Binding> {
        self.transforms.iter().map(TransformDefinition::binding).collect()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransformDefinition {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event: LifecycleEvent,
    /// Also attempt the transformation when the pipeline is configured
    #[serde(default)]
    pub eager: bool,
    #[serde(default)]
    pub version_range: Option<String>,
    pub action: Action,
}

impl TransformDefinition {
    fn validate_into(&self, issues: &mut Vec<ValidationIssue>) {
        let id = Some(self.id.clone());

        let path = self.action.path();
        if path.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                transform_id: id.clone(),
                field: "action.path",
            });
        } else if let Err(e) = validate_relative(Path::new(path)) {
            issues.push(ValidationIssue::InvalidPath {
                transform_id: id.clone(),
                message: e.to_string(),
            });
        }

        if let Some(range) = &self.version_range {
            if let Err(e) = parse_requirement(range) {
                issues.push(ValidationIssue::InvalidCombo {
                    transform_id: id.clone(),
                    message: e.to_string(),
                });
            }
        }

        if let Action::PatchFile {
            search,
            insert,
            marker,
            ..
        } = &self.action
        {
            if search.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: id.clone(),
                    field: "action.search",
                });
            }
            if insert.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: id.clone(),
                    field: "action.insert",
                });
            }
            if marker.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: id.clone(),
                    field: "action.marker",
                });
                return;
            }

            // The marker must appear once patched and not before
            let patched = format!("{search}{insert}");
            if !patched.contains(marker.as_str()) {
                issues.push(ValidationIssue::InvalidCombo {
                    transform_id: id.clone(),
                    message: "marker must occur in the patched text (search followed by insert)"
                        .to_string(),
                });
            }
            if !search.is_empty() && search.contains(marker.as_str()) {
                issues.push(ValidationIssue::InvalidCombo {
                    transform_id: id,
                    message: "marker must not occur in the search pattern itself".to_string(),
                });
            }
        }
    }

    pub fn transformation(&self) -> Transformation {
        self.action.transformation()
    }

    pub fn binding(&self) -> Binding {
        let mut job = Job::new(self.id.clone(), self.transformation());
        if let Some(range) = self.version_range.as_deref() {
            if let Ok(range) = parse_requirement(range) {
                job = job.with_version_range(range);
            }
        }
        Binding {
            event: self.event,
            eager: self.eager,
            job,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    /// Delete a subtree of the dependency
    PruneSubtree { path: String },
    /// Insert text after an exact search pattern
    PatchFile {
        path: String,
        search: String,
        insert: String,
        marker: String,
    },
}

impl Action {
    pub fn path(&self) -> &str {
        match self {
            Action::PruneSubtree { path } | Action::PatchFile { path, .. } => path,
        }
    }

    pub fn transformation(&self) -> Transformation {
        match self {
            Action::PruneSubtree { path } => Transformation::prune(path),
            Action::PatchFile {
                path,
                search,
                insert,
                marker,
            } => Transformation::patch(path, search, insert, marker),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyTransformList,
    MissingField {
        transform_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        id: String,
    },
    InvalidPath {
        transform_id: Option<String>,
        message: String,
    },
    InvalidCombo {
        transform_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTransformList => {
                write!(f, "manifest contains no transformations")
            }
            ValidationIssue::MissingField {
                transform_id,
                field,
            } => match transform_id {
                Some(id) => write!(f, "transform '{id}' missing required field '{field}'"),
                None => write!(f, "transform missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId { id } => {
                write!(f, "transform id '{id}' is declared more than once")
            }
            ValidationIssue::InvalidPath {
                transform_id,
                message,
            } => match transform_id {
                Some(id) => write!(f, "transform '{id}' has invalid path: {message}"),
                None => write!(f, "invalid transform path: {message}"),
            },
            ValidationIssue::InvalidCombo {
                transform_id,
                message,
            } => match transform_id {
                Some(id) => write!(f, "transform '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid transform configuration: {message}"),
            },
        }
    }
}
