//! Attaching transformations to build pipeline lifecycle events.
//!
//! The pipeline owns a hook table keyed by [`LifecycleEvent`]. Registration is
//! pure bookkeeping and cannot fail; failures only surface when the pipeline
//! fires an event, and even then they are reported rather than raised unless
//! the pipeline opted into strict mode.

use crate::config::version::{self, VersionGate};
use crate::context::BuildContext;
use crate::transform::{self, TransformError, TransformOutcome, Transformation};
use semver::VersionReq;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Named points in the build where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleEvent {
    /// Before the final binary/image is linked
    PreArtifact,
    /// After the final binary/image is linked
    PostArtifact,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 2] = [LifecycleEvent::PreArtifact, LifecycleEvent::PostArtifact];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::PreArtifact => "pre-artifact",
            LifecycleEvent::PostArtifact => "post-artifact",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-artifact" => Ok(LifecycleEvent::PreArtifact),
            "post-artifact" => Ok(LifecycleEvent::PostArtifact),
            other => Err(format!(
                "unknown lifecycle event '{other}' (expected pre-artifact or post-artifact)"
            )),
        }
    }
}

pub type HookResult = Result<TransformOutcome, TransformError>;

/// A registered callback. It receives the context of the build firing it.
pub type Hook = Box<dyn Fn(&BuildContext) -> HookResult>;

/// Hook registration surface exposed by a build pipeline.
pub trait HookRegistry {
    fn register_hook(&mut self, event: LifecycleEvent, label: String, hook: Hook);
}

/// A transformation plus the identity and gating it carries in a manifest.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub transformation: Transformation,
    pub version_range: Option<VersionReq>,
}

impl Job {
    pub fn new(id: impl Into<String>, transformation: Transformation) -> Self {
        Self {
            id: id.into(),
            transformation,
            version_range: None,
        }
    }

    pub fn with_version_range(mut self, range: VersionReq) -> Self {
        self.version_range = Some(range);
        self
    }

    fn gate(&self, ctx: &BuildContext) -> Option<TransformOutcome> {
        let range = self.version_range.as_ref()?;
        let dependency = self.transformation.dependency()?;
        match version::gate(ctx, dependency, range) {
            VersionGate::Proceed => None,
            VersionGate::Skip { reason } => {
                info!(id = %self.id, %reason, "skipping transformation");
                Some(TransformOutcome::SkippedVersion { reason })
            }
        }
    }

    /// Gate on the installed dependency version, then execute.
    pub fn run(&self, ctx: &BuildContext) -> HookResult {
        if let Some(skipped) = self.gate(ctx) {
            return Ok(skipped);
        }
        transform::execute(ctx, &self.transformation)
    }

    /// Read-only counterpart of [`Job::run`].
    pub fn inspect(&self, ctx: &BuildContext) -> HookResult {
        if let Some(skipped) = self.gate(ctx) {
            return Ok(skipped);
        }
        transform::inspect(ctx, &self.transformation)
    }
}

impl From<Transformation> for Job {
    fn from(transformation: Transformation) -> Self {
        let id = transformation.relative_path().display().to_string();
        Job::new(id, transformation)
    }
}

/// Register `job` to run whenever `event` fires.
pub fn bind<R>(registry: &mut R, event: LifecycleEvent, job: impl Into<Job>)
where
    R: HookRegistry + ?Sized,
{
    let job = job.into();
    let label = job.id.clone();
    debug!(id = %label, %event, "binding transformation");
    registry.register_hook(event, label, Box::new(move |ctx: &BuildContext| job.run(ctx)));
}

/// Apply `job` immediately, swallowing every failure.
///
/// Used at configuration time to patch dependencies that are already
/// installed without waiting for a build event. Returns the outcome when the
/// executor produced one, `None` when it errored.
pub fn try_eager_apply(ctx: &BuildContext, job: &Job) -> Option<TransformOutcome> {
    match job.run(ctx) {
        Ok(outcome) => {
            if outcome.is_satisfied() {
                info!(id = %job.id, %outcome, "eager apply");
            } else {
                info!(id = %job.id, %outcome, "eager apply deferred to build hook");
            }
            Some(outcome)
        }
        Err(err) => {
            info!(id = %job.id, error = %err, "eager apply failed, will retry at build hook");
            None
        }
    }
}

/// One hook's report from a fired event.
#[derive(Debug)]
pub struct HookReport {
    pub label: String,
    pub event: LifecycleEvent,
    pub result: HookResult,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("hook '{label}' failed during {event}: {source}")]
    HookFailed {
        label: String,
        event: LifecycleEvent,
        #[source]
        source: TransformError,
    },
}

/// In-memory hook table that fires hooks in registration order.
#[derive(Default)]
pub struct Pipeline {
    hooks: Vec<(LifecycleEvent, String, Hook)>,
    strict: bool,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "hooks",
                &self
                    .hooks
                    .iter()
                    .map(|(event, label, _)| (event, label))
                    .collect::<Vec<_>>(),
            )
            .field("strict", &self.strict)
            .finish()
    }
}

impl HookRegistry for Pipeline {
    fn register_hook(&mut self, event: LifecycleEvent, label: String, hook: Hook) {
        self.hooks.push((event, label, hook));
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escalate transformation I/O errors into a pipeline failure.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn registered(&self, event: LifecycleEvent) -> impl Iterator<Item = &str> {
        self.hooks
            .iter()
            .filter(move |(e, _, _)| *e == event)
            .map(|(_, label, _)| label.as_str())
    }

    /// Run every hook bound to `event`.
    ///
    /// In strict mode the first hook error stops the event and is returned;
    /// otherwise errors are carried in the reports.
    pub fn fire(
        &self,
        event: LifecycleEvent,
        ctx: &BuildContext,
    ) -> Result<Vec<HookReport>, PipelineError> {
        let mut reports = Vec::new();

        for (_, label, hook) in self.hooks.iter().filter(|(e, _, _)| *e == event) {
            debug!(id = %label, %event, "running hook");
            match hook(ctx) {
                Err(source) if self.strict => {
                    return Err(PipelineError::HookFailed {
                        label: label.clone(),
                        event,
                        source,
                    });
                }
                result => {
                    if let Err(err) = &result {
                        info!(id = %label, %event, error = %err, "hook failed");
                    }
                    reports.push(HookReport {
                        label: label.clone(),
                        event,
                        result,
                    });
                }
            }
        }

        Ok(reports)
    }
}

/// A job and where it attaches.
#[derive(Debug, Clone)]
pub struct Binding {
    pub event: LifecycleEvent,
    /// Also attempt the job immediately at configuration time
    pub eager: bool,
    pub job: Job,
}

/// Bind every binding to `registry`, then run the eager ones once.
///
/// Returns the eager attempts as `(id, outcome)` pairs, in binding order.
pub fn install<R>(
    registry: &mut R,
    ctx: &BuildContext,
    bindings: impl IntoIterator<Item = Binding>,
) -> Vec<(String, Option<TransformOutcome>)>
where
    R: HookRegistry + ?Sized,
{
    let mut eager = Vec::new();
    for binding in bindings {
        if binding.eager {
            eager.push(binding.job.clone());
        }
        bind(registry, binding.event, binding.job);
    }

    eager
        .into_iter()
        .map(|job| {
            let outcome = try_eager_apply(ctx, &job);
            (job.id, outcome)
        })
        .collect()
}
