use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use libdeps_patcher::config::builtin::BUILTIN_MANIFEST;
use libdeps_patcher::config::{discover, ManifestSource};
use libdeps_patcher::hooks::HookReport;
use libdeps_patcher::{
    install, resolve, BuildContext, LifecycleEvent, PatchManifest, Pipeline, TransformError,
    TransformOutcome, Transformation,
};
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "libdeps-patcher")]
#[command(about = "Prune and patch vendored dependency trees during a build", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply transformations bound to a lifecycle event
    Apply {
        #[command(flatten)]
        context: ContextArgs,

        /// Patch manifest (defaults to ./libdeps-patches.toml, then the built-in set)
        #[arg(short, long, env = "LIBDEPS_PATCHES")]
        manifest: Option<PathBuf>,

        /// Lifecycle event to fire
        #[arg(short, long, value_enum, default_value_t = EventArg::All)]
        event: EventArg,

        /// Also run transformations marked eager before firing the event
        #[arg(long)]
        eager: bool,

        /// Fail when a transformation hits an I/O error
        #[arg(long)]
        strict: bool,

        /// Show unified diff of patched files
        #[arg(short, long)]
        diff: bool,
    },

    /// Check status of transformations without applying
    Status {
        #[command(flatten)]
        context: ContextArgs,

        /// Patch manifest (defaults to ./libdeps-patches.toml, then the built-in set)
        #[arg(short, long, env = "LIBDEPS_PATCHES")]
        manifest: Option<PathBuf>,
    },

    /// List transformations in a manifest
    List {
        /// Patch manifest (defaults to ./libdeps-patches.toml, then the built-in set)
        #[arg(short, long, env = "LIBDEPS_PATCHES")]
        manifest: Option<PathBuf>,
    },

    /// Print the built-in manifest
    Builtin,
}

#[derive(Args)]
struct ContextArgs {
    /// Dependency cache root
    #[arg(long, env = "PROJECT_LIBDEPS_DIR")]
    cache_root: Option<PathBuf>,

    /// Build target / environment id
    #[arg(long = "target", env = "PIOENV")]
    target_id: Option<String>,
}

impl ContextArgs {
    fn build(self) -> BuildContext {
        BuildContext::from_parts(self.cache_root, self.target_id)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EventArg {
    PreArtifact,
    PostArtifact,
    All,
}

impl EventArg {
    fn events(self) -> Vec<LifecycleEvent> {
        match self {
            EventArg::PreArtifact => vec![LifecycleEvent::PreArtifact],
            EventArg::PostArtifact => vec![LifecycleEvent::PostArtifact],
            EventArg::All => LifecycleEvent::ALL.to_vec(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("libdeps_patcher=warn"),
        1 => EnvFilter::new("libdeps_patcher=info"),
        _ => EnvFilter::new("libdeps_patcher=debug"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Apply {
            context,
            manifest,
            event,
            eager,
            strict,
            diff,
        } => cmd_apply(context.build(), manifest, event, eager, strict, diff),

        Commands::Status { context, manifest } => cmd_status(context.build(), manifest),

        Commands::List { manifest } => cmd_list(manifest),

        Commands::Builtin => {
            print!("{BUILTIN_MANIFEST}");
            Ok(())
        }
    }
}

/// Discover the manifest relative to the current working directory.
fn load_manifest(explicit: Option<PathBuf>) -> Result<(ManifestSource, PatchManifest)> {
    Ok(discover(Path::new(""), explicit.as_deref())?)
}

fn print_context(ctx: &BuildContext) {
    let shown = |value: Option<String>| value.unwrap_or_else(|| "(unset)".to_string());
    println!(
        "Cache root: {}",
        shown(ctx.cache_root().map(|p| p.display().to_string()))
    );
    println!("Target: {}", shown(ctx.target_id().map(str::to_string)));
    if !ctx.is_complete() {
        println!(
            "{}",
            "Dependency cache not configured yet; transformations will be skipped".dimmed()
        );
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Summary bucket for one transformation, ordered by how much it matters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Status {
    Skipped,
    Missing,
    AlreadyApplied,
    Drifted,
    Applied,
    Failed,
}

/// Per-transformation results. A transformation seen at several stages
/// (eager, then its event) is counted once, under its most significant status.
#[derive(Default)]
struct Tally {
    statuses: Vec<(String, Status)>,
}

impl Tally {
    fn record(&mut self, id: &str, result: &Result<TransformOutcome, TransformError>) {
        let status = match result {
            Ok(TransformOutcome::Applied { path }) => {
                println!("{} {}: Applied to {}", "✓".green(), id, path.display());
                Status::Applied
            }
            Ok(TransformOutcome::AlreadyApplied { path }) => {
                println!(
                    "{} {}: Already applied to {}",
                    "⊙".yellow(),
                    id,
                    path.display()
                );
                Status::AlreadyApplied
            }
            Ok(TransformOutcome::TargetMissing { path }) => {
                println!(
                    "{} {}: Not present at {}",
                    "⊘".cyan(),
                    id,
                    path.display()
                );
                Status::Missing
            }
            Ok(TransformOutcome::PatternNotFound { path, closest }) => {
                eprintln!(
                    "{} {}: Search pattern not found in {}",
                    "!".yellow(),
                    id,
                    path.display()
                );
                eprintln!("  The dependency may have changed upstream; the patch may need updating");
                if let Some(hint) = closest {
                    eprintln!(
                        "  Closest line {}: {}",
                        hint.line_number,
                        hint.line.trim().dimmed()
                    );
                }
                Status::Drifted
            }
            Ok(TransformOutcome::ResolutionFailed { reason }) => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), id, reason);
                Status::Skipped
            }
            Ok(TransformOutcome::SkippedVersion { reason }) => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), id, reason);
                Status::Skipped
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), id, e);
                Status::Failed
            }
        };

        match self.statuses.iter_mut().find(|(seen, _)| seen == id) {
            Some((_, current)) => *current = (*current).max(status),
            None => self.statuses.push((id.to_string(), status)),
        }
    }

    fn count(&self, status: Status) -> usize {
        self.statuses.iter().filter(|(_, s)| *s == status).count()
    }

    fn print(&self) {
        println!("{}", "Summary:".bold());
        println!("  {} applied", self.count(Status::Applied).to_string().green());
        println!(
            "  {} already applied",
            self.count(Status::AlreadyApplied).to_string().yellow()
        );
        println!("  {} not present", self.count(Status::Missing).to_string().cyan());
        println!("  {} pattern drift", self.count(Status::Drifted).to_string().yellow());
        println!("  {} skipped", self.count(Status::Skipped).to_string().cyan());
        println!("  {} failed", self.count(Status::Failed).to_string().red());
    }
}

/// Print a diff for a patch that was just applied, if its original was captured.
fn diff_if_patched(contents_before: &HashMap<PathBuf, String>, outcome: &TransformOutcome) {
    let TransformOutcome::Applied { path } = outcome else {
        return;
    };
    let Some(before) = contents_before.get(path) else {
        return;
    };
    if let Ok(after) = fs::read_to_string(path) {
        if before != &after {
            display_diff(path, before, &after);
        }
    }
}

fn cmd_apply(
    ctx: BuildContext,
    manifest: Option<PathBuf>,
    event: EventArg,
    eager: bool,
    strict: bool,
    show_diff: bool,
) -> Result<()> {
    let (source, manifest) = load_manifest(manifest)?;

    println!("Manifest: {}", source);
    print_context(&ctx);
    println!();

    // Capture patch targets before applying (for diff output)
    let mut contents_before: HashMap<PathBuf, String> = HashMap::new();
    if show_diff {
        for transform in &manifest.transforms {
            let transformation = transform.transformation();
            if !matches!(transformation, Transformation::PatchFile { .. }) {
                continue;
            }
            if let Ok(path) = resolve(&ctx, transformation.relative_path()) {
                if let Ok(content) = fs::read_to_string(&path) {
                    contents_before.insert(path, content);
                }
            }
        }
    }

    let bindings = manifest.bindings().into_iter().map(|mut binding| {
        binding.eager &= eager;
        binding
    });

    let mut pipeline = Pipeline::new().strict(strict);
    let eager_results = install(&mut pipeline, &ctx, bindings);

    let mut tally = Tally::default();

    if !eager_results.is_empty() {
        println!("{}", "Eager:".bold());
        for (id, outcome) in &eager_results {
            match outcome {
                Some(outcome) => {
                    tally.record(id, &Ok(outcome.clone()));
                    if show_diff {
                        diff_if_patched(&contents_before, outcome);
                    }
                }
                None => println!("{} {}: Deferred to build hook", "⊘".cyan(), id),
            }
        }
        println!();
    }

    for event in event.events() {
        let reports: Vec<HookReport> = pipeline.fire(event, &ctx)?;
        if reports.is_empty() {
            continue;
        }

        println!("{}", format!("{event}:").bold());
        for report in &reports {
            tally.record(&report.label, &report.result);
            if let (true, Ok(outcome)) = (show_diff, &report.result) {
                diff_if_patched(&contents_before, outcome);
            }
        }
        println!();
    }

    tally.print();

    Ok(())
}

fn cmd_status(ctx: BuildContext, manifest: Option<PathBuf>) -> Result<()> {
    let (source, manifest) = load_manifest(manifest)?;

    println!("{}", "Transformation Status Report".bold());
    println!("Manifest: {}", source);
    print_context(&ctx);
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut not_present = Vec::new();
    let mut problems = Vec::new();

    for binding in manifest.bindings() {
        let id = binding.job.id.clone();
        match binding.job.inspect(&ctx) {
            Ok(TransformOutcome::AlreadyApplied { .. }) => applied.push(id),
            Ok(TransformOutcome::Applied { path }) => {
                pending.push((id, format!("would apply to {}", path.display())));
            }
            Ok(TransformOutcome::TargetMissing { path }) => {
                not_present.push((id, path.display().to_string()));
            }
            Ok(TransformOutcome::PatternNotFound { path, .. }) => {
                problems.push((id, format!("search pattern not found in {}", path.display())));
            }
            Ok(other) => not_present.push((id, other.to_string())),
            Err(e) => problems.push((id, e.to_string())),
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} transformations)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    for (symbol, label, entries) in [
        ("⊙".yellow(), "PENDING".yellow().bold(), &pending),
        ("⊘".cyan(), "NOT PRESENT".cyan().bold(), &not_present),
        ("✗".red(), "NEEDS ATTENTION".red().bold(), &problems),
    ] {
        if entries.is_empty() {
            continue;
        }
        println!("{} {} ({} transformations)", symbol, label, entries.len());
        for (id, reason) in entries {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_list(manifest: Option<PathBuf>) -> Result<()> {
    let (source, manifest) = load_manifest(manifest)?;

    println!("Manifest: {}", source);
    if let Some(description) = &manifest.meta.description {
        println!("{}", description.dimmed());
    }
    println!();

    for transform in &manifest.transforms {
        let eager = if transform.eager { ", eager" } else { "" };
        println!(
            "{} ({}, {}{})",
            transform.id.bold(),
            transform.action.transformation().kind(),
            transform.event,
            eager
        );
        println!("  Path: {}", transform.action.path());
        if let Some(range) = &transform.version_range {
            println!("  Versions: {}", range);
        }
        if let Some(description) = &transform.description {
            println!("  {}", description.dimmed());
        }
    }

    Ok(())
}
