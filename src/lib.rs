//! Libdeps Patcher: build-time fixes for vendored dependency source trees
//!
//! Build pipelines such as PlatformIO install third-party libraries into a
//! per-target cache (`<libdeps>/<env>/<library>`). Some of those libraries
//! need adjusting before they compile or behave correctly on a given board.
//! This crate applies two kinds of deterministic, idempotent transformation
//! to such a tree:
//!
//! - **prune**: recursively delete a subtree that must not be compiled
//! - **patch**: insert text right after an exact search pattern, guarded by
//!   an idempotence marker
//!
//! # Architecture
//!
//! - [`resolve`] turns a [`BuildContext`] and a relative path into a target
//!   path, without touching the filesystem
//! - [`transform`] decides what to do by re-reading the tree and reports a
//!   [`TransformOutcome`]
//! - [`hooks`] binds transformations to lifecycle events and runs eager
//!   best-effort attempts at configuration time
//!
//! No outcome aborts the surrounding build. I/O errors are returned as
//! [`TransformError`] and only escalate when a [`Pipeline`] is strict.
//!
//! # Example
//!
//! ```no_run
//! use libdeps_patcher::{transform, BuildContext, Transformation};
//!
//! let ctx = BuildContext::new(".pio/libdeps", "esp32-s3");
//! let fix = Transformation::patch(
//!     "lvgl/src/core/lv_refr.c",
//!     "lv_coord_t height = LV_MIN(max_row, area_h - row);",
//!     "\n            height &= ~0x1UL;",
//!     "height &= ~0x1UL;",
//! );
//!
//! match transform::execute(&ctx, &fix) {
//!     Ok(outcome) => println!("{outcome}"),
//!     Err(e) => eprintln!("patch failed: {e}"),
//! }
//! ```

pub mod config;
pub mod context;
pub mod edit;
pub mod hooks;
pub mod resolve;
pub mod transform;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, PatchManifest};
pub use context::BuildContext;
pub use edit::{Edit, EditError, EditResult, EditVerification};
pub use hooks::{
    bind, install, try_eager_apply, Binding, HookRegistry, Job, LifecycleEvent, Pipeline,
    PipelineError,
};
pub use resolve::{resolve, ResolutionError};
pub use transform::{TransformError, TransformOutcome, Transformation};
