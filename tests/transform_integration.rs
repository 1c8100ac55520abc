//! Integration tests for the transformation executor
//!
//! Exercises prune and patch against real temp directories laid out like a
//! dependency cache: `<cache_root>/<target_id>/<dependency>/...`

use libdeps_patcher::transform::{self, TransformError, TransformOutcome, Transformation};
use libdeps_patcher::{BuildContext, ResolutionError};
use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const LINE: &str = "lv_coord_t height = LV_MIN(max_row, area_h - row);";
const INSERT: &str = "\n            height &= ~0x1UL;";
const MARKER: &str = "height &= ~0x1UL;";

fn rotation_fix(relative: &str) -> Transformation {
    Transformation::patch(relative, LINE, INSERT, MARKER)
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Snapshot every file under `root` with its content.
fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut entries: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
        .collect();
    entries.sort();
    entries
}

#[test]
fn test_scenario_a_prune_existing_subtree() {
    let deps = TempDir::new().unwrap();
    let helium = deps.path().join("boardA/lib/helium");
    for name in ["lv_blend_helium.S", "lv_blend_helium.h", "helium_neon.S"] {
        write(&helium.join(name), "; arm only\n");
    }
    write(&deps.path().join("boardA/lib/keep.c"), "int keep;\n");

    let ctx = BuildContext::new(deps.path(), "boardA");
    let outcome = transform::execute(&ctx, &Transformation::prune("lib/helium")).unwrap();

    assert_eq!(outcome, TransformOutcome::Applied { path: helium.clone() });
    assert!(!helium.exists());
    assert!(deps.path().join("boardA/lib/keep.c").exists());
}

#[test]
fn test_scenario_b_prune_absent_subtree() {
    let deps = TempDir::new().unwrap();
    write(&deps.path().join("boardA/lib/keep.c"), "int keep;\n");
    let before = snapshot(deps.path());

    let ctx = BuildContext::new(deps.path(), "boardA");
    let outcome = transform::execute(&ctx, &Transformation::prune("lib/helium")).unwrap();

    assert_eq!(
        outcome,
        TransformOutcome::TargetMissing {
            path: deps.path().join("boardA/lib/helium")
        }
    );
    assert_eq!(snapshot(deps.path()), before);
}

#[test]
fn test_prune_twice_is_memoryless() {
    let deps = TempDir::new().unwrap();
    write(&deps.path().join("env/lib/helium/a.S"), "");
    let ctx = BuildContext::new(deps.path(), "env");
    let prune = Transformation::prune("lib/helium");

    let first = transform::execute(&ctx, &prune).unwrap();
    let second = transform::execute(&ctx, &prune).unwrap();
    assert!(matches!(first, TransformOutcome::Applied { .. }));
    assert!(matches!(second, TransformOutcome::TargetMissing { .. }));

    // A partial re-fetch restores the subtree; prune runs again
    write(&deps.path().join("env/lib/helium/b.S"), "");
    let third = transform::execute(&ctx, &prune).unwrap();
    assert!(matches!(third, TransformOutcome::Applied { .. }));
}

#[test]
fn test_scenario_c_patch_then_already_applied() {
    let deps = TempDir::new().unwrap();
    let file = deps.path().join("env/lvgl/src/core/lv_refr.c");
    write(&file, &format!("{LINE}\n"));

    let ctx = BuildContext::new(deps.path(), "env");
    let fix = rotation_fix("lvgl/src/core/lv_refr.c");

    let first = transform::execute(&ctx, &fix).unwrap();
    assert_eq!(first, TransformOutcome::Applied { path: file.clone() });
    let patched = fs::read_to_string(&file).unwrap();
    assert_eq!(patched, format!("{LINE}\n            height &= ~0x1UL;\n"));

    let second = transform::execute(&ctx, &fix).unwrap();
    assert_eq!(second, TransformOutcome::AlreadyApplied { path: file.clone() });
    assert_eq!(fs::read_to_string(&file).unwrap(), patched);
}

#[test]
fn test_exact_insertion_preserves_surroundings() {
    let deps = TempDir::new().unwrap();
    let file = deps.path().join("env/lvgl/src/core/lv_refr.c");
    let before = "static void refr_area(const lv_area_t * area_p)\r\n{\r\n\t\t";
    let after = "\r\n\t\tif(height < 1) return;   \r\n}\r\n";
    write(&file, &format!("{before}{LINE}{after}"));

    let ctx = BuildContext::new(deps.path(), "env");
    let outcome = transform::execute(&ctx, &rotation_fix("lvgl/src/core/lv_refr.c")).unwrap();

    assert!(matches!(outcome, TransformOutcome::Applied { .. }));
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        format!("{before}{LINE}{INSERT}{after}")
    );
}

#[test]
fn test_multiple_occurrences_all_patched() {
    let deps = TempDir::new().unwrap();
    let file = deps.path().join("env/lvgl/lv_refr.c");
    write(&file, &format!("{LINE}\n{LINE}\n"));

    let ctx = BuildContext::new(deps.path(), "env");
    let fix = rotation_fix("lvgl/lv_refr.c");

    let first = transform::execute(&ctx, &fix).unwrap();
    assert!(matches!(first, TransformOutcome::Applied { .. }));
    let patched = fs::read_to_string(&file).unwrap();
    assert_eq!(patched, format!("{LINE}{INSERT}\n{LINE}{INSERT}\n"));
    assert_eq!(patched.matches(MARKER).count(), 2);

    let second = transform::execute(&ctx, &fix).unwrap();
    assert!(matches!(second, TransformOutcome::AlreadyApplied { .. }));
    assert_eq!(fs::read_to_string(&file).unwrap(), patched);
}

#[test]
fn test_empty_insertion_is_an_error_not_already_applied() {
    let deps = TempDir::new().unwrap();
    let file = deps.path().join("env/lvgl/a.c");
    write(&file, "x;\n");

    let ctx = BuildContext::new(deps.path(), "env");
    let result = transform::execute(&ctx, &Transformation::patch("lvgl/a.c", "x;", "", "MARK"));

    assert!(matches!(result, Err(TransformError::InvalidPatch { .. })));
    assert_eq!(fs::read_to_string(&file).unwrap(), "x;\n");
}

#[test]
fn test_pattern_drift_leaves_file_untouched() {
    let deps = TempDir::new().unwrap();
    let file = deps.path().join("env/lvgl/src/core/lv_refr.c");
    let drifted = "int32_t height = LV_MIN(max_row, area_h - row);\n";
    write(&file, drifted);

    let ctx = BuildContext::new(deps.path(), "env");
    let outcome = transform::execute(&ctx, &rotation_fix("lvgl/src/core/lv_refr.c")).unwrap();

    let TransformOutcome::PatternNotFound { path, closest } = outcome else {
        panic!("expected PatternNotFound, got {outcome:?}");
    };
    assert_eq!(path, file);
    let hint = closest.expect("drifted line should be suggested");
    assert_eq!(hint.line_number, 1);
    assert_eq!(fs::read_to_string(&file).unwrap(), drifted);
}

#[test]
fn test_patch_missing_file() {
    let deps = TempDir::new().unwrap();
    let ctx = BuildContext::new(deps.path(), "env");
    let outcome = transform::execute(&ctx, &rotation_fix("lvgl/src/core/lv_refr.c")).unwrap();
    assert!(matches!(outcome, TransformOutcome::TargetMissing { .. }));
    assert!(!deps.path().join("env").exists());
}

#[test]
fn test_resolution_gating_without_filesystem_access() {
    let deps = TempDir::new().unwrap();
    write(&deps.path().join("lib/helium/a.S"), "");

    for ctx in [
        BuildContext::from_parts(None, Some("env".to_string())),
        BuildContext::from_parts(Some(deps.path().to_path_buf()), None),
        BuildContext::from_parts(Some(deps.path().to_path_buf()), Some(String::new())),
    ] {
        let outcome = transform::execute(&ctx, &Transformation::prune("lib/helium")).unwrap();
        let TransformOutcome::ResolutionFailed { reason } = outcome else {
            panic!("expected ResolutionFailed, got {outcome:?}");
        };
        assert!(reason.is_expected());
    }

    assert!(deps.path().join("lib/helium/a.S").exists());
}

#[test]
fn test_escaping_path_is_a_resolution_failure() {
    let deps = TempDir::new().unwrap();
    let victim = deps.path().join("victim");
    write(&victim.join("a.c"), "");

    let ctx = BuildContext::new(deps.path().join("cache"), "env");
    let outcome =
        transform::execute(&ctx, &Transformation::prune("../../victim")).unwrap();

    assert!(matches!(
        outcome,
        TransformOutcome::ResolutionFailed {
            reason: ResolutionError::EscapesTree(_)
        }
    ));
    assert!(victim.exists());
}

#[test]
fn test_inspect_does_not_mutate() {
    let deps = TempDir::new().unwrap();
    write(&deps.path().join("env/lvgl/helium/a.S"), "");
    write(&deps.path().join("env/lvgl/lv_refr.c"), &format!("{LINE}\n"));
    let before = snapshot(deps.path());

    let ctx = BuildContext::new(deps.path(), "env");
    let prune = transform::inspect(&ctx, &Transformation::prune("lvgl/helium")).unwrap();
    let patch = transform::inspect(&ctx, &rotation_fix("lvgl/lv_refr.c")).unwrap();

    assert!(matches!(prune, TransformOutcome::Applied { .. }));
    assert!(matches!(patch, TransformOutcome::Applied { .. }));
    assert_eq!(snapshot(deps.path()), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_patch_is_idempotent_and_exact(
        prefix in "[a-z \n;{}]{0,40}",
        suffix in "[a-z \n;{}]{0,40}",
    ) {
        let deps = TempDir::new().unwrap();
        let file = deps.path().join("env/lvgl/lv_refr.c");
        let original = format!("{prefix}{LINE}{suffix}");
        write(&file, &original);

        let ctx = BuildContext::new(deps.path(), "env");
        let fix = rotation_fix("lvgl/lv_refr.c");

        let first = transform::execute(&ctx, &fix).unwrap();
        prop_assert!(
            matches!(first, TransformOutcome::Applied { .. }),
            "first application should apply, got {:?}",
            first
        );
        let once = fs::read_to_string(&file).unwrap();
        prop_assert_eq!(&once, &format!("{prefix}{LINE}{INSERT}{suffix}"));

        let second = transform::execute(&ctx, &fix).unwrap();
        prop_assert!(
            matches!(second, TransformOutcome::AlreadyApplied { .. }),
            "second application should be a no-op, got {:?}",
            second
        );
        prop_assert_eq!(fs::read_to_string(&file).unwrap(), once);
    }
}
