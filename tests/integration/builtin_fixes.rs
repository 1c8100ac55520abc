//! Integration tests for the built-in LVGL fixes.
//!
//! Uses a mock PlatformIO libdeps tree for an ESP32-S3 board with an LVGL
//! 9.x checkout containing the Helium blend routines and the unpatched
//! partial refresh loop.

use libdeps_patcher::config::builtin::builtin_manifest;
use libdeps_patcher::{install, BuildContext, LifecycleEvent, Pipeline, TransformOutcome};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ENV: &str = "waveshare-oled-143";

const LV_REFR_C: &str = r#"static void refr_area(const lv_area_t * area_p, int32_t y_offset)
{
    lv_layer_t * layer = disp_refr->layer_head;
    int32_t max_row = get_max_row(disp_refr, area_w, area_h);
    int32_t row;
    int32_t row_last = 0;
    lv_area_t sub_area;
    for(row = area_p->y1; row + max_row - 1 <= y2; row += max_row) {
        if(disp_refr->render_mode == LV_DISPLAY_RENDER_MODE_PARTIAL) {
            lv_coord_t height = LV_MIN(max_row, area_h - row);
            sub_area.y2 = sub_area.y1 + height - 1;
        }
    }
}
"#;

fn setup_mock_libdeps() -> TempDir {
    let dir = TempDir::new().unwrap();
    let lvgl = dir.path().join(ENV).join("lvgl");

    fs::create_dir_all(lvgl.join("src/core")).unwrap();
    fs::create_dir_all(lvgl.join("src/draw/sw/blend/helium")).unwrap();
    fs::create_dir_all(lvgl.join("src/draw/sw/blend/neon")).unwrap();

    fs::write(lvgl.join("library.json"), r#"{"name": "lvgl", "version": "9.2.2"}"#).unwrap();
    fs::write(lvgl.join("src/core/lv_refr.c"), LV_REFR_C).unwrap();
    fs::write(
        lvgl.join("src/draw/sw/blend/helium/lv_blend_helium.S"),
        "    vldrb.u8 q0, [r0]\n",
    )
    .unwrap();
    fs::write(
        lvgl.join("src/draw/sw/blend/helium/lv_blend_helium.h"),
        "#define LV_DRAW_SW_COLOR_BLEND_TO_RGB565 lv_color_blend_to_rgb565_helium\n",
    )
    .unwrap();
    fs::write(
        lvgl.join("src/draw/sw/blend/neon/lv_blend_neon.h"),
        "/* neon */\n",
    )
    .unwrap();

    dir
}

fn lv_refr(root: &Path) -> String {
    fs::read_to_string(root.join(ENV).join("lvgl/src/core/lv_refr.c")).unwrap()
}

#[test]
fn test_builtin_fixes_full_build() {
    let libdeps = setup_mock_libdeps();
    let ctx = BuildContext::new(libdeps.path(), ENV);
    let manifest = builtin_manifest().unwrap();

    let mut pipeline = Pipeline::new();
    let eager = install(&mut pipeline, &ctx, manifest.bindings());

    // Only the rotation fix is eager, and the library is already installed
    assert_eq!(eager.len(), 1);
    assert_eq!(eager[0].0, "lvgl-rotation-even-height");
    assert!(matches!(eager[0].1, Some(TransformOutcome::Applied { .. })));
    assert!(lv_refr(libdeps.path()).contains(
        "lv_coord_t height = LV_MIN(max_row, area_h - row);\n            height &= ~0x1UL;\n"
    ));

    // Pre-link prunes Helium, leaves the sibling NEON directory
    let pre = pipeline
        .fire(LifecycleEvent::PreArtifact, &ctx)
        .unwrap();
    assert_eq!(pre.len(), 1);
    assert!(matches!(pre[0].result, Ok(TransformOutcome::Applied { .. })));
    let blend = libdeps.path().join(ENV).join("lvgl/src/draw/sw/blend");
    assert!(!blend.join("helium").exists());
    assert!(blend.join("neon/lv_blend_neon.h").exists());

    // Post-link sees the eager patch and does nothing
    let patched = lv_refr(libdeps.path());
    let post = pipeline
        .fire(LifecycleEvent::PostArtifact, &ctx)
        .unwrap();
    assert!(matches!(
        post[0].result,
        Ok(TransformOutcome::AlreadyApplied { .. })
    ));
    assert_eq!(lv_refr(libdeps.path()), patched);
}

#[test]
fn test_builtin_fixes_incremental_rebuild() {
    let libdeps = setup_mock_libdeps();
    let ctx = BuildContext::new(libdeps.path(), ENV);
    let manifest = builtin_manifest().unwrap();

    for _ in 0..3 {
        let mut pipeline = Pipeline::new();
        let _ = install(&mut pipeline, &ctx, manifest.bindings());
        for event in LifecycleEvent::ALL {
            for report in pipeline.fire(event, &ctx).unwrap() {
                assert!(report.result.is_ok());
            }
        }
    }

    assert_eq!(lv_refr(libdeps.path()).matches("height &= ~0x1UL;").count(), 1);
}

#[test]
fn test_builtin_fixes_before_install() {
    // Configuration runs before the library manager has fetched anything
    let libdeps = TempDir::new().unwrap();
    let ctx = BuildContext::new(libdeps.path(), ENV);
    let manifest = builtin_manifest().unwrap();

    let mut pipeline = Pipeline::new().strict(true);
    let eager = install(&mut pipeline, &ctx, manifest.bindings());
    assert!(matches!(
        eager[0].1,
        Some(TransformOutcome::TargetMissing { .. })
    ));

    for event in LifecycleEvent::ALL {
        let reports = pipeline.fire(event, &ctx).unwrap();
        assert!(matches!(
            reports[0].result,
            Ok(TransformOutcome::TargetMissing { .. })
        ));
    }
}

#[test]
fn test_builtin_fixes_without_context() {
    let manifest = builtin_manifest().unwrap();
    let ctx = BuildContext::default();

    let mut pipeline = Pipeline::new().strict(true);
    let eager = install(&mut pipeline, &ctx, manifest.bindings());
    assert!(matches!(
        eager[0].1,
        Some(TransformOutcome::ResolutionFailed { .. })
    ));

    let reports = pipeline.fire(LifecycleEvent::PreArtifact, &ctx).unwrap();
    assert!(matches!(
        reports[0].result,
        Ok(TransformOutcome::ResolutionFailed { .. })
    ));
}
