//! Transformations shipped with the tool.
//!
//! - `remove-helium`: LVGL 9 ships ARM Helium (MVE) assembly blend routines
//!   that do not assemble for Xtensa/RISC-V ESP32 targets.
//! - `lvgl-rotation-even-height`: QSPI panels with software rotation need an
//!   even number of rows per flush; LVGL's partial refresh can produce odd
//!   heights.

use crate::config::loader::{parse, ConfigError, ManifestSource};
use crate::config::schema::PatchManifest;

pub const BUILTIN_MANIFEST: &str = r#"[meta]
name = "builtin"
description = "LVGL fixes for ESP32 display boards"

[[transforms]]
id = "remove-helium"
description = "Remove ARM Helium assembly files that are incompatible with ESP32"
event = "pre-artifact"

[transforms.action]
type = "prune-subtree"
path = "lvgl/src/draw/sw/blend/helium"

[[transforms]]
id = "lvgl-rotation-even-height"
description = "Keep flushed area height even so rotated QSPI displays render correctly"
event = "post-artifact"
eager = true

[transforms.action]
type = "patch-file"
path = "lvgl/src/core/lv_refr.c"
search = "lv_coord_t height = LV_MIN(max_row, area_h - row);"
insert = "\n            height &= ~0x1UL;"
marker = "height &= ~0x1UL;"
"#;

pub fn builtin_manifest() -> Result<PatchManifest, ConfigError> {
    parse(BUILTIN_MANIFEST, ManifestSource::Builtin)
}
