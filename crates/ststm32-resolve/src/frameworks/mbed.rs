//! Arm Mbed OS, prebuilt per board.

use std::path::{Path, PathBuf};

use ststm32_board::Framework;
use ststm32_ldscript::LinkerError;

use super::{FrameworkContext, FrameworkSetup, LibrarySpec, LinkerSource};
use crate::error::Result;

/// First `*.ld` file in `dir`, by name.
fn first_ldscript(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let pattern = format!("{}/*.ld", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut scripts: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|e| e.ok()).collect();
    scripts.sort();
    Ok(scripts.into_iter().next())
}

pub fn configure(ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    let fw = ctx.packages.framework_dir(Framework::Mbed)?;
    let board = ctx.board.id.to_uppercase();
    let mbed_dir = fw.join("variant").join(&board).join("mbed");
    let target_dir = mbed_dir.join(format!("TARGET_{board}"));

    let mut setup = FrameworkSetup::default();
    let add = &mut setup.layer.add;
    add.cpppath.extend([mbed_dir.clone(), target_dir.clone()]);
    add.define_flag("TOOLCHAIN_GCC_ARM")
        .define_flag("TOOLCHAIN_GCC")
        .define_flag(format!("TARGET_{board}"));

    let toolchain_dir = target_dir.join("TOOLCHAIN_GCC_ARM");
    let script = first_ldscript(&toolchain_dir)?.ok_or_else(|| LinkerError::NotFound {
        mcu: ctx.mcu.canonical().to_string(),
        reason: format!("mbed ships no linker script in {}", toolchain_dir.display()),
    })?;
    setup.linker = LinkerSource::Direct(script);
    setup.libraries.push(LibrarySpec::new("FrameworkMbed", mbed_dir));
    setup.variant = Some(board);
    Ok(setup)
}
