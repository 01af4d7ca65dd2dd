//! ST Standard Peripheral Library.

use ststm32_board::Framework;

use super::{board_variant, mbed_ldscript_fallback, FrameworkContext, FrameworkSetup, LibrarySpec};
use crate::error::Result;
use crate::library::SourceFilter;

/// SPL sources that do not build for the part named by the board defines.
fn source_filter(ctx: &FrameworkContext<'_>) -> String {
    let board = ctx.board;
    let mut rules = vec!["+<*>"];
    if board.extra_flags_mention("STM32F40_41xxx") {
        rules.push("-<stm32f4xx_fmc.c>");
    }
    if board.extra_flags_mention("STM32F427_437xx") {
        rules.push("-<stm32f4xx_fsmc.c>");
    } else if board.extra_flags_mention("STM32F303xC") {
        rules.push("-<stm32f30x_hrtim.c>");
    } else if board.extra_flags_mention("STM32L1XX_MD") {
        rules.push("-<stm32l1xx_flash_ramfunc.c>");
    }
    rules.join(" ")
}

pub fn configure(ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    let fw = ctx.packages.framework_dir(Framework::Spl)?;
    let core = ctx.board.build.core.as_deref().unwrap_or("stm32");
    let variant = board_variant(ctx);
    let series = variant.get(..7).unwrap_or(&variant).to_string();
    let core_root = fw.join(core);
    let spl_dir = core_root.join("spl").join("variants").join(&series);
    let cmsis_dir = core_root.join("cmsis").join("variants").join(&series);

    let mut setup = FrameworkSetup::default();
    let add = &mut setup.layer.add;
    add.cpppath.extend([
        core_root.join("cmsis").join("cores").join(core),
        cmsis_dir.clone(),
        spl_dir.join("inc"),
        spl_dir.join("src"),
    ]);
    add.define_flag("USE_STDPERIPH_DRIVER");

    if let Some(flag) = mbed_ldscript_fallback(ctx, |mbed, board| {
        mbed.join("targets")
            .join("TARGET_STM")
            .join(format!("TARGET_{series}"))
            .join(format!("TARGET_{board}"))
            .join("device")
            .join("TOOLCHAIN_GCC_ARM")
    }) {
        add.linkflags.push(flag);
    }

    let filter = SourceFilter::parse(&source_filter(ctx))?;
    setup.libraries = vec![
        LibrarySpec::new("FrameworkCMSISVariant", cmsis_dir),
        LibrarySpec::new("FrameworkSPL", spl_dir.join("src")).with_filter(filter),
    ];
    Ok(setup)
}
