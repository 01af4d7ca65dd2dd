//! Bare CMSIS device support.

use ststm32_board::Framework;

use super::{board_variant, mbed_ldscript_fallback, FrameworkContext, FrameworkSetup, LibrarySpec};
use crate::error::Result;

pub fn configure(ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    let fw = ctx.packages.framework_dir(Framework::Cmsis)?;
    let core = ctx.board.build.core.as_deref().unwrap_or("stm32");
    let variant = board_variant(ctx);
    let series_dir = fw.join("variants").join(variant.get(..7).unwrap_or(&variant));

    let mut setup = FrameworkSetup::default();
    setup.layer.add.cpppath.extend([
        fw.join("cores").join(core),
        series_dir.join("common"),
        series_dir.join(&variant),
    ]);

    if let Some(flag) = mbed_ldscript_fallback(ctx, |mbed, board| {
        mbed.join("variant")
            .join(board)
            .join("mbed")
            .join(format!("TARGET_{board}"))
            .join("TOOLCHAIN_GCC_ARM")
    }) {
        setup.layer.add.linkflags.push(flag);
    }

    setup.libraries = vec![
        LibrarySpec::new("FrameworkCMSISVariant", series_dir.join(&variant)),
        LibrarySpec::new("FrameworkCMSISCommon", series_dir.join("common")),
    ];
    Ok(setup)
}
