//! Zephyr RTOS.

use ststm32_board::Framework;

use super::{FrameworkContext, FrameworkSetup, LinkerSource};
use crate::error::Result;

pub fn configure(ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    let fw = ctx.packages.framework_dir(Framework::Zephyr)?;
    let board = ctx
        .board
        .build
        .zephyr_board
        .clone()
        .unwrap_or_else(|| ctx.board.id.clone());

    let mut setup = FrameworkSetup::default();
    setup
        .layer
        .add
        .define_flag("__ZEPHYR__")
        .define("BOARD", &board);
    setup.layer.add.cpppath.push(fw.join("include"));
    setup.linker = LinkerSource::Direct(
        fw.join("soc")
            .join("arm")
            .join("st_stm32")
            .join(ctx.mcu.family())
            .join("linker.ld"),
    );
    setup.variant = Some(board);
    Ok(setup)
}

#[cfg(test)]
mod tests {
    use ststm32_board::builtin;

    use super::*;
    use crate::frameworks::testutil::Fixture;
    use crate::packages::PackageDirs;

    #[test]
    fn board_name_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = builtin::disco_l475vg_iot01a();
        board.build.zephyr_board = Some("disco_l475_iot1".into());
        let packages = PackageDirs::default().with_framework(Framework::Zephyr, dir.path());
        let fx = Fixture::new(board, packages);
        let setup = configure(&fx.ctx()).unwrap();

        assert_eq!(setup.layer.add.define_value("BOARD"), Some("disco_l475_iot1"));
        assert_eq!(
            setup.linker,
            LinkerSource::Direct(dir.path().join("soc/arm/st_stm32/stm32l4/linker.ld"))
        );
    }
}
