//! `ststm32 ldscript`: linker script lookup outside a full resolve.

use std::path::Path;

use anyhow::{Context, Result};
use ststm32_ldscript::{LinkerRequest, LinkerScriptProvider, LinkerTemplate};

use super::{catalog, Project};

/// Find or synthesize the linker script of a board and print its path.
///
/// Without a project the scripts directory is `./ldscripts` and generated
/// scripts go to `./.ststm32/cache`.
pub fn run(project: Option<&Project>, cwd: &Path, board: Option<&str>) -> Result<()> {
    let board_id = match (board, project) {
        (Some(id), _) => id,
        (None, Some(p)) => p.manifest.project.board.as_str(),
        (None, None) => anyhow::bail!("no board given and no project to take it from"),
    };
    let catalog = catalog(project)?;
    let board = catalog.get(board_id)?;

    let (script_dir, cache_dir) = match project {
        Some(p) => {
            let dirs = p.packages();
            (dirs.ldscripts, dirs.cache)
        }
        None => (cwd.join("ldscripts"), cwd.join(".ststm32/cache")),
    };
    let request = LinkerRequest {
        mcu: board.mcu_part()?,
        cpu: board.build.cpu.clone(),
        ram_bytes: board.ram_bytes(),
        flash_bytes: board.flash_bytes(),
        override_path: board.build.ldscript.clone(),
    };
    let path = LinkerScriptProvider::new(script_dir, cache_dir)
        .get_linker_script(&request)
        .with_context(|| format!("board '{}'", board.id))?;
    println!("{}", path.display());
    Ok(())
}

/// Write the built-in linker template, for seeding `tpl/linker.tpl`.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, LinkerTemplate::builtin().text())
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote linker template {}", path.display());
    Ok(())
}
