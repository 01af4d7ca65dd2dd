//! `ststm32 init`: project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ststm32_board::{BoardCatalog, Framework};

use crate::manifest::{ProjectManifest, MANIFEST_FILE};

/// Create a new project at `path`.
pub fn run(path: &Path, board: &str, framework: Framework) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("project path has no directory name")?;
    create_project(path, &name, board, framework)
}

pub(crate) fn create_project(project_dir: &Path, name: &str, board: &str, framework: Framework) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }
    let catalog = BoardCatalog::builtin();
    let descriptor = catalog.get(board)?;
    if !descriptor.supports(framework) {
        bail!("board '{}' does not support framework '{framework}'", descriptor.id);
    }

    fs::create_dir_all(project_dir.join("src")).context("creating src/ directory")?;
    fs::write(
        project_dir.join(MANIFEST_FILE),
        ProjectManifest::template(name, &descriptor.id, framework),
    )
    .with_context(|| format!("writing {MANIFEST_FILE}"))?;
    fs::write(project_dir.join(".gitignore"), ".ststm32/\n").context("writing .gitignore")?;

    println!("Created project '{name}' for {} ({framework})", descriptor.name);
    println!("  {name}/{MANIFEST_FILE}");
    println!("  {name}/src/");
    println!("  {name}/.gitignore");

    Ok(())
}
