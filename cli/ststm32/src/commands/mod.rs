//! CLI command implementations.

pub mod boards;
pub mod init;
pub mod ldscript;
pub mod resolve;
pub mod scrape;
pub mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ststm32_board::BoardCatalog;
use ststm32_resolve::PackageDirs;

use crate::manifest::ProjectManifest;

/// A loaded project: its manifest and the directory holding it.
#[derive(Debug, Clone)]
pub struct Project {
    pub manifest: ProjectManifest,
    pub dir: PathBuf,
}

impl Project {
    pub fn packages(&self) -> PackageDirs {
        self.manifest.packages.package_dirs(&self.dir)
    }

    pub fn boards_dir(&self) -> PathBuf {
        self.dir.join(&self.manifest.packages.boards)
    }
}

/// Built-in boards, shadowed by the project's board manifests if there is a
/// project.
pub fn catalog(project: Option<&Project>) -> Result<BoardCatalog> {
    match project {
        Some(p) => {
            let dir = p.boards_dir();
            BoardCatalog::with_dir(&dir).with_context(|| format!("loading boards from {}", dir.display()))
        }
        None => Ok(BoardCatalog::builtin()),
    }
}
