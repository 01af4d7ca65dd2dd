//! `ststm32.toml` project manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ststm32_board::Framework;
use ststm32_resolve::{PackageDirs, UserOptions};

/// File name of the project manifest.
pub const MANIFEST_FILE: &str = "ststm32.toml";

/// The top-level manifest of an STM32 project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub project: ProjectConfig,
    /// Package and output locations.
    #[serde(default)]
    pub packages: PackagesConfig,
}

/// `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    pub name: String,
    /// Board id (e.g., "bluepill_f103c8").
    pub board: String,
    pub framework: Framework,
    /// Extra compiler flags, applied after the board's.
    #[serde(default)]
    pub build_flags: Vec<String>,
    #[serde(default)]
    pub upload_protocol: Option<String>,
    /// Serial port, GDB remote or mount point for the upload.
    #[serde(default)]
    pub upload_port: Option<String>,
    /// Command for the `custom` upload protocol.
    #[serde(default)]
    pub upload_command: Option<String>,
}

/// `[packages]` section. Relative paths are taken from the project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackagesConfig {
    /// Framework package roots keyed by framework name.
    #[serde(default)]
    pub frameworks: BTreeMap<String, PathBuf>,
    /// Precompiled linker scripts (and `tpl/linker.tpl`).
    #[serde(default = "default_ldscripts")]
    pub ldscripts: PathBuf,
    /// Board manifests shadowing the built-in boards.
    #[serde(default = "default_boards")]
    pub boards: PathBuf,
    #[serde(default = "default_cache")]
    pub cache: PathBuf,
    #[serde(default = "default_build")]
    pub build: PathBuf,
    /// OpenOCD scripts directory for OpenOCD uploads.
    #[serde(default)]
    pub openocd_scripts: Option<PathBuf>,
}

fn default_ldscripts() -> PathBuf {
    PathBuf::from("ldscripts")
}

fn default_boards() -> PathBuf {
    PathBuf::from("boards")
}

fn default_cache() -> PathBuf {
    PathBuf::from(".ststm32/cache")
}

fn default_build() -> PathBuf {
    PathBuf::from(".ststm32/build")
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            frameworks: BTreeMap::new(),
            ldscripts: default_ldscripts(),
            boards: default_boards(),
            cache: default_cache(),
            build: default_build(),
            openocd_scripts: None,
        }
    }
}

impl PackagesConfig {
    /// Package directories with every path anchored at `project_dir`.
    pub fn package_dirs(&self, project_dir: &Path) -> PackageDirs {
        PackageDirs {
            frameworks: self
                .frameworks
                .iter()
                .map(|(name, path)| (name.clone(), project_dir.join(path)))
                .collect(),
            ldscripts: project_dir.join(&self.ldscripts),
            cache: project_dir.join(&self.cache),
            build: project_dir.join(&self.build),
            project_src: project_dir.join("src"),
        }
    }
}

impl ProjectManifest {
    /// Search upward from `start_dir` for a `ststm32.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: ProjectManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing ststm32.toml")
    }

    pub fn user_options(&self) -> UserOptions {
        UserOptions {
            build_flags: self.project.build_flags.clone(),
            upload_protocol: self.project.upload_protocol.clone(),
        }
    }

    /// Manifest written by `ststm32 init`.
    pub fn template(name: &str, board: &str, framework: Framework) -> String {
        format!(
            r#"[project]
name = "{name}"
board = "{board}"
framework = "{framework}"
build-flags = []

[packages]
ldscripts = "ldscripts"
cache = ".ststm32/cache"
build = ".ststm32/build"

[packages.frameworks]
"#
        )
    }
}
