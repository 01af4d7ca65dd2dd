//! Per-framework configuration.
//!
//! Each framework contributes a flag layer, the libraries to build and where
//! its linker script comes from. Frameworks read the board and the flags the
//! board and user asked for; they never see or modify each other's output.

pub mod arduino;
pub mod chibios;
pub mod cmsis;
pub mod mbed;
pub mod spl;
pub mod stm32cube;
pub mod zephyr;

use std::path::{Path, PathBuf};

use ststm32_board::{BoardDescriptor, FamilyTraits, Framework, McuPart};

use crate::error::Result;
use crate::flags::{BuildFlags, FlagLayer};
use crate::library::SourceFilter;
use crate::packages::PackageDirs;

/// Inputs shared by every framework configuration.
#[derive(Debug, Clone, Copy)]
pub struct FrameworkContext<'a> {
    pub board: &'a BoardDescriptor,
    pub mcu: &'a McuPart,
    pub traits: &'static FamilyTraits,
    pub packages: &'a PackageDirs,
    /// Board extra flags merged with the user's build flags.
    pub requested: &'a BuildFlags,
    /// Upload protocol chosen by the project or the board.
    pub upload_protocol: Option<&'a str>,
}

impl FrameworkContext<'_> {
    /// Whether the board or the user defined `name`.
    pub fn requested_define(&self, name: &str) -> bool {
        self.requested.has_define(name)
    }
}

/// Where a framework's linker script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkerSource {
    /// The provider chain, searching `script_dir` (the platform directory
    /// when `None`).
    Chain { script_dir: Option<PathBuf> },
    /// A script shipped with the framework.
    Direct(PathBuf),
}

/// A library a framework wants built.
#[derive(Debug, Clone)]
pub struct LibrarySpec {
    pub name: String,
    pub root: PathBuf,
    pub filter: SourceFilter,
}

impl LibrarySpec {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            filter: SourceFilter::all(),
        }
    }

    pub fn with_filter(mut self, filter: SourceFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Output of one framework configuration.
#[derive(Debug, Clone)]
pub struct FrameworkSetup {
    pub layer: FlagLayer,
    pub libraries: Vec<LibrarySpec>,
    pub linker: LinkerSource,
    pub startup_file: Option<String>,
    pub variant: Option<String>,
    /// Flash offset when the framework relocates the image (bootloaders).
    pub upload_offset: Option<u64>,
    pub warnings: Vec<String>,
}

impl Default for FrameworkSetup {
    fn default() -> Self {
        Self {
            layer: FlagLayer::new(),
            libraries: Vec::new(),
            linker: LinkerSource::Chain { script_dir: None },
            startup_file: None,
            variant: None,
            upload_offset: None,
            warnings: Vec::new(),
        }
    }
}

impl FrameworkSetup {
    pub(crate) fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(message);
    }
}

/// Configure `framework` for the board in `ctx`.
pub fn configure(framework: Framework, ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    match framework {
        Framework::Arduino => arduino::configure(ctx),
        Framework::Mbed => mbed::configure(ctx),
        Framework::Cmsis => cmsis::configure(ctx),
        Framework::Spl => spl::configure(ctx),
        Framework::Stm32cube => stm32cube::configure(ctx),
        Framework::Chibios => chibios::configure(ctx),
        Framework::Zephyr => zephyr::configure(ctx),
        Framework::Bare => Ok(FrameworkSetup::default()),
    }
}

/// Board variant name, falling back to the canonical part number.
pub(crate) fn board_variant(ctx: &FrameworkContext<'_>) -> String {
    ctx.board
        .build
        .variant
        .clone()
        .unwrap_or_else(|| ctx.mcu.canonical().to_string())
}

/// `-Wl,-T` flag for a board script that only exists in the mbed package.
///
/// CMSIS and SPL boards may name a linker script that the platform does not
/// ship; when the board also supports mbed, the script is taken from there.
pub(crate) fn mbed_ldscript_fallback(
    ctx: &FrameworkContext<'_>,
    mbed_script_dir: impl FnOnce(&Path, &str) -> PathBuf,
) -> Option<String> {
    let ldscript = ctx.board.build.ldscript.as_ref()?;
    if ctx.packages.ldscripts.join(ldscript).is_file() || !ctx.board.supports(Framework::Mbed) {
        return None;
    }
    let mbed_root = ctx.packages.installed(Framework::Mbed)?;
    let stem = ldscript.file_stem()?.to_string_lossy().to_uppercase();
    let board = ctx.board.id.to_uppercase();
    let script = mbed_script_dir(mbed_root, &board).join(format!("{stem}.ld"));
    log::info!("using mbed linker script {}", script.display());
    Some(format!("-Wl,-T\"{}\"", script.display()))
}
