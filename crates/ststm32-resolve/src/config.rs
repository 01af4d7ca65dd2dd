//! The resolved build configuration.

use std::path::Path;

use ststm32_board::{CoreTier, Fpu, Framework, McuPart};
use ststm32_ldscript::LinkerOutcome;

use crate::flags::BuildFlags;
use crate::library::LibrarySet;

/// Upload settings derived while resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDefaults {
    /// Protocol selected by the project or the board.
    pub protocol: Option<String>,
    /// Flash address the image is written to.
    pub offset: u64,
}

/// Everything downstream build steps need, computed once per invocation.
#[derive(Debug, Clone)]
pub struct ResolvedBuildConfig {
    pub board_id: String,
    pub framework: Framework,
    pub mcu: McuPart,
    /// `STM32F1` style series symbol.
    pub series_symbol: String,
    pub core_tier: CoreTier,
    pub fpu: Option<Fpu>,
    /// Framework variant the board was mapped to, if the framework has one.
    pub variant: Option<String>,
    pub flags: BuildFlags,
    pub linker_script: LinkerOutcome,
    pub startup_file: Option<String>,
    pub libraries: LibrarySet,
    pub upload: UploadDefaults,
    /// Non-fatal findings, in the order they were raised.
    pub warnings: Vec<String>,
}

impl ResolvedBuildConfig {
    /// The linker script path. Always set on a successfully resolved config.
    pub fn linker_script_path(&self) -> Option<&Path> {
        self.linker_script.path()
    }

    pub fn has_fpu(&self) -> bool {
        self.fpu.is_some()
    }
}
