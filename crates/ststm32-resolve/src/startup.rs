//! CMSIS device startup file discovery.

use std::path::{Path, PathBuf};

use ststm32_board::McuPart;

use crate::error::{ResolveError, Result};

/// Parts whose startup file does not follow the naming pattern.
///
/// Keyed by the 11-character canonical part number.
pub const STARTUP_FILE_EXCEPTIONS: &[(&str, &str)] = &[
    ("stm32f030f4", "startup_stm32f030x6.s"),
    ("stm32f103c8", "startup_stm32f103xb.s"),
    ("stm32f103r8", "startup_stm32f103xb.s"),
    ("stm32f103rc", "startup_stm32f103xb.s"),
    ("stm32f103t8", "startup_stm32f103xb.s"),
    ("stm32f103vc", "startup_stm32f103xe.s"),
    ("stm32f103vd", "startup_stm32f103xe.s"),
    ("stm32f103ve", "startup_stm32f103xe.s"),
    ("stm32f103zc", "startup_stm32f103xe.s"),
    ("stm32f103zd", "startup_stm32f103xe.s"),
    ("stm32f303cb", "startup_stm32f303xc.s"),
    ("stm32f407ve", "startup_stm32f407xx.s"),
];

/// `Drivers/CMSIS/Device/ST/<PORT>/Source/Templates/gcc` under a Cube series root.
pub fn startup_search_dir(series_root: &Path, mcu: &McuPart) -> PathBuf {
    series_root
        .join("Drivers")
        .join("CMSIS")
        .join("Device")
        .join("ST")
        .join(mcu.series_port())
        .join("Source")
        .join("Templates")
        .join("gcc")
}

/// Find the startup file name for `mcu`.
///
/// An explicit override wins, then the exception table, then the first file
/// in `search_dir` matching `startup_<line>[<pin>x][<size>x].[sS]`.
pub fn find_startup_file(mcu: &McuPart, override_name: Option<&str>, search_dir: &Path) -> Result<String> {
    if let Some(name) = override_name {
        return Ok(name.to_string());
    }

    if let Some((_, file)) = STARTUP_FILE_EXCEPTIONS
        .iter()
        .find(|(part, _)| *part == mcu.canonical())
    {
        return Ok(file.to_string());
    }

    let pattern = format!(
        "{}/startup_{}[{}x][{}x].[sS]",
        glob::Pattern::escape(&search_dir.to_string_lossy()),
        mcu.line(),
        mcu.pin_code(),
        mcu.flash_code()
    );
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|e| e.ok()).collect();
    matches.sort();
    log::debug!("{} startup candidate(s) for {pattern}", matches.len());

    matches
        .first()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ResolveError::MissingStartupFile {
            mcu: mcu.canonical().to_string(),
            dir: search_dir.to_path_buf(),
        })
}
