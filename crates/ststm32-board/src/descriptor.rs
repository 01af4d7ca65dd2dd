//! Typed board descriptor.
//!
//! One descriptor per buildable target. Descriptors are loaded once from a
//! manifest and never mutated while a build is being resolved.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::framework::Framework;
use crate::mcu::McuPart;

/// Start of the internal flash on every STM32 part.
pub const DEFAULT_FLASH_ORIGIN: u64 = 0x0800_0000;

/// Start of SRAM on every STM32 part.
pub const SRAM_ORIGIN: u64 = 0x2000_0000;

/// A buildable board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardDescriptor {
    /// Board id (e.g., "bluepill_f103c8").
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Board vendor.
    #[serde(default)]
    pub vendor: String,
    /// Product page.
    #[serde(default)]
    pub url: Option<String>,
    /// Frameworks known to work with this board.
    #[serde(default)]
    pub frameworks: Vec<Framework>,
    /// Build settings.
    pub build: BuildSection,
    /// Memory sizes and upload settings.
    pub upload: UploadSection,
    /// Debug probe hints.
    #[serde(default)]
    pub debug: DebugSection,
}

/// `[build]` section of a board manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    /// MCU part number (e.g., "stm32f103c8t6").
    pub mcu: String,
    /// CPU core tag passed to `-mcpu` (e.g., "cortex-m3").
    pub cpu: String,
    /// Core clock in Hz.
    pub f_cpu: u64,
    /// Arduino core selector ("maple", "stm32").
    #[serde(default)]
    pub core: Option<String>,
    /// Variant directory name inside the framework.
    #[serde(default)]
    pub variant: Option<String>,
    /// Explicit linker script. Takes priority over every other source.
    #[serde(default)]
    pub ldscript: Option<PathBuf>,
    /// Explicit startup file name.
    #[serde(default)]
    pub startup_file: Option<String>,
    /// Extra compiler flags, in order.
    #[serde(default)]
    pub extra_flags: Vec<String>,
    /// Vector table address for bootloader-less layouts.
    #[serde(default)]
    pub vec_tab_addr: Option<u64>,
    /// Board name as known to Zephyr, if it differs from the id.
    #[serde(default)]
    pub zephyr_board: Option<String>,
    /// Linker script shipped with the Arduino variant.
    #[serde(default)]
    pub arduino_ldscript: Option<String>,
}

/// `[upload]` section of a board manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UploadSection {
    /// FLASH size in bytes.
    pub maximum_size: u64,
    /// RAM size in bytes.
    pub maximum_ram_size: u64,
    /// Default upload protocol.
    #[serde(default)]
    pub protocol: Option<String>,
    /// All protocols the board can be flashed with.
    #[serde(default)]
    pub protocols: Vec<String>,
    /// Flash offset the image is written to.
    #[serde(default)]
    pub offset_address: Option<u64>,
    /// USB vendor/product id pairs of the bootloader (hex strings).
    #[serde(default)]
    pub hwids: Vec<[String; 2]>,
    /// Volume label of the mass-storage bootloader.
    #[serde(default)]
    pub disk_label: Option<String>,
    /// Serial bootloader baud rate.
    #[serde(default)]
    pub speed: Option<u32>,
}

/// `[debug]` section of a board manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DebugSection {
    /// J-Link device name (e.g., "STM32F103C8").
    #[serde(default)]
    pub jlink_device: Option<String>,
    /// OpenOCD board config name (`board/<name>.cfg`).
    #[serde(default)]
    pub openocd_board: Option<String>,
    /// OpenOCD target config name (`target/<name>.cfg`).
    #[serde(default)]
    pub openocd_target: Option<String>,
    /// Extra OpenOCD arguments appended after the target config.
    #[serde(default)]
    pub openocd_extra_args: Vec<String>,
    /// Tools used for debugging by default.
    #[serde(default)]
    pub default_tools: Vec<String>,
    /// Probes soldered onto the board.
    #[serde(default)]
    pub onboard_tools: Vec<String>,
}

impl BoardDescriptor {
    /// Parse the board's MCU part number.
    pub fn mcu_part(&self) -> Result<McuPart> {
        McuPart::parse(&self.build.mcu)
    }

    /// RAM size in bytes.
    pub fn ram_bytes(&self) -> u64 {
        self.upload.maximum_ram_size
    }

    /// FLASH size in bytes.
    pub fn flash_bytes(&self) -> u64 {
        self.upload.maximum_size
    }

    /// Flash address firmware is written to.
    pub fn upload_offset(&self) -> u64 {
        self.upload.offset_address.unwrap_or(DEFAULT_FLASH_ORIGIN)
    }

    /// Whether the board declares support for `framework`.
    ///
    /// `bare` is always supported.
    pub fn supports(&self, framework: Framework) -> bool {
        framework == Framework::Bare || self.frameworks.contains(&framework)
    }

    /// Whether `protocol` is one of the board's upload protocols.
    pub fn has_protocol(&self, protocol: &str) -> bool {
        self.upload.protocol.as_deref() == Some(protocol)
            || self.upload.protocols.iter().any(|p| p == protocol)
    }

    /// Whether any extra flag mentions `needle`.
    pub fn extra_flags_mention(&self, needle: &str) -> bool {
        self.build.extra_flags.iter().any(|f| f.contains(needle))
    }

    /// Arduino core name, "arduino" when unset.
    pub fn core_name(&self) -> &str {
        self.build.core.as_deref().unwrap_or("arduino")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    #[test]
    fn offset_defaults_to_flash_origin() {
        let mut board = builtin::bluepill_f103c8();
        assert_eq!(board.upload_offset(), 0x0800_0000);
        board.upload.offset_address = Some(0x0800_2000);
        assert_eq!(board.upload_offset(), 0x0800_2000);
    }

    #[test]
    fn bare_is_always_supported() {
        let mut board = builtin::bluepill_f103c8();
        board.frameworks.clear();
        assert!(board.supports(Framework::Bare));
        assert!(!board.supports(Framework::Arduino));
    }

    #[test]
    fn protocol_lookup_includes_default() {
        let board = builtin::maple_mini();
        assert!(board.has_protocol("dfu"));
        assert!(!board.has_protocol("jlink"));
    }

    #[test]
    fn extra_flags_substring() {
        let board = builtin::disco_f407vg();
        assert!(board.extra_flags_mention("STM32F40_41xxx"));
        assert!(!board.extra_flags_mention("STM32F303xC"));
    }
}
