//! MCU part-number model and family classification.
//!
//! STM32 part numbers encode series, line, pin count, flash size, package
//! and temperature grade, e.g. `stm32f103c8t6`:
//!
//! ```text
//! stm32 f1 03 c 8 t6
//! |     |  |  | | +-- package / temperature grade (ignored for matching)
//! |     |  |  | +---- flash size code
//! |     |  |  +------ pin count code
//! |     |  +--------- line
//! |     +------------ series (core directory)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};

/// Length of the family prefix (`stm32f1`).
pub const FAMILY_LEN: usize = 7;
/// Length of the line prefix (`stm32f103`).
pub const LINE_LEN: usize = 9;
/// Length of the canonical part number (`stm32f103c8`).
pub const CANONICAL_LEN: usize = 11;

/// A parsed STM32 part number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct McuPart {
    part: String,
}

impl McuPart {
    /// Parse a part number. Case is normalized to lowercase.
    pub fn parse(mcu: &str) -> Result<Self> {
        let part = mcu.trim().to_ascii_lowercase();
        if !part.starts_with("stm32") {
            return Err(BoardError::InvalidMcu {
                mcu: mcu.to_string(),
                detail: "expected an 'stm32' prefix".into(),
            });
        }
        if part.len() < CANONICAL_LEN {
            return Err(BoardError::InvalidMcu {
                mcu: mcu.to_string(),
                detail: format!("expected at least {CANONICAL_LEN} characters"),
            });
        }
        if !part.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BoardError::InvalidMcu {
                mcu: mcu.to_string(),
                detail: "only ASCII letters and digits are allowed".into(),
            });
        }
        Ok(Self { part })
    }

    /// The full lowercase part number as given.
    pub fn as_str(&self) -> &str {
        &self.part
    }

    /// Part number without package and temperature grade (`stm32f103c8`).
    pub fn canonical(&self) -> &str {
        &self.part[..CANONICAL_LEN]
    }

    /// Family prefix (`stm32f1`).
    pub fn family(&self) -> &str {
        &self.part[..FAMILY_LEN]
    }

    /// Line prefix (`stm32f103`).
    pub fn line(&self) -> &str {
        &self.part[..LINE_LEN]
    }

    /// Series directory name used by vendor packages (`f1`).
    pub fn core_dir(&self) -> &str {
        &self.part[5..FAMILY_LEN]
    }

    /// Preprocessor series symbol (`STM32F1`).
    pub fn series_symbol(&self) -> String {
        self.family().to_ascii_uppercase()
    }

    /// Vendor series directory name (`STM32F1xx`).
    pub fn series_port(&self) -> String {
        format!("{}xx", self.series_symbol())
    }

    /// Pin-count code (`c` in `stm32f103c8`).
    pub fn pin_code(&self) -> char {
        self.part.as_bytes()[LINE_LEN] as char
    }

    /// Flash-size code (`8` in `stm32f103c8`).
    pub fn flash_code(&self) -> char {
        self.part.as_bytes()[LINE_LEN + 1] as char
    }

    /// Package and temperature suffix (`t6`), possibly empty.
    pub fn grade(&self) -> &str {
        &self.part[CANONICAL_LEN..]
    }
}

impl fmt::Display for McuPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.part)
    }
}

/// Instruction-set tier of the Cortex-M core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoreTier {
    /// Cortex-M0/M0+.
    ArmV6M,
    /// Cortex-M3.
    ArmV7M,
    /// Cortex-M4/M7 (DSP extension).
    ArmV7EM,
    /// Cortex-M33.
    ArmV8M,
}

impl CoreTier {
    /// GCC `-march` value.
    pub fn arch(&self) -> &'static str {
        match self {
            CoreTier::ArmV6M => "armv6-m",
            CoreTier::ArmV7M => "armv7-m",
            CoreTier::ArmV7EM => "armv7e-m",
            CoreTier::ArmV8M => "armv8-m.main",
        }
    }

    /// ChibiOS port directory suffix (`v6m` or `v7m`).
    pub fn chibios_port(&self) -> &'static str {
        match self {
            CoreTier::ArmV6M => "v6m",
            _ => "v7m",
        }
    }
}

/// Hardware floating-point unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fpu {
    Fpv4SpD16,
    Fpv5SpD16,
    /// Double-precision unit (Cortex-M7 on F76x/F77x/H7).
    Fpv5D16,
}

impl Fpu {
    /// GCC `-mfpu` value.
    pub fn name(&self) -> &'static str {
        match self {
            Fpu::Fpv4SpD16 => "fpv4-sp-d16",
            Fpu::Fpv5SpD16 => "fpv5-sp-d16",
            Fpu::Fpv5D16 => "fpv5-d16",
        }
    }

    pub fn double_precision(&self) -> bool {
        matches!(self, Fpu::Fpv5D16)
    }
}

/// Facts derived from an MCU family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FamilyTraits {
    /// Instruction-set tier.
    pub tier: CoreTier,
    /// Hardware FPU, if any.
    pub fpu: Option<Fpu>,
    /// CMSIS-DSP core tag (`cortexM4`).
    pub dsp_core: &'static str,
}

impl FamilyTraits {
    /// Compiler and linker flags selecting the hardware float ABI.
    ///
    /// Empty when the family has no FPU.
    pub fn float_flags(&self) -> Vec<String> {
        match self.fpu {
            Some(fpu) => vec![
                format!("-mfpu={}", fpu.name()),
                "-mfloat-abi=hard".to_string(),
            ],
            None => Vec::new(),
        }
    }

    /// Name of the prebuilt CMSIS-DSP math library to link.
    pub fn dsp_library(&self) -> String {
        let float = if self.fpu.is_some() { "f" } else { "" };
        format!("arm_{}l{}_math", self.dsp_core, float)
    }
}

const M0: FamilyTraits = FamilyTraits {
    tier: CoreTier::ArmV6M,
    fpu: None,
    dsp_core: "cortexM0",
};
const M3: FamilyTraits = FamilyTraits {
    tier: CoreTier::ArmV7M,
    fpu: None,
    dsp_core: "cortexM3",
};
const M4F: FamilyTraits = FamilyTraits {
    tier: CoreTier::ArmV7EM,
    fpu: Some(Fpu::Fpv4SpD16),
    dsp_core: "cortexM4",
};
const M7_SP: FamilyTraits = FamilyTraits {
    tier: CoreTier::ArmV7EM,
    fpu: Some(Fpu::Fpv5SpD16),
    dsp_core: "cortexM7",
};
const M7_DP: FamilyTraits = FamilyTraits {
    tier: CoreTier::ArmV7EM,
    fpu: Some(Fpu::Fpv5D16),
    dsp_core: "cortexM7",
};
const M33: FamilyTraits = FamilyTraits {
    tier: CoreTier::ArmV8M,
    fpu: Some(Fpu::Fpv5SpD16),
    dsp_core: "ARMv8MML",
};

/// Family classification, evaluated first-match-wins.
///
/// Patterns are substring tests against the part number, so a more specific
/// pattern must come before any pattern it contains (`stm32f76` before
/// `stm32f7`).
pub const FAMILY_TABLE: &[(&str, FamilyTraits)] = &[
    ("stm32f76", M7_DP),
    ("stm32f77", M7_DP),
    ("stm32f7", M7_SP),
    ("stm32h7", M7_DP),
    ("stm32f0", M0),
    ("stm32g0", M0),
    ("stm32l0", M0),
    ("stm32f1", M3),
    ("stm32f2", M3),
    ("stm32l1", M3),
    ("stm32f3", M4F),
    ("stm32f4", M4F),
    ("stm32g4", M4F),
    ("stm32l4", M4F),
    ("stm32wb", M4F),
    ("stm32l5", M33),
    ("stm32u5", M33),
];

/// Classify a part number. `None` means the family is not supported.
pub fn classify(part: &McuPart) -> Option<&'static FamilyTraits> {
    FAMILY_TABLE
        .iter()
        .find(|(pattern, _)| part.as_str().contains(pattern))
        .map(|(_, traits)| traits)
}
