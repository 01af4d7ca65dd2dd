//! Frameworks a board can be built with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BoardError;

/// A software framework the build is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Arduino wiring API (official STM32 core or the Maple core).
    Arduino,
    Mbed,
    /// Bare CMSIS device headers and system files.
    Cmsis,
    /// ST Standard Peripheral Library.
    Spl,
    /// STM32Cube HAL/LL drivers.
    Stm32cube,
    Chibios,
    Zephyr,
    /// No framework: toolchain defaults plus the board's linker script.
    Bare,
}

impl Framework {
    /// All frameworks, in declaration order.
    pub const ALL: [Framework; 8] = [
        Framework::Arduino,
        Framework::Mbed,
        Framework::Cmsis,
        Framework::Spl,
        Framework::Stm32cube,
        Framework::Chibios,
        Framework::Zephyr,
        Framework::Bare,
    ];

    /// Lowercase name as used in manifests and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Arduino => "arduino",
            Framework::Mbed => "mbed",
            Framework::Cmsis => "cmsis",
            Framework::Spl => "spl",
            Framework::Stm32cube => "stm32cube",
            Framework::Chibios => "chibios",
            Framework::Zephyr => "zephyr",
            Framework::Bare => "bare",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Framework::ALL
            .iter()
            .copied()
            .find(|fw| fw.as_str() == lower)
            .ok_or(BoardError::UnknownFramework { name: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("STM32Cube".parse::<Framework>().unwrap(), Framework::Stm32cube);
        assert_eq!(" arduino ".parse::<Framework>().unwrap(), Framework::Arduino);
    }

    #[test]
    fn parse_unknown() {
        let err = "freertos".parse::<Framework>().unwrap_err();
        assert!(matches!(err, BoardError::UnknownFramework { .. }));
        assert!(err.to_string().contains("freertos"));
    }

    #[test]
    fn display_round_trips() {
        for fw in Framework::ALL {
            assert_eq!(fw.to_string().parse::<Framework>().unwrap(), fw);
        }
    }
}
