//! TOML parsing, serialization, validation, and discovery for board manifests.
//!
//! Board manifests are stored as `<id>.board.toml` files in a boards
//! directory. This module provides functions to load, validate, serialize,
//! and discover these files.

use std::path::{Path, PathBuf};

use crate::builtin;
use crate::descriptor::{BoardDescriptor, SRAM_ORIGIN};
use crate::error::{BoardError, Result};
use crate::mcu::{classify, CoreTier, McuPart};

/// File suffix of board manifests.
pub const MANIFEST_SUFFIX: &str = ".board.toml";

/// A validation issue found in a board definition.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Load a board from a `.board.toml` file.
pub fn load_board_toml(path: &Path) -> Result<BoardDescriptor> {
    if !path.exists() {
        return Err(BoardError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_board_toml(&content)
}

/// Parse a board from a TOML string.
pub fn parse_board_toml(toml_str: &str) -> Result<BoardDescriptor> {
    let board: BoardDescriptor = toml::from_str(toml_str)?;
    Ok(board)
}

/// Serialize a board to pretty TOML.
pub fn board_to_toml(board: &BoardDescriptor) -> Result<String> {
    let toml_str = toml::to_string_pretty(board)?;
    Ok(toml_str)
}

/// Expected core tier for a `-mcpu` tag.
fn cpu_tier(cpu: &str) -> Option<CoreTier> {
    match cpu {
        "cortex-m0" | "cortex-m0plus" => Some(CoreTier::ArmV6M),
        "cortex-m3" => Some(CoreTier::ArmV7M),
        "cortex-m4" | "cortex-m7" => Some(CoreTier::ArmV7EM),
        "cortex-m33" => Some(CoreTier::ArmV8M),
        _ => None,
    }
}

/// Validate a board definition for structural correctness.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
/// Issues of severity "warning" do not make a board unusable.
pub fn validate_board(board: &BoardDescriptor) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if board.id.trim().is_empty() {
        issues.push(ValidationIssue {
            severity: "error",
            message: "board id is empty".into(),
        });
    }

    // MCU must parse and belong to a known family
    match McuPart::parse(&board.build.mcu) {
        Ok(mcu) => match classify(&mcu) {
            Some(traits) => {
                if let Some(tier) = cpu_tier(&board.build.cpu) {
                    if tier != traits.tier {
                        issues.push(ValidationIssue {
                            severity: "warning",
                            message: format!(
                                "cpu '{}' does not match the {:?} core of MCU '{}'",
                                board.build.cpu, traits.tier, mcu
                            ),
                        });
                    }
                }
            }
            None => issues.push(ValidationIssue {
                severity: "error",
                message: format!("MCU '{mcu}' does not belong to a supported family"),
            }),
        },
        Err(e) => issues.push(ValidationIssue {
            severity: "error",
            message: e.to_string(),
        }),
    }

    if cpu_tier(&board.build.cpu).is_none() {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!("cpu '{}' is not a supported Cortex-M core", board.build.cpu),
        });
    }

    if board.upload.maximum_ram_size == 0 {
        issues.push(ValidationIssue {
            severity: "error",
            message: "maximum-ram-size is 0".into(),
        });
    }
    if board.upload.maximum_size == 0 {
        issues.push(ValidationIssue {
            severity: "error",
            message: "maximum-size is 0".into(),
        });
    }
    if SRAM_ORIGIN.checked_add(board.upload.maximum_ram_size).map_or(true, |end| end > u32::MAX as u64) {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!(
                "maximum-ram-size ({}) overflows the 32-bit address space",
                board.upload.maximum_ram_size
            ),
        });
    }

    if let Some(protocol) = &board.upload.protocol {
        if !board.upload.protocols.is_empty() && !board.upload.protocols.contains(protocol) {
            issues.push(ValidationIssue {
                severity: "warning",
                message: format!("default protocol '{protocol}' is not listed in protocols"),
            });
        }
    }

    if board.has_protocol("jlink") && board.debug.jlink_device.is_none() {
        issues.push(ValidationIssue {
            severity: "warning",
            message: "jlink protocol listed without a jlink-device".into(),
        });
    }

    let needs_openocd = ["stlink", "cmsis-dap"].iter().any(|p| board.has_protocol(p));
    if needs_openocd && board.debug.openocd_board.is_none() && board.debug.openocd_target.is_none() {
        issues.push(ValidationIssue {
            severity: "warning",
            message: "OpenOCD probe listed without openocd-board or openocd-target".into(),
        });
    }

    for (i, fw) in board.frameworks.iter().enumerate() {
        if board.frameworks[..i].contains(fw) {
            issues.push(ValidationIssue {
                severity: "warning",
                message: format!("framework '{fw}' listed more than once"),
            });
        }
    }

    for hwid in &board.upload.hwids {
        for half in hwid {
            if u16::from_str_radix(half.trim_start_matches("0x").trim_start_matches("0X"), 16).is_err() {
                issues.push(ValidationIssue {
                    severity: "error",
                    message: format!("hwid '{half}' is not a 16-bit hex number"),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Generate a template `.board.toml` for a new board.
///
/// Seeds from the BluePill F103C8 with the given id.
pub fn generate_template(id: &str) -> Result<String> {
    let mut board = builtin::bluepill_f103c8();
    board.id = id.into();
    board.name = id.into();
    board_to_toml(&board)
}

/// Discover all `.board.toml` files in a boards directory.
///
/// Returns a list of (board_id, file_path) pairs sorted by id.
pub fn discover_boards(boards_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !boards_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut boards = Vec::new();
    for entry in std::fs::read_dir(boards_dir)? {
        let path = entry?.path();
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(MANIFEST_SUFFIX))
            .map(str::to_string);
        if let Some(id) = id {
            boards.push((id, path));
        }
    }
    boards.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(boards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
id = "blackpill_f411ce"
name = "WeAct BlackPill F411CE"
frameworks = ["arduino", "stm32cube"]

[build]
mcu = "stm32f411ceu6"
cpu = "cortex-m4"
f-cpu = 100000000
extra-flags = ["-DSTM32F4", "-DSTM32F411xE"]

[upload]
maximum-size = 524288
maximum-ram-size = 131072
protocol = "dfu"
protocols = ["dfu", "stlink"]
offset-address = 0x08000000
hwids = [["0x0483", "0xDF11"]]

[debug]
openocd-target = "stm32f4x"
"#;
        let board = parse_board_toml(toml_str).unwrap();
        assert_eq!(board.id, "blackpill_f411ce");
        assert_eq!(board.build.f_cpu, 100_000_000);
        assert_eq!(board.upload_offset(), 0x0800_0000);
        assert_eq!(board.upload.hwids[0], ["0x0483".to_string(), "0xDF11".to_string()]);
        assert!(board.build.ldscript.is_none());
        assert!(validate_board(&board).is_ok());
    }

    #[test]
    fn serialized_builtin_parses_back() {
        let original = builtin::nucleo_l476rg();
        let parsed = parse_board_toml(&board_to_toml(&original).unwrap()).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn parse_missing_field_returns_error() {
        assert!(parse_board_toml("id = \"incomplete\"").is_err());
    }

    #[test]
    fn parse_unknown_framework_returns_error() {
        let mut toml_str = board_to_toml(&builtin::nucleo_f401re()).unwrap();
        toml_str = toml_str.replace("\"zephyr\"", "\"riot\"");
        assert!(parse_board_toml(&toml_str).is_err());
    }

    #[test]
    fn validate_unknown_family() {
        let mut board = builtin::nucleo_f401re();
        board.build.mcu = "stm32wl55jci6".into();
        let issues = validate_board(&board).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.severity == "error" && i.message.contains("supported family")));
    }

    #[test]
    fn validate_cpu_mismatch_is_warning() {
        let mut board = builtin::nucleo_f401re();
        board.build.cpu = "cortex-m3".into();
        let issues = validate_board(&board).unwrap_err();
        assert!(issues.iter().all(|i| i.severity == "warning"));
        assert!(issues.iter().any(|i| i.message.contains("does not match")));
    }

    #[test]
    fn validate_zero_memory() {
        let mut board = builtin::nucleo_f401re();
        board.upload.maximum_ram_size = 0;
        let issues = validate_board(&board).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("maximum-ram-size is 0")));
    }

    #[test]
    fn validate_bad_hwid() {
        let mut board = builtin::maple_mini();
        board.upload.hwids = vec![["0x1EAF".into(), "bootloader".into()]];
        let issues = validate_board(&board).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("hwid 'bootloader'")));
    }

    #[test]
    fn validate_jlink_without_device() {
        let mut board = builtin::bluepill_f103c8();
        board.debug.jlink_device = None;
        let issues = validate_board(&board).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("jlink-device")));
    }

    #[test]
    fn generate_template_is_valid() {
        let toml_str = generate_template("my-board").unwrap();
        let board = parse_board_toml(&toml_str).unwrap();
        assert_eq!(board.id, "my-board");
        assert!(validate_board(&board).is_ok());
    }

    #[test]
    fn discover_boards_finds_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = generate_template("board-a").unwrap();
        std::fs::write(dir.path().join("board-b.board.toml"), &template).unwrap();
        std::fs::write(dir.path().join("board-a.board.toml"), &template).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let boards = discover_boards(dir.path()).unwrap();
        assert_eq!(boards.len(), 2);
        assert_eq!(boards[0].0, "board-a");
        assert_eq!(boards[1].0, "board-b");
    }

    #[test]
    fn discover_missing_dir() {
        let boards = discover_boards(Path::new("/nonexistent/boards")).unwrap();
        assert!(boards.is_empty());
    }

    #[test]
    fn load_not_found() {
        let result = load_board_toml(Path::new("/nonexistent/x.board.toml"));
        assert!(matches!(result.unwrap_err(), BoardError::NotFound { .. }));
    }
}
