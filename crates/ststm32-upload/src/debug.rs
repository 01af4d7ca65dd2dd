//! GDB server definitions for a board's debug probes.

use indexmap::IndexMap;
use serde::Serialize;
use ststm32_board::BoardDescriptor;

use crate::error::{Result, UploadError};

/// Probes that get a debug tool when the board lists them as upload protocols.
pub const DEBUG_PROBES: [&str; 4] = ["blackmagic", "jlink", "stlink", "cmsis-dap"];

/// Port the J-Link GDB server listens on.
pub const JLINK_GDB_PORT: u16 = 2331;

/// USB ids of the Black Magic Probe.
const BLACKMAGIC_HWID: [&str; 2] = ["0x1d50", "0x6018"];

/// Scripts directory argument resolved by the debugger at launch.
const OPENOCD_PACKAGE_SCRIPTS: &str = "$PACKAGE_DIR/scripts";

/// A GDB server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GdbServer {
    pub package: String,
    pub executable: String,
    pub arguments: Vec<String>,
}

/// A debug probe usable with the board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DebugTool {
    /// `None` for probes that embed their own GDB server.
    pub server: Option<GdbServer>,
    pub hwids: Vec<[String; 2]>,
    pub require_debug_port: bool,
    pub onboard: bool,
    pub default: bool,
}

/// Debug tools for every probe in [`DEBUG_PROBES`] the board can be flashed
/// with, keyed by probe name in probe order.
pub fn debug_tools(board: &BoardDescriptor) -> Result<IndexMap<String, DebugTool>> {
    let mut tools = IndexMap::new();
    for link in DEBUG_PROBES {
        if !board.upload.protocols.iter().any(|p| p == link) {
            continue;
        }
        let onboard = board.debug.onboard_tools.iter().any(|t| t == link);
        let tool = match link {
            "blackmagic" => DebugTool {
                hwids: vec![BLACKMAGIC_HWID.map(String::from)],
                require_debug_port: true,
                ..DebugTool::default()
            },
            "jlink" => DebugTool {
                server: Some(GdbServer {
                    package: "tool-jlink".into(),
                    executable: jlink_gdb_server().into(),
                    arguments: jlink_server_args(board)?,
                }),
                onboard,
                ..DebugTool::default()
            },
            _ => DebugTool {
                server: Some(GdbServer {
                    package: "tool-openocd".into(),
                    executable: "bin/openocd".into(),
                    arguments: openocd_args(board, link, Some(OPENOCD_PACKAGE_SCRIPTS))?,
                }),
                onboard,
                default: board.debug.default_tools.iter().any(|t| t == link),
                ..DebugTool::default()
            },
        };
        log::debug!("board '{}': debug tool '{link}'", board.id);
        tools.insert(link.to_string(), tool);
    }
    Ok(tools)
}

/// J-Link device name, required for every J-Link operation.
pub(crate) fn jlink_device(board: &BoardDescriptor) -> Result<&str> {
    board
        .debug
        .jlink_device
        .as_deref()
        .ok_or_else(|| UploadError::MissingDebugConfig {
            board: board.id.clone(),
            detail: "no J-Link device id".into(),
        })
}

fn jlink_gdb_server() -> &'static str {
    if cfg!(windows) {
        "JLinkGDBServerCL.exe"
    } else {
        "JLinkGDBServer"
    }
}

fn jlink_server_args(board: &BoardDescriptor) -> Result<Vec<String>> {
    let device = jlink_device(board)?;
    let port = JLINK_GDB_PORT.to_string();
    Ok([
        "-singlerun",
        "-if",
        "SWD",
        "-select",
        "USB",
        "-device",
        device,
        "-port",
        port.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect())
}

/// OpenOCD arguments selecting the board's target through adapter `link`.
///
/// A board config wins; otherwise the adapter interface, its transport and
/// the board's target config are named explicitly.
pub(crate) fn openocd_args(
    board: &BoardDescriptor,
    link: &str,
    scripts: Option<&str>,
) -> Result<Vec<String>> {
    let mut args = Vec::new();
    if let Some(scripts) = scripts {
        args.extend(["-s".to_string(), scripts.to_string()]);
    }
    if let Some(cfg) = &board.debug.openocd_board {
        args.extend(["-f".to_string(), format!("board/{cfg}.cfg")]);
        return Ok(args);
    }
    let target = board
        .debug
        .openocd_target
        .as_deref()
        .ok_or_else(|| UploadError::MissingDebugConfig {
            board: board.id.clone(),
            detail: "no OpenOCD board or target configuration".into(),
        })?;
    let transport = if link == "stlink" { "hla_swd" } else { "swd" };
    args.extend([
        "-f".to_string(),
        format!("interface/{link}.cfg"),
        "-c".to_string(),
        format!("transport select {transport}"),
        "-f".to_string(),
        format!("target/{target}.cfg"),
    ]);
    args.extend(board.debug.openocd_extra_args.iter().cloned());
    Ok(args)
}
