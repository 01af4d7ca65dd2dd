//! Upload command selection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use ststm32_board::descriptor::DEFAULT_FLASH_ORIGIN;
use ststm32_board::{BoardDescriptor, Framework};

use crate::debug::{jlink_device, openocd_args};
use crate::error::{Result, UploadError};
use crate::protocol::Protocol;

/// Baud rate for the serial bootloader when the board names none.
pub const DEFAULT_SERIAL_SPEED: u32 = 115_200;

/// SWD clock for J-Link uploads, in kHz.
pub const JLINK_SPEED_KHZ: u32 = 4000;

/// Commands the GDB uploader reads, relative to the project directory.
pub const GDB_SCRIPT: &str = "upload.gdb";

/// What a finished build offers to an uploader.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub project_dir: PathBuf,
    pub build_dir: PathBuf,
    /// Raw image written by most uploaders.
    pub firmware_bin: PathBuf,
    /// ELF image, for GDB based uploaders.
    pub firmware_elf: PathBuf,
    /// Serial port, GDB remote or mount point, depending on the protocol.
    pub port: Option<String>,
    /// Flash address the image is written to.
    pub offset: u64,
    pub framework: Framework,
    /// Command template for the `custom` protocol.
    pub custom_command: Option<String>,
    /// OpenOCD scripts directory passed with `-s`.
    pub openocd_scripts: Option<PathBuf>,
}

impl UploadContext {
    /// Context for `<build_dir>/firmware.{bin,elf}` written at the start of flash.
    pub fn new(project_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>, framework: Framework) -> Self {
        let build_dir = build_dir.into();
        Self {
            project_dir: project_dir.into(),
            firmware_bin: build_dir.join("firmware.bin"),
            firmware_elf: build_dir.join("firmware.elf"),
            build_dir,
            port: None,
            offset: DEFAULT_FLASH_ORIGIN,
            framework,
            custom_command: None,
            openocd_scripts: None,
        }
    }

    fn port(&self, protocol: Protocol) -> Result<&str> {
        self.port.as_deref().ok_or_else(|| UploadError::MissingPort {
            protocol: protocol.name().to_string(),
        })
    }

    fn bin(&self) -> String {
        self.firmware_bin.display().to_string()
    }

    fn elf(&self) -> String {
        self.firmware_elf.display().to_string()
    }

    fn hex_offset(&self) -> String {
        format!("0x{:08x}", self.offset)
    }
}

/// A file an upload command reads, written just before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// How the image gets onto the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    /// Run `executable` with `args`, after writing `files`.
    Command {
        executable: String,
        args: Vec<String>,
        files: Vec<GeneratedFile>,
    },
    /// A user command line, run through the shell.
    Shell { command: String },
    /// Copy the image onto a mounted volume.
    DiskCopy { source: PathBuf, dest: PathBuf },
}

impl UploadAction {
    fn command(executable: &str, args: Vec<String>) -> Self {
        UploadAction::Command {
            executable: executable.to_string(),
            args,
            files: Vec::new(),
        }
    }

    /// Perform the upload.
    pub fn run(&self) -> Result<()> {
        log::info!("uploading: {self}");
        let status = match self {
            UploadAction::Command {
                executable,
                args,
                files,
            } => {
                for file in files {
                    if let Some(parent) = file.path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&file.path, &file.contents)?;
                }
                process::Command::new(executable).args(args).status()?
            }
            UploadAction::Shell { command } => shell(command).status()?,
            UploadAction::DiskCopy { source, dest } => {
                std::fs::copy(source, dest)?;
                return Ok(());
            }
        };
        if !status.success() {
            return Err(UploadError::CommandFailed {
                command: self.to_string(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(windows)]
fn shell(command: &str) -> process::Command {
    let mut cmd = process::Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> process::Command {
    let mut cmd = process::Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

impl fmt::Display for UploadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadAction::Command { executable, args, .. } => {
                f.write_str(executable)?;
                for arg in args {
                    if arg.is_empty() || arg.contains(char::is_whitespace) {
                        write!(f, " \"{arg}\"")?;
                    } else {
                        write!(f, " {arg}")?;
                    }
                }
                Ok(())
            }
            UploadAction::Shell { command } => f.write_str(command),
            UploadAction::DiskCopy { source, dest } => {
                write!(f, "copy {} -> {}", source.display(), dest.display())
            }
        }
    }
}

/// The chosen upload, if any, and what was noticed while choosing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPlan {
    pub action: Option<UploadAction>,
    pub warnings: Vec<String>,
}

impl UploadPlan {
    fn action(action: UploadAction) -> Self {
        Self {
            action: Some(action),
            warnings: Vec::new(),
        }
    }

    fn warning(message: String) -> Self {
        log::warn!("{message}");
        Self {
            action: None,
            warnings: vec![message],
        }
    }
}

/// Choose how to upload `ctx`'s image to `board` over `protocol`.
///
/// Without a protocol, mbed builds are copied to the board's volume and
/// everything else goes through ST-Link. A protocol nobody handles yields no
/// action and a warning rather than an error.
pub fn select_uploader(
    protocol: Option<&str>,
    board: &BoardDescriptor,
    ctx: &UploadContext,
) -> Result<UploadPlan> {
    let name = protocol.map(str::trim).filter(|p| !p.is_empty());
    let protocol = match name {
        None if ctx.framework == Framework::Mbed => Protocol::Mbed,
        None => Protocol::Stlink,
        Some(name) => match Protocol::from_name(name) {
            Some(protocol) => protocol,
            None => return Ok(UploadPlan::warning(format!("unknown upload protocol '{name}'"))),
        },
    };
    log::debug!("board '{}': upload protocol '{protocol}'", board.id);

    let action = match protocol {
        Protocol::Serial => {
            let speed = board.upload.speed.unwrap_or(DEFAULT_SERIAL_SPEED);
            UploadAction::command(
                "stm32flash",
                vec![
                    "-g".into(),
                    ctx.hex_offset(),
                    "-b".into(),
                    speed.to_string(),
                    "-w".into(),
                    ctx.bin(),
                    ctx.port(protocol)?.to_string(),
                ],
            )
        }
        Protocol::Dfu => {
            let mut args = Vec::new();
            if !board.upload.hwids.is_empty() {
                let ids: Vec<String> = board
                    .upload
                    .hwids
                    .iter()
                    .map(|[vid, pid]| format!("{vid}:{pid}"))
                    .collect();
                args.extend(["-d".to_string(), ids.join(",")]);
            }
            args.extend([
                "-a".to_string(),
                "0".to_string(),
                "-s".to_string(),
                format!("{}:leave", ctx.hex_offset()),
                "-D".to_string(),
                ctx.bin(),
            ]);
            UploadAction::command("dfu-util", args)
        }
        Protocol::Stlink => {
            UploadAction::command("st-flash", vec!["write".into(), ctx.bin(), ctx.hex_offset()])
        }
        Protocol::OpenOcd(adapter) => {
            let scripts = ctx.openocd_scripts.as_ref().map(|p| p.display().to_string());
            let mut args = openocd_args(board, adapter, scripts.as_deref())?;
            args.extend([
                "-c".to_string(),
                format!(
                    "program {{{}}} {} verify reset; shutdown;",
                    ctx.bin(),
                    ctx.hex_offset()
                ),
            ]);
            UploadAction::command("openocd", args)
        }
        Protocol::Jlink => jlink(board, ctx)?,
        Protocol::Blackmagic => {
            let port = ctx.port(protocol)?;
            UploadAction::command(
                "arm-none-eabi-gdb",
                vec![
                    "-nx".into(),
                    "--batch".into(),
                    "-ex".into(),
                    format!("target extended-remote {port}"),
                    "-ex".into(),
                    "monitor swdp_scan".into(),
                    "-ex".into(),
                    "attach 1".into(),
                    "-ex".into(),
                    "load".into(),
                    "-ex".into(),
                    "compare-sections".into(),
                    "-ex".into(),
                    "kill".into(),
                    ctx.elf(),
                ],
            )
        }
        Protocol::Hid => {
            UploadAction::command("hid-flash", vec![ctx.bin(), ctx.port(protocol)?.to_string()])
        }
        Protocol::Mbed => disk_copy(ctx, ctx.port(protocol)?),
        Protocol::Gdb => {
            let script = ctx.project_dir.join(GDB_SCRIPT);
            if !script.is_file() {
                return Err(UploadError::MissingGdbScript { path: script });
            }
            UploadAction::command(
                "arm-none-eabi-gdb",
                vec![
                    ctx.elf(),
                    "-batch".into(),
                    "-x".into(),
                    script.display().to_string(),
                ],
            )
        }
        Protocol::Custom => match &ctx.custom_command {
            Some(template) => UploadAction::Shell {
                command: expand_command(template, ctx),
            },
            None => {
                return Ok(UploadPlan::warning(
                    "upload protocol 'custom' needs an upload command".to_string(),
                ))
            }
        },
    };
    Ok(UploadPlan::action(action))
}

fn jlink(board: &BoardDescriptor, ctx: &UploadContext) -> Result<UploadAction> {
    let device = jlink_device(board)?;
    let script = GeneratedFile {
        path: ctx.build_dir.join("upload.jlink"),
        contents: format!("h\nloadbin {}, {}\nr\nq\n", ctx.bin(), ctx.hex_offset()),
    };
    let executable = if cfg!(windows) { "JLink.exe" } else { "JLinkExe" };
    Ok(UploadAction::Command {
        executable: executable.to_string(),
        args: vec![
            "-device".into(),
            device.to_string(),
            "-speed".into(),
            JLINK_SPEED_KHZ.to_string(),
            "-if".into(),
            "swd".into(),
            "-autoconnect".into(),
            "1".into(),
            "-CommanderScript".into(),
            script.path.display().to_string(),
        ],
        files: vec![script],
    })
}

fn disk_copy(ctx: &UploadContext, mount: &str) -> UploadAction {
    let name = ctx
        .firmware_bin
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "firmware.bin".into());
    UploadAction::DiskCopy {
        source: ctx.firmware_bin.clone(),
        dest: Path::new(mount).join(name),
    }
}

/// Substitute `$SOURCE`, `$PROG_PATH` and `$UPLOAD_PORT` (or their `${..}`
/// forms) in a user command. Other variables are left as written.
fn expand_command(template: &str, ctx: &UploadContext) -> String {
    static VAR: OnceLock<Regex> = OnceLock::new();
    let re = VAR.get_or_init(|| {
        Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("command variable pattern is valid")
    });
    re.replace_all(template, |caps: &Captures<'_>| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        match name {
            "SOURCE" => ctx.bin(),
            "PROG_PATH" => ctx.elf(),
            "UPLOAD_PORT" => ctx.port.clone().unwrap_or_default(),
            _ => caps[0].to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ststm32_board::builtin;
    use tempfile::TempDir;

    fn ctx(dir: &Path) -> UploadContext {
        UploadContext::new(dir, dir.join("build"), Framework::Arduino)
    }

    fn command(plan: &UploadPlan) -> (&str, &[String]) {
        match plan.action.as_ref().unwrap() {
            UploadAction::Command { executable, args, .. } => (executable.as_str(), args.as_slice()),
            other => panic!("expected a command, got {other:?}"),
        }
    }

    #[test]
    fn stlink_writes_at_flash_origin() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        let plan = select_uploader(Some("stlink"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        let (exe, args) = command(&plan);
        assert_eq!(exe, "st-flash");
        assert_eq!(args, [String::from("write"), ctx.bin(), "0x08000000".into()]);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn no_protocol_defaults_to_stlink() {
        let dir = TempDir::new().unwrap();
        let plan = select_uploader(None, &builtin::nucleo_f401re(), &ctx(dir.path())).unwrap();
        assert_eq!(command(&plan).0, "st-flash");
        let plan = select_uploader(Some("  "), &builtin::nucleo_f401re(), &ctx(dir.path())).unwrap();
        assert_eq!(command(&plan).0, "st-flash");
    }

    #[test]
    fn unknown_protocol_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let plan = select_uploader(Some("teleport"), &builtin::bluepill_f103c8(), &ctx(dir.path())).unwrap();
        assert!(plan.action.is_none());
        assert_eq!(plan.warnings, ["unknown upload protocol 'teleport'"]);
    }

    #[test]
    fn serial_needs_a_port() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx(dir.path());
        let err = select_uploader(Some("serial"), &builtin::bluepill_f103c8(), &ctx).unwrap_err();
        assert!(matches!(err, UploadError::MissingPort { ref protocol } if protocol == "serial"));

        ctx.port = Some("/dev/ttyUSB0".into());
        let plan = select_uploader(Some("serial"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        let (exe, args) = command(&plan);
        assert_eq!(exe, "stm32flash");
        assert_eq!(&args[..4], ["-g", "0x08000000", "-b", "115200"]);
        assert_eq!(args.last().unwrap(), "/dev/ttyUSB0");
    }

    #[test]
    fn serial_uses_board_speed() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx(dir.path());
        ctx.port = Some("COM3".into());
        let mut board = builtin::bluepill_f103c8();
        board.upload.speed = Some(57_600);
        let plan = select_uploader(Some("serial"), &board, &ctx).unwrap();
        assert_eq!(command(&plan).1[3], "57600");
    }

    #[test]
    fn dfu_lists_hwids_and_leaves() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx(dir.path());
        ctx.offset = 0x0800_2000;
        let plan = select_uploader(Some("dfu"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        let (exe, args) = command(&plan);
        assert_eq!(exe, "dfu-util");
        assert_eq!(&args[..6], ["-d", "0x1EAF:0x0003,0x1EAF:0x0004", "-a", "0", "-s", "0x08002000:leave"]);
        assert_eq!(args.last().unwrap(), &ctx.bin());
    }

    #[test]
    fn openocd_programs_and_verifies() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx(dir.path());
        ctx.openocd_scripts = Some(dir.path().join("scripts"));
        let plan = select_uploader(Some("cmsis-dap"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        let (exe, args) = command(&plan);
        assert_eq!(exe, "openocd");
        assert_eq!(args[0], "-s");
        assert!(args.contains(&"interface/cmsis-dap.cfg".to_string()));
        let program = args.last().unwrap();
        assert_eq!(
            program,
            &format!("program {{{}}} 0x08000000 verify reset; shutdown;", ctx.bin())
        );
    }

    #[test]
    fn jlink_generates_a_command_script() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        let plan = select_uploader(Some("jlink"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        let Some(UploadAction::Command { args, files, .. }) = plan.action else {
            panic!("expected a command");
        };
        assert_eq!(&args[..4], ["-device", "STM32F103C8", "-speed", "4000"]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, dir.path().join("build").join("upload.jlink"));
        assert_eq!(
            files[0].contents,
            format!("h\nloadbin {}, 0x08000000\nr\nq\n", ctx.bin())
        );
        assert_eq!(args.last().unwrap(), &files[0].path.display().to_string());
    }

    #[test]
    fn jlink_needs_a_device() {
        let dir = TempDir::new().unwrap();
        let err = select_uploader(Some("jlink"), &builtin::maple_mini(), &ctx(dir.path())).unwrap_err();
        assert!(matches!(err, UploadError::MissingDebugConfig { .. }));
    }

    #[test]
    fn blackmagic_loads_the_elf() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx(dir.path());
        ctx.port = Some("/dev/ttyACM0".into());
        let plan = select_uploader(Some("blackmagic"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        let (exe, args) = command(&plan);
        assert_eq!(exe, "arm-none-eabi-gdb");
        assert!(args.contains(&"target extended-remote /dev/ttyACM0".to_string()));
        assert_eq!(args.last().unwrap(), &ctx.elf());
    }

    #[test]
    fn hid_flash() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx(dir.path());
        ctx.port = Some("COM4".into());
        let plan = select_uploader(Some("hid"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        assert_eq!(command(&plan), ("hid-flash", &[ctx.bin(), "COM4".into()][..]));
    }

    #[test]
    fn gdb_requires_project_script() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        let err = select_uploader(Some("gdb"), &builtin::bluepill_f103c8(), &ctx).unwrap_err();
        assert!(matches!(err, UploadError::MissingGdbScript { .. }));

        std::fs::write(dir.path().join("upload.gdb"), "load\n").unwrap();
        let plan = select_uploader(Some("gdb"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        let (exe, args) = command(&plan);
        assert_eq!(exe, "arm-none-eabi-gdb");
        assert_eq!(args[0], ctx.elf());
        assert_eq!(args[1..3], ["-batch", "-x"]);
    }

    #[test]
    fn mbed_without_protocol_copies_to_disk() {
        let dir = TempDir::new().unwrap();
        let mut ctx = UploadContext::new(dir.path(), dir.path().join("build"), Framework::Mbed);
        let err = select_uploader(None, &builtin::nucleo_f401re(), &ctx).unwrap_err();
        assert!(matches!(err, UploadError::MissingPort { .. }));

        ctx.port = Some("/media/NODE_F401RE".into());
        let plan = select_uploader(None, &builtin::nucleo_f401re(), &ctx).unwrap();
        assert_eq!(
            plan.action,
            Some(UploadAction::DiskCopy {
                source: ctx.firmware_bin.clone(),
                dest: PathBuf::from("/media/NODE_F401RE/firmware.bin"),
            })
        );
    }

    #[test]
    fn disk_copy_runs() {
        let dir = TempDir::new().unwrap();
        let mount = dir.path().join("mnt");
        std::fs::create_dir_all(&mount).unwrap();
        let mut ctx = ctx(dir.path());
        std::fs::create_dir_all(&ctx.build_dir).unwrap();
        std::fs::write(&ctx.firmware_bin, b"\x00\x50\x00\x20").unwrap();
        ctx.port = Some(mount.display().to_string());
        let plan = select_uploader(Some("mbed"), &builtin::nucleo_f401re(), &ctx).unwrap();
        plan.action.unwrap().run().unwrap();
        assert_eq!(std::fs::read(mount.join("firmware.bin")).unwrap(), b"\x00\x50\x00\x20");
    }

    #[test]
    fn custom_command_substitution() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx(dir.path());
        ctx.port = Some("/dev/ttyUSB1".into());
        ctx.custom_command = Some("flasher ${SOURCE} $PROG_PATH --port $UPLOAD_PORT $HOME".into());
        let plan = select_uploader(Some("custom"), &builtin::bluepill_f103c8(), &ctx).unwrap();
        assert_eq!(
            plan.action,
            Some(UploadAction::Shell {
                command: format!("flasher {} {} --port /dev/ttyUSB1 $HOME", ctx.bin(), ctx.elf()),
            })
        );
    }

    #[test]
    fn custom_without_command_warns() {
        let dir = TempDir::new().unwrap();
        let plan = select_uploader(Some("custom"), &builtin::bluepill_f103c8(), &ctx(dir.path())).unwrap();
        assert!(plan.action.is_none());
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let action = UploadAction::command("openocd", vec!["-c".into(), "reset run".into()]);
        assert_eq!(action.to_string(), "openocd -c \"reset run\"");
    }
}
