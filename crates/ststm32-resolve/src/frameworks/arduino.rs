//! Arduino cores: the legacy Maple cores for F1 and F4, and the official
//! STM32 core for everything else.

use std::path::{Path, PathBuf};

use ststm32_board::Framework;

use super::{FrameworkContext, FrameworkSetup, LibrarySpec, LinkerSource};
use crate::error::{ResolveError, Result};

/// Define that forces the official core on parts the Maple core also runs on.
pub const OFFICIAL_CORE_DEFINE: &str = "STM32_OFFICIAL_CORE";

/// Vector table address behind the Maple DFU bootloader.
const BOOTLOADER_VECTOR: u64 = 0x0800_2000;
/// Vector table address behind the original Maple bootloader.
const MAPLE_ORIGIN_VECTOR: u64 = 0x0800_5000;

/// Maple F1 variants keyed by canonical part prefix, first match wins.
///
/// The medium-density R rows must stay above the catch-all `stm32f103r`.
const MAPLE_F1_VARIANTS: &[(&[&str], &str)] = &[
    (&["stm32f103c"], "generic_stm32f103c"),
    (&["stm32f103r8", "stm32f103rb"], "generic_stm32f103r8"),
    (&["stm32f103r"], "generic_stm32f103r"),
];

/// Which Arduino core a board builds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArduinoCore {
    MapleF1,
    MapleF4,
    Official,
}

/// Pick the core for the board in `ctx`.
pub fn select_core(ctx: &FrameworkContext<'_>) -> ArduinoCore {
    let maple = match ctx.board.build.core.as_deref() {
        Some("maple") => true,
        Some(_) => false,
        None => {
            !ctx.requested_define(OFFICIAL_CORE_DEFINE)
                && (ctx.mcu.line() == "stm32f103" || ctx.mcu.canonical() == "stm32f407ve")
        }
    };
    match (maple, ctx.mcu.family()) {
        (true, "stm32f1") => ArduinoCore::MapleF1,
        (true, "stm32f4") => ArduinoCore::MapleF4,
        _ => ArduinoCore::Official,
    }
}

pub fn configure(ctx: &FrameworkContext<'_>) -> Result<FrameworkSetup> {
    let root = ctx.packages.framework_dir(Framework::Arduino)?;
    let core = select_core(ctx);
    log::info!("arduino core for {}: {core:?}", ctx.board.id);
    match core {
        ArduinoCore::MapleF1 => maple_f1(ctx, &root.join("STM32F1")),
        ArduinoCore::MapleF4 => maple_f4(ctx, &root.join("STM32F4")),
        ArduinoCore::Official => official(ctx, &root.join("STM32")),
    }
}

fn maple_f1_variant(ctx: &FrameworkContext<'_>) -> Result<String> {
    let canonical = ctx.mcu.canonical();
    MAPLE_F1_VARIANTS
        .iter()
        .find(|(prefixes, _)| prefixes.iter().any(|p| canonical.starts_with(p)))
        .map(|(_, v)| v.to_string())
        .or_else(|| ctx.board.build.variant.clone())
        .ok_or_else(|| ResolveError::NoVariant {
            board: ctx.board.id.clone(),
            framework: Framework::Arduino,
            mcu: canonical.to_string(),
        })
}

fn maple_f1(ctx: &FrameworkContext<'_>, fw: &Path) -> Result<FrameworkSetup> {
    let canonical = ctx.mcu.canonical();
    let id = ctx.board.id.as_str();
    let mut setup = FrameworkSetup::default();
    let add = &mut setup.layer.add;

    let mut ldscript = match canonical {
        "stm32f103c8" => "jtag_c8.ld".to_string(),
        "stm32f103cb" => "jtag.ld".to_string(),
        _ => format!("{canonical}.ld"),
    };
    let mut variant = maple_f1_variant(ctx)?;
    let mut vector = ststm32_board::descriptor::DEFAULT_FLASH_ORIGIN;

    if id.starts_with("maple") {
        add.define_flag("SERIAL_USB");
        variant = if id.starts_with("maple_mini") {
            "maple_mini".to_string()
        } else {
            "maple".to_string()
        };
        vector = BOOTLOADER_VECTOR;
        ldscript = "bootloader_20.ld".into();
        if id == "maple_mini_origin" || id == "maple" {
            vector = MAPLE_ORIGIN_VECTOR;
            ldscript = "flash.ld".into();
        }
    } else {
        match ctx.upload_protocol {
            Some("dfu") => {
                vector = BOOTLOADER_VECTOR;
                add.define_flag("SERIAL_USB").define_flag("GENERIC_BOOTLOADER");
                if canonical.starts_with("stm32f103c") {
                    ldscript = "bootloader_20.ld".into();
                } else if canonical.starts_with("stm32f103r") {
                    ldscript = "bootloader.ld".into();
                }
            }
            Some("stlink") => {
                add.define("CONFIG_MAPLE_MINI_NO_DISABLE_DEBUG", 1)
                    .define_flag("SERIAL_USB")
                    .define_flag("GENERIC_BOOTLOADER");
            }
            _ => {
                add.define("CONFIG_MAPLE_MINI_NO_DISABLE_DEBUG", 1);
                if let Some(addr) = ctx.board.build.vec_tab_addr {
                    vector = addr;
                }
            }
        }
    }

    add.cflags.push("-std=gnu11".into());
    add.cxxflags.push("-std=gnu++11".into());
    add.ccflags.extend(
        ["-MMD", "--param", "max-inline-insns-single=500", "-march=armv7-m"]
            .map(String::from),
    );
    add.define("DEBUG_LEVEL", "DEBUG_NONE")
        .define_flag(format!("BOARD_{variant}"))
        .define("VECT_TAB_ADDR", format!("{vector:#x}"))
        .define("ERROR_LED_PORT", "GPIOB")
        .define("ERROR_LED_PIN", 1)
        .define("ARDUINO", 10610)
        .define_flag(format!("ARDUINO_{}", variant.to_uppercase()))
        .define_flag("ARDUINO_ARCH_STM32F1")
        .define_flag("__STM32F1__")
        .define_flag(format!("MCU_{}", canonical.to_uppercase()));

    let variant_dir = fw.join("variants").join(&variant);
    add.cpppath.extend([
        fw.join("cores/maple"),
        fw.join("system/libmaple"),
        fw.join("system/libmaple/include"),
        fw.join("system/libmaple/usb/stm32f1"),
        fw.join("system/libmaple/usb/usb_lib"),
        variant_dir.clone(),
    ]);
    add.libpath.push(variant_dir.join("ld"));

    let remove = &mut setup.layer.remove;
    remove.linkflags.extend(["-nostartfiles", "-nostdlib"].map(String::from));
    remove.libs.extend(["c", "stdc++", "nosys"].map(String::from));

    setup.linker = LinkerSource::Direct(variant_dir.join("ld").join(ldscript));
    setup.upload_offset = Some(vector);
    setup.libraries = vec![
        LibrarySpec::new("FrameworkArduinoVariant", variant_dir),
        LibrarySpec::new("FrameworkArduino", fw.join("cores/maple")),
    ];
    setup.variant = Some(variant);
    Ok(setup)
}

fn maple_f4(ctx: &FrameworkContext<'_>, fw: &Path) -> Result<FrameworkSetup> {
    let canonical = ctx.mcu.canonical();
    let variant = if canonical == "stm32f407ve" {
        "generic_f407v".to_string()
    } else {
        ctx.board
            .build
            .variant
            .clone()
            .ok_or_else(|| ResolveError::NoVariant {
                board: ctx.board.id.clone(),
                framework: Framework::Arduino,
                mcu: canonical.to_string(),
            })?
    };

    let mut setup = FrameworkSetup::default();
    let add = &mut setup.layer.add;
    let common = ["-mthumb", "-MMD", "-nostdlib", "--param", "max-inline-insns-single=500"];
    add.cflags.push("-std=gnu11".into());
    add.cflags.extend(common.map(String::from));
    add.cxxflags.extend(["-std=gnu++11", "-fno-rtti", "-fno-exceptions"].map(String::from));
    add.cxxflags.extend(common.map(String::from));

    let arduino_board = if ctx.board.id.contains("nucleo") {
        "STM_NUCLEO_F103RB".to_string()
    } else {
        format!("ARDUINO_{}", variant.to_uppercase())
    };
    add.define("DEBUG_LEVEL", "DEBUG_NONE")
        .define_flag(format!("BOARD_{variant}"))
        .define("ERROR_LED_PORT", "GPIOA")
        .define("ERROR_LED_PIN", 7)
        .define("ARDUINO", 10610)
        .define_flag(arduino_board)
        .define_flag("ARDUINO_ARCH_STM32F4")
        .define_flag("VECT_TAB_FLASH")
        .define("USER_ADDR_ROM", "0x08000000")
        .define_flag("__STM32F4__")
        .define_flag(format!("MCU_{}", canonical.to_uppercase()))
        .define_flag("SERIAL_USB");

    let variant_dir = fw.join("variants").join(&variant);
    add.cpppath.extend([
        fw.join("cores/maple"),
        fw.join("cores/maple/avr"),
        fw.join("cores/maple/libmaple"),
        fw.join("cores/maple/libmaple/usbF4"),
        fw.join("cores/maple/libmaple/usbF4/VCP"),
        fw.join("system/libmaple"),
        variant_dir.clone(),
    ]);
    add.libpath.push(variant_dir.join("ld"));
    add.libs.push("c".into());

    let remove = &mut setup.layer.remove;
    remove.linkflags.extend(["-nostartfiles", "-nostdlib"].map(String::from));
    remove.libs.extend(["stdc++", "nosys"].map(String::from));

    setup.linker = LinkerSource::Direct(variant_dir.join("ld").join("jtag.ld"));
    setup.libraries = vec![
        LibrarySpec::new("FrameworkArduinoVariant", variant_dir),
        LibrarySpec::new("FrameworkArduino", fw.join("cores/maple")),
    ];
    setup.variant = Some(variant);
    Ok(setup)
}

/// Official core variant name for a board id.
pub fn official_variant(board_id: &str) -> String {
    let variant = board_id.to_uppercase();
    if variant.contains("DISCO_L475VG_IOT01A") {
        "DISCO_L475VG_IOT".into()
    } else if variant.contains("MAPLE_MINI") {
        "BLUEPILL_F103C8".into()
    } else {
        variant
    }
}

fn official(ctx: &FrameworkContext<'_>, fw: &Path) -> Result<FrameworkSetup> {
    let variant = official_variant(&ctx.board.id);
    let series = ctx.mcu.series_port();
    let cmsis = fw.join("CMSIS").join("CMSIS");
    let drivers = fw.join("system").join("Drivers");
    let variant_dir = fw.join("variants").join(&variant);

    let mut setup = FrameworkSetup::default();
    let add = &mut setup.layer.add;

    if !ctx.requested_define("XSERIAL_DISABLED") {
        add.define_flag("HAL_UART_MODULE_ENABLED");
    }
    if ctx.requested_define("XSERIAL_ENABLED") {
        add.define_flag("HWSERIAL_NONE");
    }

    add.cflags.extend(["-std=gnu11", "-Dprintf=iprintf"].map(String::from));
    add.cxxflags.extend(["-std=gnu++14", "-fno-threadsafe-statics"].map(String::from));
    add.ccflags.extend(["-MMD", "--param", "max-inline-insns-single=500"].map(String::from));
    add.define_flag(series.as_str())
        .define("ARDUINO", 10805)
        .define_flag(format!("ARDUINO_{variant}"))
        .define_flag("ARDUINO_ARCH_STM32")
        .define("BOARD_NAME", format!("\"{variant}\""));

    let device: PathBuf = drivers.join("CMSIS/Device/ST").join(&series);
    add.cpppath.extend([
        fw.join("cores/arduino/avr"),
        fw.join("cores/arduino/stm32"),
        drivers.join(format!("{series}_HAL_Driver")).join("Inc"),
        drivers.join(format!("{series}_HAL_Driver")).join("Src"),
        fw.join("system").join(&series),
        variant_dir.join("usb"),
        fw.join("system/Middlewares/ST/STM32_USB_Device_Library/Core/Inc"),
        fw.join("system/Middlewares/ST/STM32_USB_Device_Library/Core/Src"),
        cmsis.join("Core/Include"),
        device.join("Include"),
        device.join("Source/Templates/gcc"),
        fw.join("cores/arduino"),
        variant_dir.clone(),
    ]);
    add.linkflags.extend(
        [
            "-Wl,--check-sections",
            "-Wl,--entry=Reset_Handler",
            "-Wl,--unresolved-symbols=report-all",
            "-Wl,--warn-common",
            "-Wl,--warn-section-align",
            "--specs=nano.specs",
        ]
        .map(String::from),
    );
    add.libs.extend(["c".to_string(), ctx.traits.dsp_library()]);
    add.libpath.extend([variant_dir.clone(), cmsis.join("Lib/GCC")]);

    let remove = &mut setup.layer.remove;
    remove.cppdefines.extend(
        ["STM32F1", "STM32F4", "STM32F40_41xxx", "STM32L053xx", "F_CPU"].map(String::from),
    );
    if ctx.requested_define("XSERIAL_DISABLED") {
        remove.cppdefines.push("HAL_UART_MODULE_ENABLED".into());
    }
    remove.linkflags.extend(["-nostartfiles", "-nostdlib"].map(String::from));
    remove.libs.push("nosys".into());

    let ldscript = ctx
        .board
        .build
        .arduino_ldscript
        .clone()
        .unwrap_or_else(|| "ldscript.ld".into());
    setup.linker = LinkerSource::Direct(variant_dir.join(ldscript));
    // Only boards that declare a variant ship variant sources.
    if ctx.board.build.variant.is_some() {
        setup
            .libraries
            .push(LibrarySpec::new("FrameworkArduinoVariant", variant_dir));
    }
    setup
        .libraries
        .push(LibrarySpec::new("FrameworkArduino", fw.join("cores/arduino")));
    setup.variant = Some(variant);
    Ok(setup)
}
