//! Built-in board definitions.
//!
//! Manifests found on disk shadow these by id.

use crate::descriptor::{BoardDescriptor, BuildSection, DebugSection, UploadSection};
use crate::framework::Framework;

const ALL_FRAMEWORKS: &[Framework] = &[
    Framework::Arduino,
    Framework::Cmsis,
    Framework::Spl,
    Framework::Stm32cube,
    Framework::Chibios,
    Framework::Mbed,
    Framework::Zephyr,
];

const NUCLEO_PROTOCOLS: &[&str] = &["stlink", "jlink", "cmsis-dap", "blackmagic", "mbed"];

#[allow(clippy::too_many_arguments)]
fn board(
    id: &str,
    name: &str,
    mcu: &str,
    cpu: &str,
    f_cpu: u64,
    ram: u64,
    flash: u64,
    extra_flags: &[&str],
) -> BoardDescriptor {
    BoardDescriptor {
        id: id.into(),
        name: name.into(),
        vendor: "ST".into(),
        url: None,
        frameworks: ALL_FRAMEWORKS.to_vec(),
        build: BuildSection {
            mcu: mcu.into(),
            cpu: cpu.into(),
            f_cpu,
            core: None,
            variant: Some(mcu[..11].to_string()),
            ldscript: None,
            startup_file: None,
            extra_flags: extra_flags.iter().map(|f| f.to_string()).collect(),
            vec_tab_addr: None,
            zephyr_board: None,
            arduino_ldscript: None,
        },
        upload: UploadSection {
            maximum_size: flash,
            maximum_ram_size: ram,
            protocol: Some("stlink".into()),
            protocols: NUCLEO_PROTOCOLS.iter().map(|p| p.to_string()).collect(),
            offset_address: None,
            hwids: Vec::new(),
            disk_label: None,
            speed: None,
        },
        debug: DebugSection::default(),
    }
}

/// "BluePill F103C8": the generic STM32F103C8 development board.
pub fn bluepill_f103c8() -> BoardDescriptor {
    let mut b = board(
        "bluepill_f103c8",
        "BluePill F103C8",
        "stm32f103c8t6",
        "cortex-m3",
        72_000_000,
        20 * 1024,
        64 * 1024,
        &["-DSTM32F1", "-DSTM32F103x8"],
    );
    b.vendor = "Generic".into();
    b.upload.protocols = ["stlink", "dfu", "jlink", "serial", "blackmagic", "cmsis-dap"]
        .iter()
        .map(|p| p.to_string())
        .collect();
    b.upload.hwids = vec![
        ["0x1EAF".into(), "0x0003".into()],
        ["0x1EAF".into(), "0x0004".into()],
    ];
    b.debug.jlink_device = Some("STM32F103C8".into());
    b.debug.openocd_target = Some("stm32f1x".into());
    b.frameworks.retain(|fw| *fw != Framework::Mbed);
    b
}

/// "Maple Mini" with the DFU bootloader (LeafLabs).
pub fn maple_mini() -> BoardDescriptor {
    let mut b = board(
        "maple_mini",
        "Maple Mini",
        "stm32f103cbt6",
        "cortex-m3",
        72_000_000,
        20 * 1024,
        108 * 1024,
        &["-DSTM32F1", "-DSTM32F103xB"],
    );
    b.vendor = "LeafLabs".into();
    b.frameworks = vec![Framework::Arduino];
    b.build.core = Some("maple".into());
    b.build.variant = Some("maple_mini".into());
    b.upload.protocol = Some("dfu".into());
    b.upload.protocols = vec!["dfu".into(), "stlink".into(), "serial".into()];
    b.upload.hwids = vec![["0x1EAF".into(), "0x0003".into()]];
    b.debug.openocd_target = Some("stm32f1x".into());
    b
}

/// "ST Nucleo F030R8".
pub fn nucleo_f030r8() -> BoardDescriptor {
    let mut b = board(
        "nucleo_f030r8",
        "ST Nucleo F030R8",
        "stm32f030r8t6",
        "cortex-m0",
        48_000_000,
        8 * 1024,
        64 * 1024,
        &["-DSTM32F0", "-DSTM32F030x8"],
    );
    b.upload.disk_label = Some("NODE_F030R8".into());
    b.debug.jlink_device = Some("STM32F030R8".into());
    b.debug.openocd_board = Some("st_nucleo_f0".into());
    b.debug.onboard_tools = vec!["stlink".into()];
    b.debug.default_tools = vec!["stlink".into()];
    b
}

/// "ST Nucleo F401RE".
pub fn nucleo_f401re() -> BoardDescriptor {
    let mut b = board(
        "nucleo_f401re",
        "ST Nucleo F401RE",
        "stm32f401ret6",
        "cortex-m4",
        84_000_000,
        96 * 1024,
        512 * 1024,
        &["-DSTM32F4", "-DSTM32F401xE"],
    );
    b.upload.disk_label = Some("NODE_F401RE".into());
    b.debug.jlink_device = Some("STM32F401RE".into());
    b.debug.openocd_board = Some("st_nucleo_f4".into());
    b.debug.onboard_tools = vec!["stlink".into()];
    b.debug.default_tools = vec!["stlink".into()];
    b
}

/// "ST STM32F4DISCOVERY".
pub fn disco_f407vg() -> BoardDescriptor {
    let mut b = board(
        "disco_f407vg",
        "ST STM32F4DISCOVERY",
        "stm32f407vgt6",
        "cortex-m4",
        168_000_000,
        128 * 1024,
        1024 * 1024,
        &["-DSTM32F4", "-DSTM32F407xx", "-DSTM32F40_41xxx"],
    );
    b.debug.jlink_device = Some("STM32F407VG".into());
    b.debug.openocd_board = Some("stm32f4discovery".into());
    b.debug.onboard_tools = vec!["stlink".into()];
    b.debug.default_tools = vec!["stlink".into()];
    b
}

/// "ST Nucleo L476RG".
pub fn nucleo_l476rg() -> BoardDescriptor {
    let mut b = board(
        "nucleo_l476rg",
        "ST Nucleo L476RG",
        "stm32l476rgt6",
        "cortex-m4",
        80_000_000,
        128 * 1024,
        1024 * 1024,
        &["-DSTM32L4", "-DSTM32L476xx"],
    );
    b.upload.disk_label = Some("NODE_L476RG".into());
    b.debug.jlink_device = Some("STM32L476RG".into());
    b.debug.openocd_board = Some("st_nucleo_l4".into());
    b.debug.onboard_tools = vec!["stlink".into()];
    b.debug.default_tools = vec!["stlink".into()];
    b
}

/// "ST Nucleo H743ZI".
pub fn nucleo_h743zi() -> BoardDescriptor {
    let mut b = board(
        "nucleo_h743zi",
        "ST Nucleo H743ZI",
        "stm32h743zit6",
        "cortex-m7",
        400_000_000,
        512 * 1024,
        2048 * 1024,
        &["-DSTM32H7", "-DSTM32H743xx"],
    );
    b.frameworks = vec![Framework::Arduino, Framework::Stm32cube, Framework::Zephyr];
    b.debug.jlink_device = Some("STM32H743ZI".into());
    b.debug.openocd_target = Some("stm32h7x".into());
    b.debug.onboard_tools = vec!["stlink".into()];
    b.debug.default_tools = vec!["stlink".into()];
    b
}

/// "ST B-L475E-IOT01A Discovery kit".
pub fn disco_l475vg_iot01a() -> BoardDescriptor {
    let mut b = board(
        "disco_l475vg_iot01a",
        "ST B-L475E-IOT01A Discovery kit",
        "stm32l475vgt6",
        "cortex-m4",
        80_000_000,
        96 * 1024,
        1024 * 1024,
        &["-DSTM32L4", "-DSTM32L475xx"],
    );
    b.frameworks = vec![Framework::Arduino, Framework::Mbed, Framework::Stm32cube, Framework::Zephyr];
    b.debug.jlink_device = Some("STM32L475VG".into());
    b.debug.openocd_board = Some("stm32l4discovery".into());
    b.debug.onboard_tools = vec!["stlink".into()];
    b.debug.default_tools = vec!["stlink".into()];
    b
}

/// All built-in boards.
pub fn all() -> Vec<BoardDescriptor> {
    vec![
        bluepill_f103c8(),
        maple_mini(),
        nucleo_f030r8(),
        nucleo_f401re(),
        disco_f407vg(),
        nucleo_l476rg(),
        nucleo_h743zi(),
        disco_l475vg_iot01a(),
    ]
}
