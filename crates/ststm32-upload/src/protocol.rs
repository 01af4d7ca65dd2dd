//! Upload protocols.

use std::fmt;

/// OpenOCD debug adapters that are flashed through `openocd` itself.
pub const OPENOCD_ADAPTERS: &[&str] = &[
    "cmsis-dap",
    "ftdi",
    "olimex-arm-usb-ocd",
    "olimex-arm-usb-ocd-h",
    "olimex-arm-usb-tiny-h",
    "olimex-jtag-tiny",
];

/// A way of getting a firmware image onto a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// ST serial bootloader through `stm32flash`.
    Serial,
    /// USB DFU bootloader through `dfu-util`.
    Dfu,
    /// ST-Link through `st-flash`.
    Stlink,
    /// An OpenOCD adapter, named as in `interface/<name>.cfg`.
    OpenOcd(&'static str),
    Jlink,
    /// Black Magic Probe through its built-in GDB server.
    Blackmagic,
    /// HID bootloader through `hid-flash`.
    Hid,
    /// Copy to the board's mass-storage volume.
    Mbed,
    /// GDB driven by the project's `upload.gdb`.
    Gdb,
    /// The project's own command.
    Custom,
}

impl Protocol {
    /// Look up a protocol by name. `None` for names no uploader handles.
    pub fn from_name(name: &str) -> Option<Protocol> {
        let protocol = match name {
            "serial" => Protocol::Serial,
            "dfu" => Protocol::Dfu,
            "stlink" => Protocol::Stlink,
            "jlink" => Protocol::Jlink,
            "blackmagic" => Protocol::Blackmagic,
            "hid" => Protocol::Hid,
            "mbed" => Protocol::Mbed,
            "gdb" => Protocol::Gdb,
            "custom" => Protocol::Custom,
            other => Protocol::OpenOcd(OPENOCD_ADAPTERS.iter().copied().find(|a| *a == other)?),
        };
        Some(protocol)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Serial => "serial",
            Protocol::Dfu => "dfu",
            Protocol::Stlink => "stlink",
            Protocol::OpenOcd(adapter) => adapter,
            Protocol::Jlink => "jlink",
            Protocol::Blackmagic => "blackmagic",
            Protocol::Hid => "hid",
            Protocol::Mbed => "mbed",
            Protocol::Gdb => "gdb",
            Protocol::Custom => "custom",
        }
    }

    /// Whether the protocol cannot run without an upload port.
    pub fn needs_port(&self) -> bool {
        matches!(
            self,
            Protocol::Serial | Protocol::Blackmagic | Protocol::Hid | Protocol::Mbed
        )
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
