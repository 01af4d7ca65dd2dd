//! Error types for linker script resolution.

use std::path::PathBuf;

/// Errors that can occur while resolving or generating a linker script.
#[derive(Debug, thiserror::Error)]
pub enum LinkerError {
    /// No script could be resolved and none could be synthesized.
    #[error("no linker script for MCU '{mcu}': {reason}")]
    NotFound {
        /// Canonical MCU part number.
        mcu: String,
        /// Why every provider declined.
        reason: String,
    },

    /// A template references a placeholder with no value.
    #[error("linker template has no value for placeholder '${name}'")]
    MissingPlaceholder {
        /// Placeholder name.
        name: String,
    },

    /// A `$` in a template that starts no valid placeholder.
    #[error("invalid placeholder in linker template at byte {offset}")]
    InvalidPlaceholder {
        /// Byte offset of the `$`.
        offset: usize,
    },

    /// RAM that does not fit the 32-bit address space above the SRAM origin.
    #[error("RAM size of {ram_bytes} bytes overflows the address space")]
    RamOverflow {
        /// Requested RAM size.
        ram_bytes: u64,
    },

    /// An `INCLUDE` chain that never terminates.
    #[error("linker script {} nests INCLUDE directives deeper than {depth} levels", path.display())]
    IncludeDepth {
        /// Script being merged.
        path: PathBuf,
        /// Depth limit.
        depth: usize,
    },

    /// Invalid glob pattern built from a search directory.
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// I/O error reading or writing scripts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for linker script operations.
pub type Result<T> = std::result::Result<T, LinkerError>;
