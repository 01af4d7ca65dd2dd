//! Error types for board manifest operations.

use std::path::PathBuf;

/// Errors that can occur while loading or interpreting board manifests.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing manifest files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest file not found.
    #[error("board manifest not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// No board with this id exists in the catalog.
    #[error("unknown board '{id}'")]
    UnknownBoard {
        /// The (normalized) board id.
        id: String,
    },

    /// The MCU part number cannot be parsed.
    #[error("invalid MCU part number '{mcu}': {detail}")]
    InvalidMcu {
        /// The offending part number.
        mcu: String,
        /// What is wrong with it.
        detail: String,
    },

    /// Unrecognized framework name.
    #[error("unknown framework '{name}'")]
    UnknownFramework {
        /// The name as given.
        name: String,
    },

    /// Validation error in a board definition.
    #[error("validation error: {detail}")]
    Validation {
        /// Description of the validation failure.
        detail: String,
    },
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
