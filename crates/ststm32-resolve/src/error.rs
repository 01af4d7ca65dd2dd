//! Resolution errors.

use std::path::PathBuf;

use ststm32_board::{BoardError, Framework};
use ststm32_ldscript::LinkerError;
use ststm32_mkscrape::ScrapeError;
use thiserror::Error;

/// Errors that stop a build configuration from being resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("board '{board}' uses MCU '{mcu}' which is not a supported STM32 family")]
    UnknownMcu { board: String, mcu: String },

    #[error("board '{board}' does not support framework '{framework}'")]
    UnsupportedFramework { board: String, framework: Framework },

    #[error("framework '{framework}' has no variant for board '{board}' (MCU '{mcu}')")]
    NoVariant {
        board: String,
        framework: Framework,
        mcu: String,
    },

    #[error("no startup file for MCU '{mcu}' in {}", dir.display())]
    MissingStartupFile { mcu: String, dir: PathBuf },

    #[error("framework package '{package}' is not installed (expected at {})", path.display())]
    MissingPackage { package: String, path: PathBuf },

    #[error("no package directory configured for framework '{package}'")]
    UnconfiguredPackage { package: String },

    #[error("cannot configure the HAL: template {} does not exist", path.display())]
    MissingHalConfTemplate { path: PathBuf },

    #[error("ChibiOS has no board matching '{board}'")]
    UnknownChibiosBoard { board: String },

    #[error("library '{name}' already registered from {}, cannot register it from {}", existing.display(), requested.display())]
    LibraryCollision {
        name: String,
        existing: PathBuf,
        requested: PathBuf,
    },

    #[error("invalid source filter '{filter}': {detail}")]
    InvalidFilter { filter: String, detail: String },

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Linker(#[from] LinkerError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for resolution.
pub type Result<T> = std::result::Result<T, ResolveError>;
