//! Linker script lookup and synthesis for ST STM32 targets.
//!
//! A linker script is resolved through a prioritized chain:
//!
//! 1. an explicit per-board override,
//! 2. a precompiled vendor script matching the MCU,
//! 3. a script rendered from a template and persisted to a cache directory.
//!
//! The result is a tagged [`LinkerOutcome`] so callers can tell a weaker
//! fallback from a failure.

pub mod error;
pub mod merge;
pub mod provider;
pub mod template;

pub use error::{LinkerError, Result};
pub use merge::merge_includes;
pub use provider::{LinkerOutcome, LinkerRequest, LinkerScriptProvider};
pub use template::LinkerTemplate;
