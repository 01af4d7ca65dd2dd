//! Build configuration resolution for ST STM32 boards.
//!
//! Given a board descriptor, a framework and the user's build flags,
//! [`resolve`] produces a [`ResolvedBuildConfig`]: ordered compiler and
//! linker flags, include paths, defines, the linker script, the startup file
//! and the library units to compile. Resolution runs as a fixed pipeline:
//!
//! 1. framework support check and MCU classification,
//! 2. per-framework configuration,
//! 3. flag layering (toolchain defaults, framework, board, user),
//! 4. linker script resolution,
//! 5. library registration.
//!
//! Nothing is compiled and no global state is touched; every stage reads and
//! returns explicit values.

pub mod config;
pub mod error;
pub mod flags;
pub mod frameworks;
pub mod library;
pub mod packages;
pub mod resolver;
pub mod startup;

pub use config::{ResolvedBuildConfig, UploadDefaults};
pub use error::{ResolveError, Result};
pub use flags::{merge_layers, BuildFlags, FlagLayer, FlagRemovals};
pub use library::{LibraryHandle, LibrarySet, LibraryUnit, SourceFilter};
pub use packages::PackageDirs;
pub use resolver::{resolve, toolchain_defaults, UserOptions};
pub use startup::{find_startup_file, STARTUP_FILE_EXCEPTIONS};
