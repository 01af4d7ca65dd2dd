//! Board manifests and MCU part-number model for ST STM32 targets.
//!
//! A board is described by a `.board.toml` manifest which is loaded into a
//! typed [`BoardDescriptor`]. The MCU part number of a board is parsed into an
//! [`McuPart`] and classified against an ordered family table to obtain its
//! core tier and floating-point unit.

pub mod builtin;
pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod framework;
pub mod mcu;
pub mod parse;

pub use catalog::{canonical_board_id, BoardCatalog};
pub use descriptor::{BoardDescriptor, BuildSection, DebugSection, UploadSection};
pub use error::{BoardError, Result};
pub use framework::Framework;
pub use mcu::{classify, CoreTier, FamilyTraits, Fpu, McuPart};
