//! Upload and debug-probe command selection for ST STM32 boards.
//!
//! [`select_uploader`] turns an upload protocol, a board and the paths of a
//! finished build into an [`UploadPlan`]: the command to run (or the file
//! copy to perform) plus any warnings raised while choosing it.
//! [`debug_tools`] derives the GDB server definitions for the probes a board
//! can be flashed with.

pub mod debug;
pub mod error;
pub mod protocol;
pub mod uploader;

pub use debug::{debug_tools, DebugTool, GdbServer};
pub use error::{Result, UploadError};
pub use protocol::Protocol;
pub use uploader::{select_uploader, GeneratedFile, UploadAction, UploadContext, UploadPlan};
