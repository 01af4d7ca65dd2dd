//! Source and include list extraction from ChibiOS makefiles.
//!
//! ChibiOS describes each component with a makefile fragment declaring
//! `<PREFIX>SRC`, `<PREFIX>ASM` and `<PREFIX>INC` variables whose values are
//! `$(CHIBIOS)/os/...` paths. This crate reads those blocks and maps the paths
//! onto a local framework checkout, without running `make`.

pub mod error;
pub mod scrape;

pub use error::{Result, ScrapeError};
pub use scrape::{extract, extract_from_str, included_makefiles, Kind};
