//! Error types for makefile scraping.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("cannot read makefile {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
