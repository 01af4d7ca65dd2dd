//! Upload errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent an upload command from being built or run.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload protocol '{protocol}' needs an upload port and none was given")]
    MissingPort { protocol: String },

    #[error("GDB upload needs the upload commands in {}", path.display())]
    MissingGdbScript { path: PathBuf },

    #[error("board '{board}': {detail}")]
    MissingDebugConfig { board: String, detail: String },

    #[error("'{command}' exited with {status}")]
    CommandFailed { command: String, status: std::process::ExitStatus },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;
