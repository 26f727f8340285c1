use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal errors that stop a command outright.
#[derive(Error, Debug)]
pub enum Error {
    #[error("trace error: {0}")]
    Trace(#[from] emucheck_trace::TraceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("build failed: `{command}`: {reason}")]
    BuildFailure { command: String, reason: String },
    #[error("emulator binary not found: {}", .0.display())]
    EmulatorNotFound(PathBuf),
    #[error("corpus directory not found: {}", .0.display())]
    CorpusNotFound(PathBuf),
    #[error("failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid build command: {0}")]
    InvalidBuildCommand(String),
    #[error("thread pool setup failed: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A corpus file whose name carries no usable ordering prefix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {reason}")]
pub struct CorpusNamingError {
    pub path: PathBuf,
    pub name: String,
    pub reason: String,
}

/// Why a single emulator invocation did not pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationFailure {
    #[error("exit={}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Exit { code: Option<i32> },
    #[error("no output image at {}", .path.display())]
    MissingImage { path: PathBuf },
    #[error("timeout after {}s", .after.as_secs_f64())]
    TimedOut { after: Duration },
    #[error("cannot remove stale image {}: {reason}", .path.display())]
    StaleImage { path: PathBuf, reason: String },
    #[error("launch failed: {reason}")]
    Launch { reason: String },
    #[error("cancelled")]
    Cancelled,
}
