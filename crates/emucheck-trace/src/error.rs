use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which side of a comparison a log came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceSource {
    /// Golden log produced by the trusted emulator.
    Reference,
    /// Log produced by the emulator under test.
    Candidate,
}

impl TraceSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Candidate => "candidate",
        }
    }
}

impl fmt::Display for TraceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trace loading and comparison errors.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read {log} trace {}: {source}", .path.display())]
    Io {
        log: TraceSource,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {log} trace line #{line_index}: {reason}")]
    MalformedTraceLine {
        line_index: usize,
        log: TraceSource,
        reason: String,
    },
    #[error("{0} trace is empty")]
    EmptyTrace(TraceSource),
}

impl TraceError {
    /// Index of the offending line, if this error points at one.
    #[must_use]
    pub const fn line_index(&self) -> Option<usize> {
        match self {
            Self::MalformedTraceLine { line_index, .. } => Some(*line_index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
