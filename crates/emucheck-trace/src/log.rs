use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Index;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TraceError};
use crate::line::{CandidateLine, ReferenceLine, TraceLine};

/// Ordered, read-only sequence of trace lines in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLog<L> {
    lines: Vec<L>,
}

/// Log produced by the trusted reference emulator.
pub type ReferenceLog = TraceLog<ReferenceLine>;

/// Log produced by the emulator under test.
pub type CandidateLog = TraceLog<CandidateLine>;

impl<L: TraceLine> TraceLog<L> {
    /// Parse a log from in-memory lines.
    ///
    /// # Errors
    ///
    /// Fails with the first malformed line, or with
    /// [`TraceError::EmptyTrace`] if there are no lines at all.
    pub fn parse<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = lines
            .into_iter()
            .enumerate()
            .map(|(index, text)| L::parse(index, text.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_lines(lines)
    }

    /// Read and parse a log file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or contains a malformed line.
    pub fn load(path: &Path) -> Result<Self> {
        let io_error = |source| TraceError::Io {
            log: L::SOURCE,
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_error)?;
        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        // Byte-wise so a line that is not UTF-8 is reported by its index.
        for index in 0.. {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).map_err(io_error)? == 0 {
                break;
            }
            let bytes = buf.strip_suffix(b"\n").unwrap_or(&buf);
            let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
            let text =
                std::str::from_utf8(bytes).map_err(|e| TraceError::MalformedTraceLine {
                    line_index: index,
                    log: L::SOURCE,
                    reason: format!("not valid UTF-8: {e}"),
                })?;
            lines.push(L::parse(index, text)?);
        }

        debug!(log = %L::SOURCE, path = %path.display(), lines = lines.len(), "loaded trace");
        Self::from_lines(lines)
    }

    fn from_lines(lines: Vec<L>) -> Result<Self> {
        if lines.is_empty() {
            return Err(TraceError::EmptyTrace(L::SOURCE));
        }
        Ok(Self { lines })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false for a successfully constructed log.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<L> Index<usize> for TraceLog<L> {
    type Output = L;

    fn index(&self, index: usize) -> &L {
        &self.lines[index]
    }
}
