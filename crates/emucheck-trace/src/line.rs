//! Per-instruction trace records.
//!
//! Reference logs use the fixed-column nestest layout:
//!
//! ```text
//! C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD
//! ^^^^            ^^^
//! pc              mnemonic
//! ```
//!
//! Candidate logs carry one program counter token per line.

use std::borrow::Cow;
use std::ops::Range;

use crate::error::{Result, TraceError, TraceSource};

/// Width that program counters are left-padded to before comparison.
pub const PC_WIDTH: usize = 4;

/// Byte range of the program counter in a reference line.
pub const REFERENCE_PC_FIELD: Range<usize> = 0..4;

/// Byte range of the opcode mnemonic in a reference line.
pub const REFERENCE_MNEMONIC_FIELD: Range<usize> = 16..19;

/// Left-pad a program counter field with `'0'` to [`PC_WIDTH`].
///
/// Fields already at or beyond the width are returned unchanged.
#[must_use]
pub fn pad_pc(field: &str) -> Cow<'_, str> {
    if field.chars().count() >= PC_WIDTH {
        Cow::Borrowed(field)
    } else {
        Cow::Owned(format!("{field:0>width$}", width = PC_WIDTH))
    }
}

/// A single parsed trace line.
pub trait TraceLine: Sized + Send + Sync {
    /// Log kind this line belongs to.
    const SOURCE: TraceSource;

    /// Parse the line at `index` of its log.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::MalformedTraceLine`] if the required fields
    /// cannot be extracted.
    fn parse(index: usize, text: &str) -> Result<Self>;

    /// Full line as logged.
    fn raw(&self) -> &str;

    /// Program counter field, unpadded.
    fn pc(&self) -> &str;

    /// Program counter padded for comparison.
    fn padded_pc(&self) -> Cow<'_, str> {
        pad_pc(self.pc())
    }
}

/// Line of the trusted reference log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLine {
    raw: String,
    pc: String,
    mnemonic: String,
}

impl ReferenceLine {
    /// Opcode mnemonic of the executed instruction (e.g. `"STA"`).
    #[must_use]
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }
}

fn field<'a>(index: usize, text: &'a str, range: Range<usize>, name: &str) -> Result<&'a str> {
    text.get(range.clone())
        .ok_or_else(|| TraceError::MalformedTraceLine {
            line_index: index,
            log: TraceSource::Reference,
            reason: if text.len() < range.end {
                format!(
                    "{} bytes long, {name} field needs bytes {}..{}",
                    text.len(),
                    range.start,
                    range.end
                )
            } else {
                format!("{name} field {}..{} splits a character", range.start, range.end)
            },
        })
}

impl TraceLine for ReferenceLine {
    const SOURCE: TraceSource = TraceSource::Reference;

    fn parse(index: usize, text: &str) -> Result<Self> {
        let pc = field(index, text, REFERENCE_PC_FIELD, "pc")?;
        let mnemonic = field(index, text, REFERENCE_MNEMONIC_FIELD, "mnemonic")?;
        Ok(Self {
            raw: text.to_string(),
            pc: pc.to_string(),
            mnemonic: mnemonic.to_string(),
        })
    }

    fn raw(&self) -> &str {
        &self.raw
    }

    fn pc(&self) -> &str {
        &self.pc
    }
}

/// Line of the log produced by the emulator under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLine {
    raw: String,
    pc: String,
}

impl TraceLine for CandidateLine {
    const SOURCE: TraceSource = TraceSource::Candidate;

    fn parse(index: usize, text: &str) -> Result<Self> {
        let pc = text.trim().to_uppercase();
        if pc.is_empty() {
            return Err(TraceError::MalformedTraceLine {
                line_index: index,
                log: TraceSource::Candidate,
                reason: "no program counter token".to_string(),
            });
        }
        Ok(Self {
            raw: text.to_string(),
            pc,
        })
    }

    fn raw(&self) -> &str {
        &self.raw
    }

    fn pc(&self) -> &str {
        &self.pc
    }
}
