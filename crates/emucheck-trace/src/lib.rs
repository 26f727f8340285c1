//! Trace divergence detection for emulator testing.
//!
//! Compares an emulator's per-instruction program counter log against a
//! trusted reference log and reports the first instruction where they
//! disagree, together with the last instruction known to have executed
//! correctly.
//!
//! # Example
//!
//! ```
//! use emucheck_trace::{CompareConfig, SuspectOpcode, compare_lines};
//!
//! let reference = [
//!     "0000  A9 01     LDA #$01",
//!     "0002  85 00     STA $00",
//!     "0005  00        BRK",
//! ];
//! let candidate = ["0000", "0002", "0099"];
//!
//! let result = compare_lines(&reference, &candidate, &CompareConfig::default())?;
//! let divergence = result.divergence.expect("logs diverge");
//! assert_eq!(divergence.index, 2);
//! assert_eq!(divergence.suspect_opcode, SuspectOpcode::Mnemonic("STA".into()));
//! # Ok::<(), emucheck_trace::TraceError>(())
//! ```

mod compare;
mod error;
mod line;
mod log;

pub use compare::{
    CompareConfig, DEFAULT_PARALLEL_THRESHOLD, DivergenceReport, LengthMismatch, LengthPolicy,
    SuspectOpcode, TraceComparison, compare_traces,
};
pub use error::{Result, TraceError, TraceSource};
pub use line::{
    CandidateLine, PC_WIDTH, REFERENCE_MNEMONIC_FIELD, REFERENCE_PC_FIELD, ReferenceLine,
    TraceLine, pad_pc,
};
pub use log::{CandidateLog, ReferenceLog, TraceLog};

/// Parse two in-memory logs and compare them.
///
/// # Errors
///
/// Fails if either log is empty or contains a malformed line.
pub fn compare_lines<R, C>(
    reference: &[R],
    candidate: &[C],
    config: &CompareConfig,
) -> Result<TraceComparison>
where
    R: AsRef<str>,
    C: AsRef<str>,
{
    let reference = ReferenceLog::parse(reference)?;
    let candidate = CandidateLog::parse(candidate)?;
    Ok(compare_traces(&reference, &candidate, config))
}

#[cfg(test)]
mod tests;
