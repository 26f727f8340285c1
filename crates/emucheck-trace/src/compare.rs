//! First-divergence detection between a reference and a candidate log.

use std::fmt;

use rayon::prelude::*;
use tracing::debug;

use crate::line::TraceLine;
use crate::log::{CandidateLog, ReferenceLog};

/// Default line count from which the mismatch search runs on the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 16;

/// How to treat logs of different lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthPolicy {
    /// Compare the common prefix only; extra lines on either side are ignored.
    #[default]
    Truncate,
    /// Report a [`LengthMismatch`] when the common prefix matches but lengths differ.
    Strict,
}

/// Configuration for trace comparison behavior.
#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub length_policy: LengthPolicy,
    /// Compared range length at which the search is split across threads.
    pub parallel_threshold: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            length_policy: LengthPolicy::Truncate,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl CompareConfig {
    #[must_use]
    pub const fn with_length_policy(mut self, policy: LengthPolicy) -> Self {
        self.length_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Always search sequentially.
    #[must_use]
    pub const fn serial(self) -> Self {
        self.with_parallel_threshold(usize::MAX)
    }
}

/// Instruction suspected of causing a divergence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspectOpcode {
    /// Mnemonic of the last instruction that executed correctly.
    Mnemonic(String),
    /// Divergence on the very first instruction.
    NoPriorInstruction,
}

impl SuspectOpcode {
    #[must_use]
    pub fn mnemonic(&self) -> Option<&str> {
        match self {
            Self::Mnemonic(m) => Some(m),
            Self::NoPriorInstruction => None,
        }
    }
}

impl fmt::Display for SuspectOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mnemonic(m) => f.write_str(m),
            Self::NoPriorInstruction => f.write_str("<no prior instruction>"),
        }
    }
}

/// Where and how the candidate first left the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivergenceReport {
    /// Execution index of the first mismatching instruction.
    pub index: usize,
    /// Reference program counter, padded.
    pub expected_pc: String,
    /// Candidate program counter, padded.
    pub actual_pc: String,
    pub suspect_opcode: SuspectOpcode,
    /// Raw reference line at `index - 1`, if any.
    pub previous_reference_line: Option<String>,
    /// Raw reference line at `index`.
    pub reference_line: String,
    /// Raw candidate line at `index`.
    pub candidate_line: String,
}

impl fmt::Display for DivergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "divergence at #{}: expected PC {}, logged {} (suspect opcode {})",
            self.index, self.expected_pc, self.actual_pc, self.suspect_opcode
        )
    }
}

/// Logs matched over their common prefix but have different lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub reference_len: usize,
    pub candidate_len: usize,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "length mismatch: reference has {} lines, candidate has {}",
            self.reference_len, self.candidate_len
        )
    }
}

/// Result of comparing two traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceComparison {
    /// Number of index-aligned lines inspected.
    pub compared: usize,
    /// First divergence, or `None` if the compared range matched.
    pub divergence: Option<DivergenceReport>,
    /// Set only under [`LengthPolicy::Strict`].
    pub length_mismatch: Option<LengthMismatch>,
}

impl TraceComparison {
    /// Whether the candidate agrees with the reference under the configured policy.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.divergence.is_none() && self.length_mismatch.is_none()
    }
}

fn pcs_differ(reference: &ReferenceLog, candidate: &CandidateLog, index: usize) -> bool {
    reference[index].padded_pc() != candidate[index].padded_pc()
}

/// Find the first index in `0..compared` where the program counters differ.
fn first_mismatch(
    reference: &ReferenceLog,
    candidate: &CandidateLog,
    compared: usize,
    config: &CompareConfig,
) -> Option<usize> {
    if compared >= config.parallel_threshold {
        debug!(compared, "searching for divergence in parallel");
        (0..compared)
            .into_par_iter()
            .find_first(|&i| pcs_differ(reference, candidate, i))
    } else {
        (0..compared).find(|&i| pcs_differ(reference, candidate, i))
    }
}

fn divergence_at(
    reference: &ReferenceLog,
    candidate: &CandidateLog,
    index: usize,
) -> DivergenceReport {
    let expected = &reference[index];
    let actual = &candidate[index];
    let previous = index.checked_sub(1).map(|i| &reference[i]);

    DivergenceReport {
        index,
        expected_pc: expected.padded_pc().into_owned(),
        actual_pc: actual.padded_pc().into_owned(),
        suspect_opcode: previous.map_or(SuspectOpcode::NoPriorInstruction, |line| {
            SuspectOpcode::Mnemonic(line.mnemonic().to_string())
        }),
        previous_reference_line: previous.map(|line| line.raw().to_string()),
        reference_line: expected.raw().to_string(),
        candidate_line: actual.raw().to_string(),
    }
}

/// Walk both logs in lockstep and report the first program counter mismatch.
///
/// Only the common prefix is inspected; what happens to the remainder is
/// governed by [`CompareConfig::length_policy`].
#[must_use]
pub fn compare_traces(
    reference: &ReferenceLog,
    candidate: &CandidateLog,
    config: &CompareConfig,
) -> TraceComparison {
    let compared = reference.len().min(candidate.len());

    if let Some(index) = first_mismatch(reference, candidate, compared, config) {
        return TraceComparison {
            compared: index + 1,
            divergence: Some(divergence_at(reference, candidate, index)),
            length_mismatch: None,
        };
    }

    let length_mismatch = (config.length_policy == LengthPolicy::Strict
        && reference.len() != candidate.len())
    .then_some(LengthMismatch {
        reference_len: reference.len(),
        candidate_len: candidate.len(),
    });

    TraceComparison {
        compared,
        divergence: None,
        length_mismatch,
    }
}
