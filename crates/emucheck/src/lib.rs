//! Emulator verification tooling.
//!
//! Two checks for an in-development emulator:
//!
//! - **Trace diff**: compare the emulator's program counter log against a
//!   trusted reference log and report the first divergence (see
//!   [`diff_files`] and the re-exported [`emucheck_trace`] types).
//! - **Regression run**: build the emulator, run every test ROM in a corpus
//!   in numeric order and collect pass/fail results (see
//!   [`regression::run_regression`]).

pub mod cancel;
pub mod corpus;
pub mod emulator;
mod error;
pub mod metrics;
pub mod process;
pub mod regression;

use std::path::Path;

use tracing::{debug, info_span};

pub use emucheck_trace::{
    CandidateLog, CompareConfig, DivergenceReport, LengthMismatch, LengthPolicy, ReferenceLog,
    SuspectOpcode, TraceComparison, TraceError, TraceSource, compare_traces,
};
pub use error::{CorpusNamingError, Error, InvocationFailure, Result};

pub use cancel::CancelToken;
pub use emulator::{BuildCommand, Emulator};
pub use regression::{
    EntryResult, EntryStatus, RegressionConfig, RegressionReport, RegressionSummary,
    run_regression,
};

/// Load a reference and a candidate trace from disk and compare them.
///
/// # Errors
///
/// Fails if either file cannot be read, is empty, or contains a malformed
/// line. A divergence is not an error; it is reported in the result.
pub fn diff_files(
    reference: &Path,
    candidate: &Path,
    config: &CompareConfig,
) -> Result<TraceComparison> {
    let _span = info_span!("diff").entered();

    let reference = ReferenceLog::load(reference)?;
    let candidate = CandidateLog::load(candidate)?;
    let comparison = compare_traces(&reference, &candidate, config);

    debug!(
        compared = comparison.compared,
        diverged = comparison.divergence.is_some(),
        "trace comparison finished"
    );
    metrics::record_trace_comparison(
        comparison.compared,
        comparison.divergence.as_ref().map(|d| d.index),
    );
    Ok(comparison)
}
