//! Trace diff command.

use std::path::Path;

use emucheck::{CompareConfig, LengthPolicy, TraceComparison};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

pub struct DiffArgs<'a> {
    pub reference: &'a Path,
    pub candidate: &'a Path,
    pub length_policy: LengthPolicy,
    pub serial: bool,
    pub silent: bool,
}

/// Handle the `diff` command.
pub fn cmd_diff(args: &DiffArgs<'_>) -> i32 {
    let mut config = CompareConfig::default().with_length_policy(args.length_policy);
    if args.serial {
        config = config.serial();
    }

    let comparison = match emucheck::diff_files(args.reference, args.candidate, &config) {
        Ok(c) => c,
        Err(e) => {
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };

    if comparison.is_match() {
        if !args.silent {
            terminal::success(&format!(
                "traces match over {} instructions",
                comparison.compared
            ));
        }
        EXIT_SUCCESS
    } else {
        print_mismatch(&comparison);
        EXIT_FAILURE
    }
}

fn print_mismatch(comparison: &TraceComparison) {
    if let Some(divergence) = &comparison.divergence {
        println!("{divergence}");
        if let Some(previous) = &divergence.previous_reference_line {
            terminal::dim(&format!("last good #{}: {previous}", divergence.index - 1));
        }
        terminal::dim(&format!(
            "reference #{}: {}",
            divergence.index, divergence.reference_line
        ));
        terminal::dim(&format!(
            "candidate #{}: {}",
            divergence.index, divergence.candidate_line
        ));
    }
    if let Some(mismatch) = &comparison.length_mismatch {
        println!("{mismatch}");
    }
}
