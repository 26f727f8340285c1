//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use emucheck::LengthPolicy;
use emucheck::corpus::{DEFAULT_EXTENSION, DEFAULT_IMAGE_EXTENSION};
use emucheck::emulator::{DEFAULT_BUILD_COMMAND, DEFAULT_EMULATOR};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "emucheck")]
#[command(about = "Emulator verification - trace divergence detection and ROM regression runs")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the first instruction where an emulator trace leaves the reference
    Diff {
        /// Reference trace (nestest log format)
        #[arg(long, default_value = "nestest.log")]
        reference: PathBuf,

        /// Candidate trace (one program counter per line)
        #[arg(long, default_value = "emu.log")]
        candidate: PathBuf,

        /// How to treat logs of different lengths
        #[arg(long, value_enum, default_value = "truncate")]
        length_policy: LengthPolicyArg,

        /// Search for the divergence on a single thread
        #[arg(long)]
        serial: bool,
    },

    /// Build the emulator and run every ROM in the test corpus
    Test {
        /// Directory containing the test ROMs
        #[arg(long, default_value = "blargg")]
        corpus: PathBuf,

        /// Directory for screenshots
        #[arg(short, long, default_value = "screenshots")]
        output: PathBuf,

        /// ROM file extension
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,

        /// Screenshot file extension
        #[arg(long, default_value = DEFAULT_IMAGE_EXTENSION)]
        image_extension: String,

        /// Emulator binary
        #[arg(long, default_value = DEFAULT_EMULATOR)]
        emulator: PathBuf,

        /// Extra argument placed before the `test` subcommand (repeatable)
        #[arg(long = "emulator-arg", value_name = "ARG", allow_hyphen_values = true)]
        emulator_args: Vec<String>,

        /// Command that builds the emulator
        #[arg(long, default_value = DEFAULT_BUILD_COMMAND)]
        build_command: String,

        /// Skip the build step
        #[arg(long)]
        no_build: bool,

        /// Number of parallel emulator invocations (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Timeout per ROM in seconds (0 = none)
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// Seconds an in-flight ROM may keep running after Ctrl+C
        #[arg(long, default_value = "2")]
        grace: u64,

        /// Only run ROMs whose name contains this pattern
        #[arg(long)]
        filter: Option<String>,

        /// Do not print emulator output
        #[arg(long)]
        hide_output: bool,
    },
}

/// Length policy argument.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum LengthPolicyArg {
    /// Compare only the common prefix
    #[default]
    Truncate,
    /// Also report logs of different lengths
    Strict,
}

impl From<LengthPolicyArg> for LengthPolicy {
    fn from(arg: LengthPolicyArg) -> Self {
        match arg {
            LengthPolicyArg::Truncate => Self::Truncate,
            LengthPolicyArg::Strict => Self::Strict,
        }
    }
}
