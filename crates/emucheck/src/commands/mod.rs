//! Command implementations.
//!
//! Each submodule handles one CLI command.

mod diff;

use std::time::Duration;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Diff { .. } => handle_diff(cli),
        Commands::Test { .. } => handle_test(cli),
    }
}

fn handle_diff(cli: &Cli) -> i32 {
    let Commands::Diff {
        reference,
        candidate,
        length_policy,
        serial,
    } = &cli.command
    else {
        unreachable!("diff command variant mismatch");
    };

    diff::cmd_diff(&diff::DiffArgs {
        reference,
        candidate,
        length_policy: (*length_policy).into(),
        serial: *serial,
        silent: cli.silent,
    })
}

fn handle_test(cli: &Cli) -> i32 {
    let Commands::Test {
        corpus,
        output,
        extension,
        image_extension,
        emulator,
        emulator_args,
        build_command,
        no_build,
        jobs,
        timeout,
        grace,
        filter,
        hide_output,
    } = &cli.command
    else {
        unreachable!("test command variant mismatch");
    };

    test::cmd_test(&test::TestArgs {
        corpus,
        output,
        extension,
        image_extension,
        emulator,
        emulator_args,
        build_command: (!*no_build).then_some(build_command.as_str()),
        jobs: *jobs,
        timeout: (*timeout > 0).then(|| Duration::from_secs(*timeout)),
        grace: Duration::from_secs(*grace),
        filter: filter.as_deref(),
        hide_output: *hide_output,
        silent: cli.silent,
    })
}
