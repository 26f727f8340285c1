//! Child process execution with captured output, timeout and cancellation.

use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::InvocationFailure;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Limits applied while waiting on a child.
#[derive(Debug, Clone, Copy)]
pub struct WaitLimits {
    /// Kill the child after this long.
    pub timeout: Option<Duration>,
    /// How long an in-flight child may keep running after cancellation.
    pub grace: Duration,
}

/// A finished child process.
#[derive(Debug)]
pub struct CapturedRun {
    pub status: ExitStatus,
    /// Interleaved stdout and stderr.
    pub output: String,
    pub elapsed: Duration,
}

/// Outcome of a run that did not produce an exit status we can judge.
#[derive(Debug)]
pub struct Aborted {
    pub failure: InvocationFailure,
    /// Whatever the child wrote before it was stopped.
    pub output: String,
    pub elapsed: Duration,
}

/// Run `cmd` to completion with stdout and stderr captured together.
///
/// Output goes to an anonymous temp file rather than a pipe so a chatty
/// child can never block on a full buffer while we poll it.
///
/// # Errors
///
/// Returns [`Aborted`] if the child could not be spawned, timed out, or was
/// killed after cancellation.
pub fn run_captured(
    cmd: &mut Command,
    limits: WaitLimits,
    cancel: &CancelToken,
) -> Result<CapturedRun, Aborted> {
    let start = Instant::now();
    let launch_failed = |e: std::io::Error| Aborted {
        failure: InvocationFailure::Launch {
            reason: e.to_string(),
        },
        output: String::new(),
        elapsed: start.elapsed(),
    };

    let mut capture = tempfile::tempfile().map_err(launch_failed)?;
    let stdout = capture.try_clone().map_err(launch_failed)?;
    let stderr = capture.try_clone().map_err(launch_failed)?;

    // Own process group, so a terminal Ctrl+C reaches us but not the child;
    // the grace period then decides when the child stops.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(launch_failed)?;

    let mut cancelled_at: Option<Instant> = None;
    let outcome = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                break Err(InvocationFailure::Launch {
                    reason: format!("wait failed: {e}"),
                });
            }
        }

        if let Some(timeout) = limits.timeout
            && start.elapsed() >= timeout
        {
            let _ = child.kill();
            let _ = child.wait();
            break Err(InvocationFailure::TimedOut { after: timeout });
        }

        if cancel.is_cancelled() {
            let since = *cancelled_at.get_or_insert_with(Instant::now);
            if since.elapsed() >= limits.grace {
                debug!(pid = child.id(), "killing child after cancellation");
                let _ = child.kill();
                let _ = child.wait();
                break Err(InvocationFailure::Cancelled);
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    // Killed by a signal while the run was being cancelled.
    let outcome = match outcome {
        Ok(status) if status.code().is_none() && cancel.is_cancelled() => {
            Err(InvocationFailure::Cancelled)
        }
        other => other,
    };

    let elapsed = start.elapsed();
    let output = read_capture(&mut capture);

    match outcome {
        Ok(status) => Ok(CapturedRun {
            status,
            output,
            elapsed,
        }),
        Err(failure) => Err(Aborted {
            failure,
            output,
            elapsed,
        }),
    }
}

fn read_capture(capture: &mut std::fs::File) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = capture
        .seek(SeekFrom::Start(0))
        .and_then(|_| capture.read_to_end(&mut bytes))
    {
        debug!("failed to read captured output: {e}");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
