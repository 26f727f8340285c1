//! ROM corpus regression runner.
//!
//! Builds the emulator, runs every corpus ROM through its `test`
//! subcommand and reports pass/fail/cancelled results in corpus order.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::cancel::CancelToken;
use crate::corpus::{self, Corpus, CorpusEntry, CorpusLayout};
use crate::emulator::{self, BuildCommand, Emulator};
use crate::error::{CorpusNamingError, Error, InvocationFailure, Result};
use crate::process::{self, Aborted, WaitLimits};

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time an in-flight invocation may keep running after cancellation.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Entry result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pass,
    Fail,
    Cancelled,
}

/// Result of running a single corpus entry.
#[derive(Debug, Clone)]
pub struct EntryResult {
    /// ROM file name (e.g., "01-basics.nes").
    pub name: String,
    pub sort_key: u64,
    pub rom: PathBuf,
    pub image: PathBuf,
    pub status: EntryStatus,
    /// Why the entry did not pass.
    pub failure: Option<InvocationFailure>,
    /// Combined stdout/stderr of the emulator.
    pub output: String,
    /// Wall-clock time, if the emulator was started.
    pub elapsed: Option<Duration>,
}

impl EntryResult {
    fn new(entry: &CorpusEntry, status: EntryStatus) -> Self {
        Self {
            name: entry.name.clone(),
            sort_key: entry.sort_key,
            rom: entry.path.clone(),
            image: entry.output_image_path.clone(),
            status,
            failure: None,
            output: String::new(),
            elapsed: None,
        }
    }

    /// Create a passing result.
    pub fn pass(entry: &CorpusEntry, output: String, elapsed: Duration) -> Self {
        Self {
            output,
            elapsed: Some(elapsed),
            ..Self::new(entry, EntryStatus::Pass)
        }
    }

    /// Create a failing result.
    pub fn fail(
        entry: &CorpusEntry,
        failure: InvocationFailure,
        output: String,
        elapsed: Option<Duration>,
    ) -> Self {
        let status = if failure == InvocationFailure::Cancelled {
            EntryStatus::Cancelled
        } else {
            EntryStatus::Fail
        };
        Self {
            failure: Some(failure),
            output,
            elapsed,
            ..Self::new(entry, status)
        }
    }

    /// Create a result for an entry that was never started.
    pub fn cancelled(entry: &CorpusEntry) -> Self {
        Self::fail(entry, InvocationFailure::Cancelled, String::new(), None)
    }

    fn aborted(entry: &CorpusEntry, aborted: Aborted) -> Self {
        Self::fail(
            entry,
            aborted.failure,
            aborted.output,
            Some(aborted.elapsed),
        )
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == EntryStatus::Pass
    }
}

/// Summary of a regression run.
#[derive(Debug, Clone, Default)]
pub struct RegressionSummary {
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Corpus files excluded for having no ordering prefix.
    pub rejected: usize,
    /// Failed and cancelled entries, in corpus order.
    pub failures: Vec<EntryResult>,
}

impl RegressionSummary {
    /// Total number of corpus files considered, including rejected ones.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.cancelled + self.rejected
    }

    /// Whether every corpus file ran and passed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && self.rejected == 0
    }

    /// Add a result to the summary.
    pub fn add(&mut self, result: EntryResult) {
        crate::metrics::record_entry(&result);

        match result.status {
            EntryStatus::Pass => self.passed += 1,
            EntryStatus::Fail => {
                self.failed += 1;
                self.failures.push(result);
            }
            EntryStatus::Cancelled => {
                self.cancelled += 1;
                self.failures.push(result);
            }
        }
    }

    /// Record summary totals to metrics.
    pub fn record_metrics(&self) {
        crate::metrics::record_summary(
            self.passed as u64,
            self.failed as u64,
            self.cancelled as u64,
            self.rejected as u64,
        );
    }
}

/// Configuration for a regression run.
#[derive(Debug, Clone)]
pub struct RegressionConfig {
    pub layout: CorpusLayout,
    pub emulator: Emulator,
    /// Build step; `None` skips it.
    pub build: Option<BuildCommand>,
    /// Worker threads (0 = one per CPU).
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub grace: Duration,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            layout: CorpusLayout::default(),
            emulator: Emulator::default(),
            build: Some(BuildCommand::default()),
            jobs: 0,
            timeout: Some(DEFAULT_TIMEOUT),
            grace: DEFAULT_GRACE,
        }
    }
}

impl RegressionConfig {
    /// Set the corpus directory.
    #[must_use]
    pub fn with_corpus_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layout.root = dir.into();
        self
    }

    /// Set the screenshot directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layout.output_dir = dir.into();
        self
    }

    /// Set the ROM file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.layout.extension = extension.into();
        self
    }

    /// Set the screenshot file extension.
    #[must_use]
    pub fn with_image_extension(mut self, extension: impl Into<String>) -> Self {
        self.layout.image_extension = extension.into();
        self
    }

    /// Only run ROMs whose name contains `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.layout.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_emulator(mut self, emulator: Emulator) -> Self {
        self.emulator = emulator;
        self
    }

    /// Set the build step (`None` to skip building).
    #[must_use]
    pub fn with_build(mut self, build: Option<BuildCommand>) -> Self {
        self.build = build;
        self
    }

    /// Set the worker count (0 = auto).
    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Resolved worker count.
    #[must_use]
    pub fn job_count(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get().max(1)
        } else {
            self.jobs
        }
    }

    #[must_use]
    pub const fn wait_limits(&self) -> WaitLimits {
        WaitLimits {
            timeout: self.timeout,
            grace: self.grace,
        }
    }
}

/// Hooks for watching a regression run.
///
/// All methods default to doing nothing. `entry_finished` is called from
/// worker threads in completion order.
pub trait RunObserver: Sync {
    fn build_started(&self, _build: &BuildCommand) {}
    fn build_finished(&self, _result: &Result<()>) {}
    fn corpus_discovered(&self, _corpus: &Corpus) {}
    fn entry_finished(&self, _result: &EntryResult) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Outcome of a full regression run.
#[derive(Debug, Clone, Default)]
pub struct RegressionReport {
    /// Results in corpus order.
    pub results: Vec<EntryResult>,
    pub rejected: Vec<CorpusNamingError>,
    pub summary: RegressionSummary,
}

impl RegressionReport {
    fn new(results: Vec<EntryResult>, rejected: Vec<CorpusNamingError>) -> Self {
        let mut summary = RegressionSummary {
            rejected: rejected.len(),
            ..RegressionSummary::default()
        };
        for result in &results {
            summary.add(result.clone());
        }
        Self {
            results,
            rejected,
            summary,
        }
    }
}

/// Run a single corpus entry.
///
/// Never fails: every problem is folded into the returned result.
pub fn run_entry(
    entry: &CorpusEntry,
    emulator: &Emulator,
    limits: WaitLimits,
    cancel: &CancelToken,
) -> EntryResult {
    if cancel.is_cancelled() {
        debug!(rom = %entry.name, "cancelled before start");
        return EntryResult::cancelled(entry);
    }

    // A screenshot from an earlier run must not count as this run's output.
    if let Err(e) = fs::remove_file(&entry.output_image_path)
        && e.kind() != io::ErrorKind::NotFound
    {
        let failure = InvocationFailure::StaleImage {
            path: entry.output_image_path.clone(),
            reason: e.to_string(),
        };
        return EntryResult::fail(entry, failure, String::new(), None);
    }

    debug!(rom = %entry.name, image = %entry.output_image_path.display(), "running emulator");
    let mut cmd = emulator.test_command(&entry.path, &entry.output_image_path);
    let run = match process::run_captured(&mut cmd, limits, cancel) {
        Ok(run) => run,
        Err(aborted) => return EntryResult::aborted(entry, aborted),
    };

    if !run.status.success() {
        let failure = InvocationFailure::Exit {
            code: run.status.code(),
        };
        return EntryResult::fail(entry, failure, run.output, Some(run.elapsed));
    }
    if !entry.output_image_path.is_file() {
        let failure = InvocationFailure::MissingImage {
            path: entry.output_image_path.clone(),
        };
        return EntryResult::fail(entry, failure, run.output, Some(run.elapsed));
    }

    debug!(rom = %entry.name, elapsed = ?run.elapsed, "entry passed");
    EntryResult::pass(entry, run.output, run.elapsed)
}

/// Run `entries` on a pool of `jobs` workers.
///
/// Results come back in the order of `entries` regardless of which finished
/// first.
///
/// # Errors
///
/// Returns [`Error::ThreadPool`] if the worker pool cannot be created.
pub fn run_corpus(
    entries: &[CorpusEntry],
    emulator: &Emulator,
    limits: WaitLimits,
    jobs: usize,
    cancel: &CancelToken,
    observer: &dyn RunObserver,
) -> Result<Vec<EntryResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|i| format!("emucheck-worker-{i}"))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    Ok(pool.install(|| {
        entries
            .par_iter()
            .map(|entry| {
                let result = run_entry(entry, emulator, limits, cancel);
                observer.entry_finished(&result);
                result
            })
            .collect()
    }))
}

/// Build the emulator, discover the corpus and run every entry.
///
/// # Errors
///
/// Fails before any invocation if the build fails, the emulator binary is
/// missing, the corpus root is missing, or the output directory cannot be
/// created. Per-entry failures are reported in the returned report instead.
pub fn run_regression(
    config: &RegressionConfig,
    cancel: &CancelToken,
    observer: &dyn RunObserver,
) -> Result<RegressionReport> {
    let _span = info_span!("regression").entered();

    if let Some(build) = &config.build {
        observer.build_started(build);
        let built = emulator::build_emulator(build);
        observer.build_finished(&built);
        built?;
    }
    config.emulator.ensure_exists()?;

    let corpus = corpus::discover(&config.layout)?;
    observer.corpus_discovered(&corpus);
    corpus::prepare_output_dir(&config.layout.output_dir)?;

    let jobs = config.job_count();
    info!(
        entries = corpus.entries.len(),
        jobs,
        "running corpus"
    );
    let results = run_corpus(
        &corpus.entries,
        &config.emulator,
        config.wait_limits(),
        jobs,
        cancel,
        observer,
    )?;

    let report = RegressionReport::new(results, corpus.rejected);
    report.summary.record_metrics();
    if report.summary.cancelled > 0 {
        warn!(cancelled = report.summary.cancelled, "run was cancelled");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn entry(dir: &Path, name: &str) -> CorpusEntry {
        let layout = CorpusLayout {
            root: dir.to_path_buf(),
            output_dir: dir.to_path_buf(),
            ..CorpusLayout::default()
        };
        layout.entry(&dir.join(name)).unwrap()
    }

    fn sh(script: &str) -> Emulator {
        Emulator::new("sh").with_launcher_args(["-c", script, "emu"])
    }

    const LIMITS: WaitLimits = WaitLimits {
        timeout: Some(Duration::from_secs(10)),
        grace: Duration::from_millis(100),
    };

    #[test]
    fn test_config_defaults() {
        let config = RegressionConfig::default();
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(config.grace, DEFAULT_GRACE);
        assert_eq!(config.build, Some(BuildCommand::default()));
        assert!(config.job_count() >= 1);
        assert_eq!(config.with_jobs(3).job_count(), 3);
    }

    #[test]
    fn test_summary_counts() {
        let dir = tempfile::tempdir().unwrap();
        let a = entry(dir.path(), "01_a.nes");
        let b = entry(dir.path(), "02_b.nes");
        let c = entry(dir.path(), "03_c.nes");

        let mut summary = RegressionSummary::default();
        summary.add(EntryResult::pass(&a, String::new(), Duration::ZERO));
        summary.add(EntryResult::fail(
            &b,
            InvocationFailure::Exit { code: Some(1) },
            String::new(),
            None,
        ));
        summary.add(EntryResult::cancelled(&c));

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.total(), 3);
        assert!(!summary.all_passed());
        let names: Vec<_> = summary.failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["02_b.nes", "03_c.nes"]);
    }

    #[test]
    fn test_rejected_fails_summary() {
        let summary = RegressionSummary {
            rejected: 1,
            ..RegressionSummary::default()
        };
        assert!(!summary.all_passed());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_entry_pass() {
        let dir = tempfile::tempdir().unwrap();
        let e = entry(dir.path(), "01_a.nes");
        let result = run_entry(&e, &sh("echo ran $2; touch \"$3\""), LIMITS, &CancelToken::new());
        assert_eq!(result.status, EntryStatus::Pass, "{:?}", result.failure);
        assert!(result.output.contains("ran"));
        assert!(result.elapsed.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_entry_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let e = entry(dir.path(), "01_a.nes");
        let result = run_entry(&e, &sh("touch \"$3\"; exit 3"), LIMITS, &CancelToken::new());
        assert_eq!(result.status, EntryStatus::Fail);
        assert_eq!(result.failure, Some(InvocationFailure::Exit { code: Some(3) }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_entry_stale_image_removed() {
        let dir = tempfile::tempdir().unwrap();
        let e = entry(dir.path(), "01_a.nes");
        fs::write(&e.output_image_path, b"old").unwrap();

        let result = run_entry(&e, &sh("exit 0"), LIMITS, &CancelToken::new());
        assert!(matches!(
            result.failure,
            Some(InvocationFailure::MissingImage { .. })
        ));
        assert!(!e.output_image_path.exists());
    }

    #[test]
    fn test_run_entry_stale_image_not_removable() {
        let dir = tempfile::tempdir().unwrap();
        let e = entry(dir.path(), "01_a.nes");
        fs::create_dir(&e.output_image_path).unwrap();
        fs::write(e.output_image_path.join("keep"), b"x").unwrap();
        let ran = dir.path().join("ran");

        let result = run_entry(
            &e,
            &sh(&format!("touch '{}'", ran.display())),
            LIMITS,
            &CancelToken::new(),
        );
        assert_eq!(result.status, EntryStatus::Fail);
        assert!(matches!(
            result.failure,
            Some(InvocationFailure::StaleImage { ref path, .. }) if *path == e.output_image_path
        ));
        assert!(result.elapsed.is_none());
        assert!(!ran.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_entry_interrupted_while_cancelling() {
        let dir = tempfile::tempdir().unwrap();
        let e = entry(dir.path(), "01_a.nes");
        let cancel = CancelToken::new();
        let limits = WaitLimits {
            grace: Duration::from_secs(5),
            ..LIMITS
        };

        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                cancel.cancel();
            })
        };
        // Dies from SIGINT well after the token is set, inside the grace period.
        let result = run_entry(&e, &sh("sleep 0.5; kill -INT $$; sleep 5"), limits, &cancel);
        canceller.join().unwrap();

        assert_eq!(result.status, EntryStatus::Cancelled, "{:?}", result.failure);
        assert_eq!(result.failure, Some(InvocationFailure::Cancelled));
        assert!(result.elapsed.is_some());
    }

    #[test]
    fn test_run_entry_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let e = entry(dir.path(), "01_a.nes");
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = run_entry(&e, &Emulator::new("/nonexistent/emu"), LIMITS, &cancel);
        assert_eq!(result.status, EntryStatus::Cancelled);
        assert!(result.elapsed.is_none());
    }
}
