//! Metrics collection and reporting using metrics-rs.
//!
//! Regression runs and trace comparisons record counters, gauges and
//! histograms through the `metrics` facade; the CLI installs
//! [`CliRecorder`] to print them after a command with `--metrics`.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;

use crate::regression::{EntryResult, EntryStatus};

// ============================================================================
// Metric descriptions
// ============================================================================

/// Initialize metric descriptions.
///
/// Call this once at startup to register metric descriptions.
pub fn init() {
    describe_counter!(
        "emucheck_entries_passed_total",
        Unit::Count,
        "Corpus entries whose invocation passed"
    );
    describe_counter!(
        "emucheck_entries_failed_total",
        Unit::Count,
        "Corpus entries whose invocation failed"
    );
    describe_counter!(
        "emucheck_entries_cancelled_total",
        Unit::Count,
        "Corpus entries not run to completion due to cancellation"
    );
    describe_counter!(
        "emucheck_entries_rejected_total",
        Unit::Count,
        "Corpus files rejected for having no ordering prefix"
    );
    describe_gauge!(
        "emucheck_trace_compared_lines",
        Unit::Count,
        "Index-aligned trace lines inspected"
    );
    describe_gauge!(
        "emucheck_trace_divergence_index",
        Unit::Count,
        "Execution index of the first trace divergence"
    );
    describe_histogram!(
        "emucheck_invocation_duration_seconds",
        Unit::Seconds,
        "Wall-clock time of one emulator invocation"
    );
}

// ============================================================================
// Metric recording functions
// ============================================================================

/// Record a single corpus entry result.
pub fn record_entry(result: &EntryResult) {
    let labels = [("rom", result.name.clone())];
    match result.status {
        EntryStatus::Pass => counter!("emucheck_entries_passed_total", &labels).increment(1),
        EntryStatus::Fail => counter!("emucheck_entries_failed_total", &labels).increment(1),
        EntryStatus::Cancelled => {
            counter!("emucheck_entries_cancelled_total", &labels).increment(1);
        }
    }
    if let Some(elapsed) = result.elapsed {
        histogram!("emucheck_invocation_duration_seconds").record(elapsed.as_secs_f64());
    }
}

/// Record regression summary totals.
pub fn record_summary(passed: u64, failed: u64, cancelled: u64, rejected: u64) {
    counter!("emucheck_entries_passed_total").absolute(passed);
    counter!("emucheck_entries_failed_total").absolute(failed);
    counter!("emucheck_entries_cancelled_total").absolute(cancelled);
    counter!("emucheck_entries_rejected_total").absolute(rejected);
}

/// Record the outcome of a trace comparison.
#[allow(clippy::cast_precision_loss)]
pub fn record_trace_comparison(compared: usize, divergence_index: Option<usize>) {
    gauge!("emucheck_trace_compared_lines").set(compared as f64);
    if let Some(index) = divergence_index {
        gauge!("emucheck_trace_divergence_index").set(index as f64);
    }
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

#[derive(Default)]
struct CounterStorage {
    values: RwLock<HashMap<String, u64>>,
}

#[derive(Default)]
struct GaugeStorage {
    values: RwLock<HashMap<String, f64>>,
}

#[derive(Default)]
struct HistogramStorage {
    values: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    storage: Arc<CounterStorage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        let mut values = self.storage.values.write();
        values.insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    storage: Arc<GaugeStorage>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        let mut values = self.storage.values.write();
        values.insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<HistogramStorage>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        let mut values = self.storage.values.write();
        values.entry(self.key.clone()).or_default().push(value);
    }
}

/// Recorder that keeps metrics in memory for a terminal summary.
pub struct CliRecorder {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Arc::new(CounterStorage::default()),
            gauges: Arc::new(GaugeStorage::default()),
            histograms: Arc::new(HistogramStorage::default()),
        }
    }

    /// Install this recorder as the global metrics recorder.
    ///
    /// Returns `None` if another recorder is already installed.
    #[must_use]
    pub fn install(self) -> Option<CliRecorderHandle> {
        let counters = Arc::clone(&self.counters);
        let gauges = Arc::clone(&self.gauges);
        let histograms = Arc::clone(&self.histograms);

        metrics::set_global_recorder(self).ok()?;

        Some(CliRecorderHandle {
            counters,
            gauges,
            histograms,
        })
    }
}

impl Default for CliRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn key_to_string(key: &Key) -> String {
    let name = key.name();
    let labels = key.labels();
    if labels.len() == 0 {
        name.to_string()
    } else {
        let label_str: Vec<String> = labels
            .map(|l| format!("{}={}", l.key(), l.value()))
            .collect();
        format!("{}{{{}}}", name, label_str.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            storage: Arc::clone(&self.gauges),
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.histograms),
        }))
    }
}

/// Handle for reading metrics after installing the CLI recorder.
pub struct CliRecorderHandle {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorderHandle {
    /// Print all collected metrics in a human-readable format.
    #[allow(clippy::cast_precision_loss)]
    pub fn print_summary(&self) {
        let counters = self.counters.values.read();
        let gauges = self.gauges.values.read();
        let histograms = self.histograms.values.read();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        println!();

        if !counters.is_empty() {
            println!("### Counters");
            let mut keys: Vec<_> = counters.keys().collect();
            keys.sort();
            for key in keys {
                println!("  {}: {}", key, counters[key]);
            }
            println!();
        }

        if !gauges.is_empty() {
            println!("### Gauges");
            let mut keys: Vec<_> = gauges.keys().collect();
            keys.sort();
            for key in keys {
                println!("  {}: {:.6}", key, gauges[key]);
            }
            println!();
        }

        if !histograms.is_empty() {
            println!("### Histograms");
            let mut keys: Vec<_> = histograms.keys().collect();
            keys.sort();
            for key in keys {
                let values = &histograms[key];
                if values.is_empty() {
                    continue;
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                println!(
                    "  {}: count={}, min={:.6}, max={:.6}, avg={:.6}",
                    key,
                    values.len(),
                    min,
                    max,
                    avg
                );
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::Label;

    #[test]
    fn test_key_to_string() {
        let key = Key::from_name("emucheck_entries_passed_total");
        assert_eq!(key_to_string(&key), "emucheck_entries_passed_total");

        let key = Key::from_parts(
            "emucheck_entries_failed_total",
            vec![Label::new("rom", "02-branches.nes")],
        );
        assert_eq!(
            key_to_string(&key),
            "emucheck_entries_failed_total{rom=02-branches.nes}"
        );
    }

    #[test]
    fn test_cli_recorder_storage() {
        let recorder = CliRecorder::new();

        let counter = CliCounter {
            key: "emucheck_entries_passed_total".to_string(),
            storage: Arc::clone(&recorder.counters),
        };
        metrics::CounterFn::increment(&counter, 2);
        metrics::CounterFn::increment(&counter, 1);
        assert_eq!(
            recorder.counters.values.read().get("emucheck_entries_passed_total"),
            Some(&3)
        );

        let histogram = CliHistogram {
            key: "emucheck_invocation_duration_seconds".to_string(),
            storage: Arc::clone(&recorder.histograms),
        };
        metrics::HistogramFn::record(&histogram, 0.5);
        metrics::HistogramFn::record(&histogram, 1.5);
        assert_eq!(
            recorder
                .histograms
                .values
                .read()
                .get("emucheck_invocation_duration_seconds")
                .map(Vec::len),
            Some(2)
        );
    }
}
