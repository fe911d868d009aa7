//! Benchmark result output: a sink seam for timing series plus the CSV
//! writer used by the binary.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use tracing::{error, info};

/// Receives timing series from the planet and simulation benchmarks.
pub trait BenchmarkSink {
    /// Record a series of per-sample microsecond timings under a label.
    fn record(&mut self, label: &str, filename: &str, samples_us: &[u64]);
}

/// Writes each series as a CSV file under a results directory: one header
/// line, then one integer of microseconds per line. I/O failures are logged
/// and the run continues.
#[derive(Debug, Clone)]
pub struct CsvBenchmarkWriter {
    results_dir: PathBuf,
}

impl CsvBenchmarkWriter {
    #[must_use]
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }
}

impl BenchmarkSink for CsvBenchmarkWriter {
    fn record(&mut self, label: &str, filename: &str, samples_us: &[u64]) {
        let path = self.results_dir.join(filename);
        info!(path = %path.display(), samples = samples_us.len(), "writing benchmark results");
        let mut contents = String::with_capacity(label.len() + 1 + samples_us.len() * 8);
        contents.push_str(label);
        contents.push('\n');
        for sample in samples_us {
            let _ = writeln!(contents, "{sample}");
        }
        if let Err(err) = fs::write(&path, contents) {
            error!(path = %path.display(), %err, "writing benchmark results failed");
        }
    }
}

/// Sink that drops every series.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBenchmarkSink;

impl BenchmarkSink for NullBenchmarkSink {
    fn record(&mut self, _label: &str, _filename: &str, _samples_us: &[u64]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_writer_emits_header_then_samples() {
        let dir = std::env::temp_dir().join(format!("genesim-bench-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create temp dir");
        let mut writer = CsvBenchmarkWriter::new(&dir);
        writer.record("time_microseconds_2_threads", "out.csv", &[12, 345, 6789]);
        let contents = fs::read_to_string(dir.join("out.csv")).expect("read results");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec!["time_microseconds_2_threads", "12", "345", "6789"]
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_directory_does_not_panic() {
        let mut writer = CsvBenchmarkWriter::new("/nonexistent/genesim-results");
        writer.record("label", "out.csv", &[1, 2, 3]);
    }
}
