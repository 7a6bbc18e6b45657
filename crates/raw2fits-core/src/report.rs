//! Progress, log and completion callbacks for front ends.
//!
//! The core only talks to a [`JobReporter`]; GUI and CLI front ends provide
//! their own implementation. [`TracingReporter`] forwards everything to
//! `tracing` and is the default for library users.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Severity of a log message passed to [`JobReporter::on_log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Callbacks invoked by a running conversion job.
///
/// Methods are called from worker threads, so implementations must be
/// thread-safe. All methods default to no-ops.
pub trait JobReporter: Send + Sync {
    /// Called once, before dispatch, with the number of files to attempt.
    fn on_progress_setup(&self, _total: usize) {}

    /// Called once per attempted file, whatever its outcome.
    fn on_progress_update(&self) {}

    /// Called with a formatted, human-readable message.
    fn on_log(&self, _level: LogLevel, _message: &str) {}

    /// Called exactly once after every worker has returned.
    fn on_complete(&self, _summary: &BatchSummary) {}
}

/// Reporter that writes every message to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl JobReporter for TracingReporter {
    fn on_log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }

    fn on_complete(&self, summary: &BatchSummary) {
        tracing::info!("Conversion finished: {}", summary);
    }
}

/// Final result of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// At least one output was written and none failed
    Converted,
    /// Every output already existed and overwrite is off
    Skipped,
    /// Decoding, deletion or writing failed
    Failed,
    /// The job was stopped before or during this file
    Cancelled,
}

/// Counts of file outcomes for a whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    /// Files whose outcome was recorded.
    pub fn attempted(&self) -> usize {
        self.converted + self.skipped + self.failed + self.cancelled
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted, {} skipped, {} failed, {} cancelled ({} total)",
            self.converted, self.skipped, self.failed, self.cancelled, self.total
        )
    }
}

/// Thread-safe outcome counters shared by all workers.
#[derive(Debug, Default)]
pub(crate) struct SummaryCounters {
    converted: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

impl SummaryCounters {
    pub fn record(&self, outcome: FileOutcome) {
        let counter = match outcome {
            FileOutcome::Converted => &self.converted,
            FileOutcome::Skipped => &self.skipped,
            FileOutcome::Failed => &self.failed,
            FileOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, total: usize) -> BatchSummary {
        BatchSummary {
            total,
            converted: self.converted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
