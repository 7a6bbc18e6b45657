//! Conversion jobs: scan, partition, dispatch, and completion reporting.
//!
//! A [`ConversionJob`] is built from [`JobSettings`] plus optional collaborator
//! overrides, then started into a [`RunningJob`]. Only configuration and scan
//! problems are returned as errors; per-file failures go to the reporter.

use std::path::PathBuf;
use std::sync::Arc;

use crate::decode::{DecodeOptions, RawDecoder, RawloaderDecoder};
use crate::error::{ConfigError, Raw2FitsError};
use crate::fits::{FitsEncoder, FitsioEncoder};
use crate::metadata::{FileMetadata, MetadataPolicy};
use crate::naming::{FrameMode, NamingPolicy};
use crate::pipeline::convert::FileConverter;
use crate::pipeline::scan::{scan, WorkList};
use crate::pool::{default_worker_count, partition, CancelToken, WorkerPool};
use crate::report::{BatchSummary, FileOutcome, JobReporter, LogLevel, SummaryCounters, TracingReporter};

/// Image production switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSetup {
    pub mode: FrameMode,
    pub auto_bright: bool,
    pub interpolation: bool,
    pub autoscale: bool,
}

impl ImageSetup {
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            auto_bright: self.auto_bright,
            interpolation: self.interpolation,
            autoscale: self.autoscale,
        }
    }
}

/// Everything a job needs to know before it starts.
#[derive(Debug, Clone, Default)]
pub struct JobSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub naming: NamingPolicy,
    pub overwrite: bool,
    pub image: ImageSetup,
    /// `None` uses one worker per logical CPU
    pub workers: Option<usize>,
    /// Header defaults merged with decoder values for every file
    pub metadata: FileMetadata,
    pub metadata_policy: MetadataPolicy,
}

impl JobSettings {
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(default_worker_count)
    }
}

/// A configured, not yet started, conversion job.
pub struct ConversionJob {
    settings: JobSettings,
    decoder: Arc<dyn RawDecoder>,
    encoder: Arc<dyn FitsEncoder>,
    reporter: Arc<dyn JobReporter>,
}

impl ConversionJob {
    pub fn new(settings: JobSettings) -> Self {
        Self {
            settings,
            decoder: Arc::new(RawloaderDecoder::new()),
            encoder: Arc::new(FitsioEncoder::new()),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn RawDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn FitsEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn JobReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    /// Scan the input directory and dispatch workers.
    ///
    /// Returns an error, without calling `on_complete`, when the mandatory
    /// object name is missing or the input directory cannot be read. An empty
    /// input directory starts a job with no workers.
    pub fn start(self, cancel: CancelToken) -> Result<RunningJob, Raw2FitsError> {
        let reporter = Arc::clone(&self.reporter);

        if self.settings.metadata.object.trim().is_empty() {
            let err = ConfigError::ValidationError("object name is mandatory".to_string());
            reporter.on_log(LogLevel::Error, &err.to_string());
            return Err(err.into());
        }

        let input_dir = &self.settings.input_dir;
        reporter.on_log(
            LogLevel::Info,
            &format!("Reading directory {}", input_dir.display()),
        );
        let records = scan(input_dir).map_err(|e| {
            reporter.on_log(LogLevel::Error, &e.to_string());
            e
        })?;
        for record in &records {
            reporter.on_log(LogLevel::Debug, &format!("Found {record}"));
        }

        let counters = Arc::new(SummaryCounters::default());
        let mut pool = WorkerPool::new(cancel.clone());
        let total = records.len();

        if total == 0 {
            reporter.on_log(
                LogLevel::Warn,
                &format!("No files found in {}", input_dir.display()),
            );
            return Ok(RunningJob::new(pool, counters, 0, reporter, cancel));
        }

        if let Err(e) = std::fs::create_dir_all(&self.settings.output_dir) {
            reporter.on_log(
                LogLevel::Error,
                &format!(
                    "Cannot create output directory {}: {}",
                    self.settings.output_dir.display(),
                    e
                ),
            );
            return Err(e.into());
        }

        reporter.on_progress_setup(total);
        let workers = self.settings.worker_count();
        reporter.on_log(
            LogLevel::Info,
            &format!(
                "Converting {} file(s) with {} worker(s), {} file(s) per worker",
                total,
                workers,
                (total / workers).max(1)
            ),
        );

        let work = WorkList::from(records);
        let converter = FileConverter::new(
            Arc::new(self.settings),
            self.decoder,
            self.encoder,
            Arc::clone(&reporter),
            cancel.clone(),
        );
        let task_counters = Arc::clone(&counters);
        let task_reporter = Arc::clone(&reporter);
        pool.start(partition(total, workers), move |ctx| {
            for index in ctx.range.clone() {
                let Some(path) = work.get(index) else {
                    continue;
                };
                // Files never started count as cancelled without a progress unit
                if ctx.is_cancelled() {
                    task_counters.record(FileOutcome::Cancelled);
                    continue;
                }
                let outcome = converter.convert(path);
                task_counters.record(outcome);
                task_reporter.on_progress_update();
            }
        })?;

        Ok(RunningJob::new(pool, counters, total, reporter, cancel))
    }

    /// Start the job and block until every worker has returned.
    pub fn run(self, cancel: CancelToken) -> Result<BatchSummary, Raw2FitsError> {
        Ok(self.start(cancel)?.wait())
    }
}

/// Handle to a job whose workers are running.
///
/// `on_complete` fires exactly once, from [`wait`](Self::wait),
/// [`stop`](Self::stop) or drop, whichever comes first.
pub struct RunningJob {
    pool: WorkerPool,
    counters: Arc<SummaryCounters>,
    total: usize,
    reporter: Arc<dyn JobReporter>,
    cancel: CancelToken,
    completed: bool,
}

impl RunningJob {
    fn new(
        pool: WorkerPool,
        counters: Arc<SummaryCounters>,
        total: usize,
        reporter: Arc<dyn JobReporter>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            pool,
            counters,
            total,
            reporter,
            cancel,
            completed: false,
        }
    }

    /// Token that stops this job when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Wait for every worker to finish its range.
    pub fn wait(mut self) -> BatchSummary {
        let panicked = self.pool.join();
        self.complete(panicked)
    }

    /// Cancel the job and wait for every worker to return.
    pub fn stop(mut self) -> BatchSummary {
        let panicked = self.pool.stop();
        self.complete(panicked)
    }

    fn complete(&mut self, panicked: usize) -> BatchSummary {
        let summary = self.counters.snapshot(self.total);
        if self.completed {
            return summary;
        }
        self.completed = true;

        if panicked > 0 {
            self.reporter.on_log(
                LogLevel::Error,
                &format!("{} worker(s) panicked", panicked),
            );
        }
        if self.cancel.is_cancelled() {
            self.reporter.on_log(LogLevel::Warn, "Conversion stopped");
        }
        self.reporter.on_complete(&summary);
        summary
    }
}

impl Drop for RunningJob {
    fn drop(&mut self) {
        if !self.completed {
            let panicked = self.pool.stop();
            self.complete(panicked);
        }
    }
}
