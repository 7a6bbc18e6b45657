//! The `raw2fits convert` command.

use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use raw2fits_core::{
    BatchSummary, CancelToken, Config, ConversionJob, FrameMode, JobReporter, LogLevel,
    NamingPolicy,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::types::{parse_mode, parse_naming};

/// Arguments for the `convert` command.
#[derive(Args, Debug, Default)]
pub struct ConvertArgs {
    /// Config file (defaults to the platform config path)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory containing RAW files
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory receiving FITS files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target name written to OBJECT (required unless set in config)
    #[arg(long, env = "RAW2FITS_OBJECT")]
    pub object: Option<String>,

    /// Filter name written to FILTER
    #[arg(long)]
    pub filter: Option<String>,

    /// Observation date written to DATE-OBS instead of the capture time
    #[arg(long)]
    pub date: Option<String>,

    /// Naming policy: raw_name, object_datetime, object_filter_datetime, raw_datetime
    #[arg(long, value_parser = parse_naming)]
    pub naming: Option<NamingPolicy>,

    /// Output mode: grayscale, all_channels_by_files, all_channels, red_only, green_only, blue_only
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: Option<FrameMode>,

    /// Replace existing FITS files
    #[arg(long)]
    pub overwrite: bool,

    /// Number of worker threads (default: one per CPU)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Stretch the brightest sample to full scale
    #[arg(long)]
    pub auto_bright: bool,

    /// Full-resolution output instead of 2x2 superpixels
    #[arg(long)]
    pub interpolation: bool,

    /// Rescale samples from the camera black/white levels
    #[arg(long)]
    pub autoscale: bool,

    /// Share decoder-filled header fields across all files of the batch
    #[arg(long)]
    pub latch_decoder_fields: bool,

    /// Write a JSON summary to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// JSON report written with `--report`.
#[derive(Debug, Serialize)]
struct ConversionReport<'a> {
    version: &'a str,
    input_dir: &'a Path,
    output_dir: &'a Path,
    elapsed_secs: f64,
    #[serde(flatten)]
    summary: BatchSummary,
}

/// Execute the convert command.
pub async fn execute(args: ConvertArgs, mut config: Config) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args);
    let settings = config.to_job_settings()?;
    let input_dir = settings.input_dir.clone();
    let output_dir = settings.output_dir.clone();

    let cancel = CancelToken::new();
    let job = ConversionJob::new(settings).with_reporter(Arc::new(ProgressReporter::new()));

    // Ctrl-C stops the job cooperatively instead of killing the process
    let signal_token = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && signal_token.cancel() {
            tracing::warn!("Interrupted, finishing files in progress...");
        }
    });

    let start_time = Instant::now();
    let job_token = cancel.clone();
    let summary = tokio::task::spawn_blocking(move || job.run(job_token)).await??;
    signal.abort();
    let elapsed = start_time.elapsed();

    print_summary(&summary, elapsed);

    if let Some(path) = &args.report {
        let report = ConversionReport {
            version: raw2fits_core::VERSION,
            input_dir: &input_dir,
            output_dir: &output_dir,
            elapsed_secs: elapsed.as_secs_f64(),
            summary,
        };
        write_report(path, &report)?;
        tracing::info!("Report written to {:?}", path);
    }

    Ok(())
}

/// Apply command-line flags on top of the loaded config.
fn apply_overrides(config: &mut Config, args: &ConvertArgs) {
    if let Some(input) = &args.input {
        config.io.raw_dir = input.clone();
    }
    if let Some(output) = &args.output {
        config.io.fits_dir = output.clone();
    }
    if let Some(naming) = args.naming {
        config.io.naming = naming;
    }
    if args.overwrite {
        config.io.overwrite = true;
    }

    if let Some(mode) = args.mode {
        config.image.mode = mode;
    }
    config.image.auto_bright |= args.auto_bright;
    config.image.interpolation |= args.interpolation;
    config.image.autoscale |= args.autoscale;

    if let Some(object) = &args.object {
        config.fits.object = object.clone();
    }
    if let Some(filter) = &args.filter {
        config.fits.filter = filter.clone();
    }
    if let Some(date) = &args.date {
        config.fits.date = date.clone();
    }

    if let Some(workers) = args.workers {
        config.processing.workers = workers;
    }
    config.processing.latch_decoder_fields |= args.latch_decoder_fields;
}

fn write_report(path: &Path, report: &ConversionReport<'_>) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), report)?;
    Ok(())
}

/// Reporter driving an `indicatif` progress bar.
///
/// Log lines are routed through `tracing` with the bar suspended so they do
/// not tear the bar.
struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Self { bar }
    }
}

impl JobReporter for ProgressReporter {
    fn on_progress_setup(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.set_message("converting...");
    }

    fn on_progress_update(&self) {
        self.bar.inc(1);
    }

    fn on_log(&self, level: LogLevel, message: &str) {
        self.bar.suspend(|| match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        });
    }

    fn on_complete(&self, summary: &BatchSummary) {
        self.bar.finish_and_clear();
        tracing::debug!("Conversion finished: {}", summary);
    }
}

/// Print a formatted summary table after conversion.
fn print_summary(summary: &BatchSummary, elapsed: Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        summary.converted as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Converted:    {:>8}", summary.converted);
    if summary.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", summary.skipped);
    }
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    if summary.cancelled > 0 {
        eprintln!("    Cancelled:    {:>8}", summary.cancelled);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} files/sec", rate);
    eprintln!("  ====================================");
}
