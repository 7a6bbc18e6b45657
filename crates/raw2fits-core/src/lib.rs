//! raw2fits core - batch conversion of camera RAW files into FITS images.
//!
//! A job scans one directory for supported RAW files, splits the list across
//! a fixed pool of worker threads, and for every file decodes the sensor data,
//! merges camera metadata into the configured header defaults, and writes one
//! or more FITS files.
//!
//! ```text
//! Scan → Partition → Decode → Merge metadata → Extract planes → Write FITS
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use raw2fits_core::{CancelToken, Config, ConversionJob};
//!
//! fn main() -> raw2fits_core::Result<()> {
//!     let config = Config::load()?;
//!     let settings = config.to_job_settings()?;
//!
//!     let summary = ConversionJob::new(settings).run(CancelToken::new())?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coords;
pub mod decode;
pub mod error;
pub mod fits;
pub mod job;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod vendor;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use coords::{parse_degrees, Coordinate};
pub use decode::{DecodeOptions, DecodedImage, RawDecoder, RawloaderDecoder};
pub use error::{ConfigError, ConversionError, Raw2FitsError, Result, ScanError};
pub use fits::{FitsEncoder, FitsStream, FitsioEncoder};
pub use job::{ConversionJob, ImageSetup, JobSettings, RunningJob};
pub use metadata::{CameraInfo, FileMetadata, MetadataPolicy};
pub use naming::{FrameMode, NamingPolicy};
pub use pool::{CancelToken, WorkerPool};
pub use report::{BatchSummary, FileOutcome, JobReporter, LogLevel, TracingReporter};
pub use vendor::Vendor;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
