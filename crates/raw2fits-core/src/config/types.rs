//! Configuration sections and their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::metadata::MetadataPolicy;
use crate::naming::{FrameMode, NamingPolicy};

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Directory scanned for RAW files (not recursive)
    pub raw_dir: PathBuf,

    /// Directory receiving FITS files
    pub fits_dir: PathBuf,

    /// Output file naming policy
    pub naming: NamingPolicy,

    /// Replace existing outputs instead of skipping them
    pub overwrite: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("."),
            fits_dir: PathBuf::from("."),
            naming: NamingPolicy::default(),
            overwrite: false,
        }
    }
}

/// Image production settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Which channels are written and how they are split across files
    pub mode: FrameMode,

    /// Stretch the brightest sample to full scale
    pub auto_bright: bool,

    /// Full-resolution output instead of 2x2 superpixels
    pub interpolation: bool,

    /// Rescale samples from the camera black/white levels
    pub autoscale: bool,
}

/// Header values written to every extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitsConfig {
    /// Target name; required to start a job
    pub object: String,
    pub telescope: String,
    /// Aperture in millimetres
    pub teleaper: f64,
    /// Focal length in millimetres
    pub telefoc: f64,
    pub observatory: String,
    /// Filled from camera make and model when empty
    pub instrument: String,
    pub sitename: String,
    pub sitelat: f64,
    pub sitelon: f64,
    pub sitelev: f64,
    /// Filled from the EXIF artist when empty
    pub observer: String,
    pub filter: String,
    pub note: String,
    /// Filled from the capture time when empty
    pub date: String,
    /// Seconds; filled from the shutter speed when zero
    pub exposure: f64,
    /// Sensor temperature in degrees Celsius
    pub temperature: f64,
    pub object_coordinates: ObjectCoordinates,
}

/// Target position. Empty strings leave the coordinate unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectCoordinates {
    /// Right ascension in hours, `H:M:S[.sss]` or decimal
    pub ra: String,

    /// Declination in degrees, `D:M:S[.sss]` or decimal
    pub dec: String,
}

/// Worker and metadata-sharing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of worker threads; 0 uses one per logical CPU
    pub workers: usize,

    /// Share decoder-filled header fields across every file of a job
    pub latch_decoder_fields: bool,
}

impl ProcessingConfig {
    pub fn metadata_policy(&self) -> MetadataPolicy {
        if self.latch_decoder_fields {
            MetadataPolicy::Latched
        } else {
            MetadataPolicy::Isolated
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
