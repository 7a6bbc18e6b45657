//! FITS header metadata and the rules for merging decoder-derived values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;

/// Header fields written into every image extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadata {
    pub object: String,
    pub ra: Option<Coordinate>,
    pub dec: Option<Coordinate>,
    pub telescope: String,
    /// Telescope aperture in millimetres
    pub tele_aperture: f64,
    /// Telescope focal length in millimetres
    pub tele_focal: f64,
    pub instrument: String,
    pub observer: String,
    pub filter: String,
    pub note: String,
    /// Observation timestamp, `YYYY-MM-DDTHH:MM:SS`
    pub date: String,
    /// Exposure time in seconds
    pub exposure: f64,
    /// Sensor temperature in degrees Celsius
    pub temperature: f64,
    pub observatory: String,
    pub site_name: String,
    pub site_lat: f64,
    pub site_lon: f64,
    pub site_elev: f64,
    pub overrides: DecoderOverrides,
}

/// Per-field flags: `true` means the decoder value replaces the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOverrides {
    pub instrument: bool,
    pub observer: bool,
    pub date: bool,
    pub exposure: bool,
}

/// Camera-side values exposed by the RAW decoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraInfo {
    pub make: String,
    pub model: String,
    pub artist: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    /// Shutter speed in seconds
    pub shutter: Option<f64>,
}

impl CameraInfo {
    /// `"<make> <model>"`, trimmed when either part is missing.
    pub fn instrument(&self) -> String {
        format!("{} {}", self.make.trim(), self.model.trim())
            .trim()
            .to_string()
    }
}

/// How decoder overrides behave across the files of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataPolicy {
    /// Every file merges into a fresh copy of the job defaults.
    #[default]
    Isolated,
    /// All workers merge into one shared record; override flags latch for the
    /// rest of the job.
    Latched,
}

/// Format a capture timestamp the way it is written to `DATE-OBS`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Fill decoder-derivable fields of `meta` from `camera`.
///
/// A field is filled when it is empty or its override flag is already set;
/// filling sets the flag. Fields with no decoder equivalent are not touched.
pub fn merge(meta: &mut FileMetadata, camera: &CameraInfo) {
    if meta.instrument.is_empty() || meta.overrides.instrument {
        meta.instrument = camera.instrument();
        meta.overrides.instrument = true;
    }

    if meta.observer.is_empty() || meta.overrides.observer {
        meta.observer = camera.artist.clone().unwrap_or_default();
        meta.overrides.observer = true;
    }

    if meta.date.is_empty() || meta.overrides.date {
        meta.date = camera
            .captured_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default();
        meta.overrides.date = true;
    }

    if meta.exposure == 0.0 || meta.overrides.exposure {
        meta.exposure = camera.shutter.unwrap_or(0.0);
        meta.overrides.exposure = true;
    }
}
