//! Configuration management for raw2fits.
//!
//! Configuration is loaded from a TOML file in the platform config directory.
//! Every section falls back to its defaults, so an empty file is valid; only
//! `fits.object` must be set before a job can start.

mod types;
mod validate;

pub use types::*;

use crate::coords::{Coordinate, CoordinateError};
use crate::error::ConfigError;
use crate::job::{ImageSetup, JobSettings};
use crate::metadata::FileMetadata;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input/output directories and naming
    pub io: IoConfig,

    /// Image production settings
    pub image: ImageConfig,

    /// FITS header defaults
    pub fits: FitsConfig,

    /// Worker settings
    pub processing: ProcessingConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.raw2fits.raw2fits/config.toml
    /// - Linux: ~/.config/raw2fits/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\raw2fits\raw2fits\config\config.toml
    ///
    /// Falls back to ~/.raw2fits/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "raw2fits", "raw2fits")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".raw2fits").join("config.toml")
            })
    }

    /// Input directory with `~` expanded.
    pub fn raw_dir(&self) -> PathBuf {
        expand(&self.io.raw_dir)
    }

    /// Output directory with `~` expanded.
    pub fn fits_dir(&self) -> PathBuf {
        expand(&self.io.fits_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Header defaults for every file of a job.
    pub fn file_metadata(&self) -> Result<FileMetadata, ConfigError> {
        let fits = &self.fits;
        Ok(FileMetadata {
            object: fits.object.trim().to_string(),
            ra: parse_coordinate(
                "fits.object_coordinates.ra",
                &fits.object_coordinates.ra,
                Coordinate::parse_right_ascension,
            )?,
            dec: parse_coordinate(
                "fits.object_coordinates.dec",
                &fits.object_coordinates.dec,
                Coordinate::parse,
            )?,
            telescope: fits.telescope.clone(),
            tele_aperture: fits.teleaper,
            tele_focal: fits.telefoc,
            instrument: fits.instrument.clone(),
            observer: fits.observer.clone(),
            filter: fits.filter.clone(),
            note: fits.note.clone(),
            date: fits.date.clone(),
            exposure: fits.exposure,
            temperature: fits.temperature,
            observatory: fits.observatory.clone(),
            site_name: fits.sitename.clone(),
            site_lat: fits.sitelat,
            site_lon: fits.sitelon,
            site_elev: fits.sitelev,
            overrides: Default::default(),
        })
    }

    /// Build the settings for a conversion job.
    ///
    /// Fails when the configuration is invalid or `fits.object` is empty.
    pub fn to_job_settings(&self) -> Result<JobSettings, ConfigError> {
        self.validate()?;
        if self.fits.object.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "fits.object is mandatory".into(),
            ));
        }

        Ok(JobSettings {
            input_dir: self.raw_dir(),
            output_dir: self.fits_dir(),
            naming: self.io.naming,
            overwrite: self.io.overwrite,
            image: ImageSetup {
                mode: self.image.mode,
                auto_bright: self.image.auto_bright,
                interpolation: self.image.interpolation,
                autoscale: self.image.autoscale,
            },
            workers: (self.processing.workers > 0).then_some(self.processing.workers),
            metadata: self.file_metadata()?,
            metadata_policy: self.processing.metadata_policy(),
        })
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}

fn parse_coordinate(
    field: &str,
    value: &str,
    parser: fn(&str) -> Result<Coordinate, CoordinateError>,
) -> Result<Option<Coordinate>, ConfigError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parser(value)
        .map(Some)
        .map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))
}
