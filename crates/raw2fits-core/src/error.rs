//! Error types for the raw2fits conversion pipeline.
//!
//! Errors are split by how far they reach: configuration and scan errors abort
//! a job before any file is touched, while [`ConversionError`] is scoped to a
//! single input file and never stops the worker that produced it.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for raw2fits operations.
#[derive(Error, Debug)]
pub enum Raw2FitsError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The input directory could not be enumerated
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid or a mandatory field is missing
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// The input directory could not be opened or read.
#[derive(Error, Debug)]
#[error("Cannot read directory {path}: {source}")]
pub struct ScanError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Decoder stage at which a RAW file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// The file could not be opened or identified
    Open,
    /// Sensor data could not be unpacked
    Unpack,
    /// Sensor data could not be mapped onto an image grid
    RawToImage,
    /// Post-processing into RGB triples failed
    Process,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStage::Open => write!(f, "open"),
            DecodeStage::Unpack => write!(f, "unpack"),
            DecodeStage::RawToImage => write!(f, "raw2image"),
            DecodeStage::Process => write!(f, "process"),
        }
    }
}

/// Errors raised by a [`RawDecoder`](crate::decode::RawDecoder).
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A decoder stage failed
    #[error("{stage} failed: {message}")]
    Failed { stage: DecodeStage, message: String },

    /// Decoding was interrupted by a cancellation request
    #[error("decoding cancelled")]
    Cancelled,
}

impl DecodeError {
    pub fn new(stage: DecodeStage, message: impl Into<String>) -> Self {
        DecodeError::Failed {
            stage,
            message: message.into(),
        }
    }
}

/// Errors raised by a [`FitsEncoder`](crate::fits::FitsEncoder).
#[derive(Error, Debug)]
pub enum WriteError {
    /// The output path is already taken
    #[error("file already exists: {}", .0.display())]
    Exists(std::path::PathBuf),

    /// Creating the file or one of its image HDUs failed
    #[error("cannot create image: {0}")]
    Create(#[source] fitsio::errors::Error),

    /// Writing header records failed
    #[error("cannot write header: {0}")]
    Header(#[source] fitsio::errors::Error),

    /// Writing pixel data failed
    #[error("cannot write pixels: {0}")]
    Pixels(#[source] fitsio::errors::Error),

    /// The plane cannot be stored as given
    #[error("invalid image: {0}")]
    Image(String),
}

/// Per-file conversion errors, organized by category.
///
/// None of these abort the batch: the worker logs them and moves on.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// RAW decoding failed
    #[error("Decode error ({stage}) for {path}: {message}")]
    Decode {
        path: PathBuf,
        stage: DecodeStage,
        message: String,
    },

    /// FITS writing failed; extensions written before the failure stay on disk
    #[error("Write error for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: WriteError,
    },

    /// An existing output could not be removed before overwriting
    #[error("Filesystem error for {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoded data does not match its declared geometry
    #[error("Plane extraction failed for {path}: {message}")]
    Plan { path: PathBuf, message: String },

    /// The job was stopped while this file was in flight
    #[error("Cancelled: {0}")]
    Cancelled(PathBuf),
}

impl ConversionError {
    /// Short human-readable category, used as the log prefix.
    pub fn category(&self) -> &'static str {
        match self {
            ConversionError::Decode { .. } => "DecodeError",
            ConversionError::Write { .. } => "WriteError",
            ConversionError::Filesystem { .. } => "FilesystemError",
            ConversionError::Plan { .. } => "PlaneError",
            ConversionError::Cancelled(_) => "Cancelled",
        }
    }

    pub(crate) fn from_decode(path: PathBuf, err: DecodeError) -> Self {
        match err {
            DecodeError::Failed { stage, message } => ConversionError::Decode {
                path,
                stage,
                message,
            },
            DecodeError::Cancelled => ConversionError::Cancelled(path),
        }
    }
}

/// Convenience type alias for raw2fits results.
pub type Result<T> = std::result::Result<T, Raw2FitsError>;
