//! Input directory scanning.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::vendor::{classify_path, Vendor};

/// A supported RAW file found in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    pub vendor: Vendor,
    /// File size in bytes
    pub size: u64,
}

impl RawFileRecord {
    pub fn size_kib(&self) -> u64 {
        self.size / 1024
    }
}

impl fmt::Display for RawFileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} raw file {} size: {}K",
            self.vendor,
            self.path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default(),
            self.size_kib()
        )
    }
}

/// List supported RAW files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into. An unreadable or missing directory
/// is an error; a directory without RAW files is not.
pub fn scan(dir: &Path) -> Result<Vec<RawFileRecord>, ScanError> {
    let scan_err = |source| ScanError {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::read_dir(dir).map_err(scan_err)?;
    let root = dir.canonicalize().map_err(scan_err)?;

    let mut records = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry in {:?}: {}", root, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            tracing::trace!("Skipping non-file {:?}", entry.path());
            continue;
        }

        let Some(vendor) = classify_path(entry.path()) else {
            tracing::trace!("Skipping unsupported file {:?}", entry.file_name());
            continue;
        };
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::debug!("Cannot stat {:?}: {}", entry.path(), e);
                continue;
            }
        };

        let record = RawFileRecord {
            path: entry.into_path(),
            vendor,
            size,
        };
        records.push(record);
    }

    Ok(records)
}

/// Immutable, shareable list of files for one job.
///
/// Workers index into it with their assigned ranges.
#[derive(Debug, Clone, Default)]
pub struct WorkList {
    paths: Arc<[PathBuf]>,
}

impl WorkList {
    pub fn get(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}

impl From<Vec<RawFileRecord>> for WorkList {
    fn from(records: Vec<RawFileRecord>) -> Self {
        Self {
            paths: records.into_iter().map(|r| r.path).collect(),
        }
    }
}

impl From<Vec<PathBuf>> for WorkList {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into(),
        }
    }
}
