//! The `raw2fits scan` command: list the RAW files a conversion would pick up.

use clap::Args;
use raw2fits_core::pipeline::{scan, RawFileRecord};
use raw2fits_core::Vendor;
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the `scan` command.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan (not recursive)
    #[arg(required = true)]
    pub dir: PathBuf,

    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ScanEntry {
    name: String,
    vendor: &'static str,
    size: u64,
}

impl From<&RawFileRecord> for ScanEntry {
    fn from(record: &RawFileRecord) -> Self {
        Self {
            name: record
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            vendor: record.vendor.name(),
            size: record.size,
        }
    }
}

/// Execute the scan command.
pub async fn execute(args: ScanArgs) -> anyhow::Result<()> {
    let records = scan(&args.dir)?;
    let entries: Vec<ScanEntry> = records.iter().map(ScanEntry::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        let extensions: Vec<&str> = Vendor::supported_extensions().collect();
        eprintln!(
            "No supported RAW files ({}) in {}",
            extensions.join(", "),
            args.dir.display()
        );
        return Ok(());
    }
    for entry in &entries {
        println!("{:<16} {:>10}K  {}", entry.vendor, entry.size / 1024, entry.name);
    }
    let total: u64 = entries.iter().map(|e| e.size).sum();
    eprintln!(
        "{} file(s), {:.1} MB",
        entries.len(),
        total as f64 / 1_000_000.0
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_entry_from_record() {
        let record = RawFileRecord {
            path: PathBuf::from("/raw/IMG_0001.CR2"),
            vendor: Vendor::Canon,
            size: 25_000_000,
        };
        let entry = ScanEntry::from(&record);
        assert_eq!(entry.name, "IMG_0001.CR2");
        assert_eq!(entry.vendor, "Canon");
    }

    #[tokio::test]
    async fn test_scan_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = ScanArgs {
            dir: dir.path().join("missing"),
            json: false,
        };
        assert!(execute(args).await.is_err());
    }
}
