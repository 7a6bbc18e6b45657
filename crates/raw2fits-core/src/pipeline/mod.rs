//! Pipeline stages run for every job.
//!
//! - **scan**: find supported RAW files in the input directory
//! - **planes**: split decoded RGB data into per-channel planes
//! - **convert**: the per-file decode, merge, plan and write sequence

pub mod convert;
pub mod planes;
pub mod scan;

pub use convert::FileConverter;
pub use planes::{extract_plane, Planes};
pub use scan::{scan, RawFileRecord, WorkList};
