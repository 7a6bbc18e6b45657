//! Per-file conversion: decode, merge metadata, plan outputs, write FITS.
//!
//! Each file walks `Opened -> Decoded -> PlanesExtracted -> Written -> Closed`
//! and drops to `Aborted` on the first error. Buffers and open streams are
//! owned locally, so every exit path releases them.

use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::decode::{DecodedImage, RawDecoder};
use crate::error::ConversionError;
use crate::fits::{build_header, FitsEncoder, ImagePlane};
use crate::job::JobSettings;
use crate::metadata::{merge, CameraInfo, FileMetadata, MetadataPolicy};
use crate::naming::{OutputPlan, OutputTarget};
use crate::pipeline::planes::Planes;
use crate::pool::CancelToken;
use crate::report::{FileOutcome, JobReporter, LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    Opened,
    Decoded,
    PlanesExtracted,
    Written,
    Closed,
    Aborted,
}

/// Where merged header metadata comes from for each file.
#[derive(Debug)]
pub(crate) enum MetadataStore {
    /// Fresh copy of the job defaults per file
    Isolated(FileMetadata),
    /// One record shared by every worker; override flags persist
    Latched(Mutex<FileMetadata>),
}

impl MetadataStore {
    pub fn new(defaults: FileMetadata, policy: MetadataPolicy) -> Self {
        match policy {
            MetadataPolicy::Isolated => MetadataStore::Isolated(defaults),
            MetadataPolicy::Latched => MetadataStore::Latched(Mutex::new(defaults)),
        }
    }

    /// Merge `camera` and return the metadata to write for one file.
    pub fn merged(&self, camera: &CameraInfo) -> FileMetadata {
        match self {
            MetadataStore::Isolated(defaults) => {
                let mut meta = defaults.clone();
                merge(&mut meta, camera);
                meta
            }
            MetadataStore::Latched(shared) => {
                let mut meta = shared.lock().unwrap_or_else(|p| p.into_inner());
                merge(&mut meta, camera);
                meta.clone()
            }
        }
    }
}

/// Converts single RAW files according to the job settings.
pub struct FileConverter {
    settings: Arc<JobSettings>,
    decoder: Arc<dyn RawDecoder>,
    encoder: Arc<dyn FitsEncoder>,
    reporter: Arc<dyn JobReporter>,
    metadata: MetadataStore,
    cancel: CancelToken,
}

impl FileConverter {
    pub fn new(
        settings: Arc<JobSettings>,
        decoder: Arc<dyn RawDecoder>,
        encoder: Arc<dyn FitsEncoder>,
        reporter: Arc<dyn JobReporter>,
        cancel: CancelToken,
    ) -> Self {
        let metadata = MetadataStore::new(settings.metadata.clone(), settings.metadata_policy);
        Self {
            settings,
            decoder,
            encoder,
            reporter,
            metadata,
            cancel,
        }
    }

    /// Convert one file. Errors are reported, never returned.
    pub fn convert(&self, path: &Path) -> FileOutcome {
        if self.cancel.is_cancelled() {
            return FileOutcome::Cancelled;
        }
        self.transition(path, FileState::Opened);

        let options = self.settings.image.decode_options();
        let decoded = match self.decoder.decode(path, &options, &self.cancel) {
            Ok(decoded) => decoded,
            Err(e) => return self.abort(path, ConversionError::from_decode(path.to_path_buf(), e)),
        };
        if let Err(message) = decoded.check_geometry() {
            return self.abort(
                path,
                ConversionError::Plan {
                    path: path.to_path_buf(),
                    message,
                },
            );
        }
        self.transition(path, FileState::Decoded);

        let meta = self.metadata.merged(&decoded.camera);
        let plan = OutputPlan::new(
            &self.settings.output_dir,
            path,
            self.settings.naming,
            self.settings.image.mode,
            &meta,
        );

        let mut failed = false;
        let mut pending = Vec::with_capacity(plan.targets.len());
        for target in plan.targets {
            match self.prepare_target(&target) {
                Ok(true) => pending.push(target),
                Ok(false) => {}
                Err(e) => {
                    self.report(&e);
                    failed = true;
                }
            }
        }
        if pending.is_empty() {
            self.transition(path, FileState::Closed);
            return if failed {
                FileOutcome::Failed
            } else {
                FileOutcome::Skipped
            };
        }

        let channels = pending
            .iter()
            .flat_map(|t| t.extensions.iter().map(|ext| ext.channel));
        let planes = Planes::extract(&decoded.rgb, channels);
        self.transition(path, FileState::PlanesExtracted);

        let mut written = 0;
        for target in &pending {
            if let Err(e) = self.write_target(target, &decoded, &planes, &meta) {
                // Extensions already written to this target stay on disk
                self.report(&e);
                failed = true;
                continue;
            }
            written += 1;
            self.reporter.on_log(
                LogLevel::Info,
                &format!("Wrote {}", target.path.display()),
            );
        }

        if failed {
            self.transition(path, FileState::Aborted);
            return FileOutcome::Failed;
        }
        self.transition(path, FileState::Written);
        self.transition(path, FileState::Closed);
        if written > 0 {
            FileOutcome::Converted
        } else {
            FileOutcome::Skipped
        }
    }

    /// Decide whether `target` should be written, removing it under overwrite.
    fn prepare_target(&self, target: &OutputTarget) -> Result<bool, ConversionError> {
        if !target.path.exists() {
            return Ok(true);
        }
        if !self.settings.overwrite {
            self.reporter.on_log(
                LogLevel::Info,
                &format!("Skipping {}: file exists", target.path.display()),
            );
            return Ok(false);
        }
        std::fs::remove_file(&target.path).map_err(|source| ConversionError::Filesystem {
            path: target.path.clone(),
            source,
        })?;
        tracing::debug!("Removed existing {:?}", target.path);
        Ok(true)
    }

    fn write_target(
        &self,
        target: &OutputTarget,
        decoded: &DecodedImage,
        planes: &Planes,
        meta: &FileMetadata,
    ) -> Result<(), ConversionError> {
        let write_err = |source| ConversionError::Write {
            path: target.path.clone(),
            source,
        };
        let created = Utc::now();

        let mut stream = self.encoder.create(&target.path).map_err(write_err)?;
        for ext in &target.extensions {
            let data = planes.get(ext.channel).ok_or_else(|| ConversionError::Plan {
                path: target.path.clone(),
                message: format!("{} plane was not extracted", ext.channel),
            })?;
            let header = build_header(meta, decoded.width, decoded.height, ext.comment, &created);
            let plane = ImagePlane {
                name: ext.channel.extname(),
                width: decoded.width,
                height: decoded.height,
                bits: decoded.bits,
                data,
            };
            stream.write_image(&header, plane).map_err(write_err)?;
        }
        stream.finish().map_err(write_err)
    }

    fn abort(&self, path: &Path, err: ConversionError) -> FileOutcome {
        self.transition(path, FileState::Aborted);
        if let ConversionError::Cancelled(_) = err {
            self.reporter.on_log(LogLevel::Debug, &format!("{}: {}", err.category(), err));
            return FileOutcome::Cancelled;
        }
        self.report(&err);
        FileOutcome::Failed
    }

    fn report(&self, err: &ConversionError) {
        self.reporter
            .on_log(LogLevel::Error, &format!("{}: {}", err.category(), err));
    }

    fn transition(&self, path: &Path, state: FileState) {
        tracing::trace!("{:?} -> {:?}", path.file_name().unwrap_or_default(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteError;
    use crate::fits::testing::{comments, FitsReadback};
    use crate::fits::{FitsStream, FitsioEncoder, Header};
    use crate::job::ImageSetup;
    use crate::naming::{FrameMode, NamingPolicy};
    use crate::testing::{FakeDecoder, RecordingReporter};
    use std::path::PathBuf;

    fn settings(output_dir: PathBuf, mode: FrameMode, overwrite: bool) -> JobSettings {
        JobSettings {
            input_dir: PathBuf::from("/in"),
            output_dir,
            naming: NamingPolicy::RawName,
            overwrite,
            image: ImageSetup {
                mode,
                ..Default::default()
            },
            workers: Some(1),
            metadata: FileMetadata {
                object: "M31".to_string(),
                ..Default::default()
            },
            metadata_policy: MetadataPolicy::Isolated,
        }
    }

    fn converter(
        settings: JobSettings,
        decoder: FakeDecoder,
        reporter: Arc<RecordingReporter>,
    ) -> FileConverter {
        converter_with(settings, decoder, FitsioEncoder::new(), reporter)
    }

    fn converter_with(
        settings: JobSettings,
        decoder: FakeDecoder,
        encoder: impl FitsEncoder + 'static,
        reporter: Arc<RecordingReporter>,
    ) -> FileConverter {
        FileConverter::new(
            Arc::new(settings),
            Arc::new(decoder),
            Arc::new(encoder),
            reporter,
            CancelToken::new(),
        )
    }

    /// Writes through the cfitsio encoder but refuses some files or images.
    #[derive(Default)]
    struct FlakyEncoder {
        /// Refuse to create outputs whose name ends with this
        refuse_suffix: Option<&'static str>,
        /// Images each stream accepts before failing
        fail_after: Option<usize>,
    }

    impl FitsEncoder for FlakyEncoder {
        fn create(&self, path: &Path) -> Result<Box<dyn FitsStream>, WriteError> {
            if let Some(suffix) = self.refuse_suffix {
                if path.to_string_lossy().ends_with(suffix) {
                    return Err(WriteError::Image("device not ready".into()));
                }
            }
            Ok(Box::new(FlakyStream {
                inner: FitsioEncoder::new().create(path)?,
                remaining: self.fail_after,
            }))
        }
    }

    struct FlakyStream {
        inner: Box<dyn FitsStream>,
        remaining: Option<usize>,
    }

    impl FitsStream for FlakyStream {
        fn write_image(&mut self, header: &Header, image: ImagePlane<'_>) -> Result<(), WriteError> {
            match self.remaining.as_mut() {
                Some(0) => return Err(WriteError::Image("disk full".into())),
                Some(n) => *n -= 1,
                None => {}
            }
            self.inner.write_image(header, image)
        }

        fn finish(self: Box<Self>) -> Result<(), WriteError> {
            self.inner.finish()
        }
    }

    #[test]
    fn test_all_channels_single_file() {
        let out = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let conv = converter(
            settings(out.path().to_path_buf(), FrameMode::AllChannels, false),
            FakeDecoder::new(4, 3),
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Converted);
        let path = out.path().join("a_RGB.fits");
        let mut fits = FitsReadback::open(&path);
        assert_eq!(fits.hdu_count(), 3);
        let expected = FakeDecoder::new(4, 3).rgb();
        for i in 0..3 {
            let plane: Vec<u16> = expected.chunks(3).map(|px| px[i]).collect();
            assert_eq!(fits.data(i), plane);
        }
        assert_eq!(fits.key::<String>(1, "EXTNAME"), "GREEN");
        assert_eq!(fits.key::<String>(0, "INSTRUME"), "Canon EOS 6D");
        assert_eq!(comments(&path), ["R channel", "G channel", "B channel"]);
    }

    #[test]
    fn test_by_files_checks_each_target() {
        let out = tempfile::tempdir().unwrap();
        std::fs::write(out.path().join("a_GREEN.fits"), b"keep").unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let conv = converter(
            settings(out.path().to_path_buf(), FrameMode::AllChannelsByFiles, false),
            FakeDecoder::new(2, 2),
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Converted);
        assert!(out.path().join("a_RED.fits").exists());
        assert!(out.path().join("a_BLUE.fits").exists());
        assert_eq!(std::fs::read(out.path().join("a_GREEN.fits")).unwrap(), b"keep");
        assert!(reporter.has_log(LogLevel::Info, "file exists"));
    }

    #[test]
    fn test_overwrite_replaces_existing() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("a_AVG_GRAY.fits");
        std::fs::write(&target, b"stale").unwrap();
        let conv = converter(
            settings(out.path().to_path_buf(), FrameMode::Grayscale, true),
            FakeDecoder::new(2, 2),
            Arc::new(RecordingReporter::default()),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Converted);
        let mut fits = FitsReadback::open(&target);
        assert_eq!(fits.hdu_count(), 1);
        assert_eq!(comments(&target), ["Average of R, G and B channels"]);
    }

    #[test]
    fn test_existing_output_is_skipped() {
        let out = tempfile::tempdir().unwrap();
        std::fs::write(out.path().join("a_BLUE.fits"), b"keep").unwrap();
        let conv = converter(
            settings(out.path().to_path_buf(), FrameMode::BlueOnly, false),
            FakeDecoder::new(2, 2),
            Arc::new(RecordingReporter::default()),
        );
        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Skipped);
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let out = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let conv = converter(
            settings(out.path().to_path_buf(), FrameMode::RedOnly, false),
            FakeDecoder::new(2, 2).failing("bad.cr2"),
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/bad.cr2")), FileOutcome::Failed);
        assert!(reporter.has_log(LogLevel::Error, "DecodeError"));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_bad_geometry_is_plane_error() {
        let out = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let conv = converter(
            settings(out.path().to_path_buf(), FrameMode::RedOnly, false),
            FakeDecoder::new(2, 2).truncated(),
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Failed);
        assert!(reporter.has_log(LogLevel::Error, "PlaneError"));
    }

    #[test]
    fn test_missing_output_dir_is_write_error() {
        let out = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let conv = converter(
            settings(out.path().join("missing"), FrameMode::RedOnly, false),
            FakeDecoder::new(2, 2),
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Failed);
        assert!(reporter.has_log(LogLevel::Error, "WriteError"));
    }

    #[test]
    fn test_failed_target_does_not_block_others() {
        let out = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let encoder = FlakyEncoder {
            refuse_suffix: Some("_RED.fits"),
            ..Default::default()
        };
        let conv = converter_with(
            settings(out.path().to_path_buf(), FrameMode::AllChannelsByFiles, false),
            FakeDecoder::new(2, 2),
            encoder,
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Failed);
        assert!(reporter.has_log(LogLevel::Error, "WriteError"));
        assert!(!out.path().join("a_RED.fits").exists());
        assert!(out.path().join("a_GREEN.fits").exists());
        assert!(out.path().join("a_BLUE.fits").exists());
    }

    #[test]
    fn test_undeletable_target_is_filesystem_error() {
        let out = tempfile::tempdir().unwrap();
        // remove_file cannot delete a directory
        std::fs::create_dir(out.path().join("a_RED.fits")).unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let conv = converter(
            settings(out.path().to_path_buf(), FrameMode::AllChannelsByFiles, true),
            FakeDecoder::new(2, 2),
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Failed);
        assert!(reporter.has_log(LogLevel::Error, "FilesystemError"));
        assert!(out.path().join("a_RED.fits").is_dir());
        assert!(out.path().join("a_GREEN.fits").is_file());
        assert!(out.path().join("a_BLUE.fits").is_file());
    }

    #[test]
    fn test_partial_write_keeps_written_extensions() {
        let out = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let encoder = FlakyEncoder {
            fail_after: Some(1),
            ..Default::default()
        };
        let conv = converter_with(
            settings(out.path().to_path_buf(), FrameMode::AllChannels, false),
            FakeDecoder::new(2, 2),
            encoder,
            reporter.clone(),
        );

        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Failed);
        assert!(reporter.has_log(LogLevel::Error, "WriteError"));
        assert!(reporter.has_log(LogLevel::Error, "disk full"));

        let mut fits = FitsReadback::open(&out.path().join("a_RGB.fits"));
        assert_eq!(fits.hdu_count(), 1);
        let red: Vec<u16> = FakeDecoder::new(2, 2).rgb().chunks(3).map(|px| px[0]).collect();
        assert_eq!(fits.data(0), red);
    }

    #[test]
    fn test_cancelled_before_start() {
        let out = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let conv = FileConverter::new(
            Arc::new(settings(out.path().to_path_buf(), FrameMode::RedOnly, false)),
            Arc::new(FakeDecoder::new(2, 2)),
            Arc::new(FitsioEncoder::new()),
            Arc::new(RecordingReporter::default()),
            cancel,
        );
        assert_eq!(conv.convert(Path::new("/in/a.cr2")), FileOutcome::Cancelled);
    }

    #[test]
    fn test_metadata_store_policies() {
        let defaults = FileMetadata {
            instrument: "Custom rig".to_string(),
            ..Default::default()
        };
        let canon = CameraInfo {
            make: "Canon".into(),
            model: "EOS 6D".into(),
            ..Default::default()
        };
        let nikon = CameraInfo {
            make: "Nikon".into(),
            model: "D810A".into(),
            ..Default::default()
        };

        let isolated = MetadataStore::new(defaults.clone(), MetadataPolicy::Isolated);
        assert_eq!(isolated.merged(&canon).instrument, "Custom rig");
        assert_eq!(isolated.merged(&nikon).instrument, "Custom rig");

        let empty = MetadataStore::new(FileMetadata::default(), MetadataPolicy::Latched);
        assert_eq!(empty.merged(&canon).instrument, "Canon EOS 6D");
        // Flag latched by the first merge
        assert_eq!(empty.merged(&nikon).instrument, "Nikon D810A");
    }
}
