//! RAW decoding: the [`RawDecoder`] seam and its default implementation.
//!
//! Decoders turn a RAW file into interleaved `R, G, B` samples plus the camera
//! metadata the merger needs. [`RawloaderDecoder`] unpacks sensor data with
//! `rawloader` and reads artist, capture time and shutter speed from EXIF.

use chrono::{DateTime, NaiveDate, Utc};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{DecodeError, DecodeStage};
use crate::metadata::CameraInfo;
use crate::pool::CancelToken;

/// Decoder switches taken from the job's image setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Stretch the brightest sample to full scale
    pub auto_bright: bool,
    /// Produce a full-resolution image instead of 2x2 superpixels
    pub interpolation: bool,
    /// Rescale samples from the camera's black/white levels to 16 bits
    pub autoscale: bool,
}

/// A decoded image ready for plane extraction.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: usize,
    pub height: usize,
    /// Significant bits per sample, 8 or 16
    pub bits: u8,
    /// Interleaved `R, G, B` samples, `width * height * 3` long
    pub rgb: Vec<u16>,
    pub camera: CameraInfo,
}

impl DecodedImage {
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Check that the sample buffer matches the declared geometry.
    pub fn check_geometry(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("empty image {}x{}", self.width, self.height));
        }
        let expected = self.pixel_count() * 3;
        if self.rgb.len() != expected {
            return Err(format!(
                "expected {} RGB samples for {}x{}, got {}",
                expected,
                self.width,
                self.height,
                self.rgb.len()
            ));
        }
        Ok(())
    }
}

/// RAW decoding engine used by the conversion workers.
///
/// Implementations should poll `cancel` between stages and return
/// [`DecodeError::Cancelled`] once it is set.
pub trait RawDecoder: Send + Sync {
    fn decode(
        &self,
        path: &Path,
        options: &DecodeOptions,
        cancel: &CancelToken,
    ) -> Result<DecodedImage, DecodeError>;
}

/// Rows between two cancellation polls while binning.
const CANCEL_POLL_ROWS: usize = 64;

/// Default decoder backed by `rawloader` and `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawloaderDecoder;

impl RawloaderDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl RawDecoder for RawloaderDecoder {
    fn decode(
        &self,
        path: &Path,
        options: &DecodeOptions,
        cancel: &CancelToken,
    ) -> Result<DecodedImage, DecodeError> {
        check_cancel(cancel)?;
        File::open(path).map_err(|e| DecodeError::new(DecodeStage::Open, e.to_string()))?;

        let raw = rawloader::decode_file(path)
            .map_err(|e| DecodeError::new(DecodeStage::Unpack, format!("{:?}", e)))?;
        tracing::trace!(
            "Unpacked {:?}: {}x{} cpp={} cfa={:?}",
            path,
            raw.width,
            raw.height,
            raw.cpp,
            raw.cfa.name
        );
        check_cancel(cancel)?;

        let mut samples: Vec<u16> = match &raw.data {
            rawloader::RawImageData::Integer(values) => values.clone(),
            rawloader::RawImageData::Float(values) => values
                .iter()
                .map(|&v| (v * 65535.0).clamp(0.0, 65535.0) as u16)
                .collect(),
        };

        if options.autoscale {
            rescale_levels(&mut samples, raw.blacklevels[0], raw.whitelevels[0]);
        }

        let (width, height, mut rgb) = if raw.cpp == 3 {
            (raw.width, raw.height, samples)
        } else if raw.cfa.name.is_empty() {
            let rgb = samples.iter().flat_map(|&v| [v, v, v]).collect();
            (raw.width, raw.height, rgb)
        } else {
            bin_cfa(
                &samples,
                raw.width,
                raw.height,
                |row, col| raw.cfa.color_at(row, col),
                options.interpolation,
                cancel,
            )?
        };

        if options.auto_bright {
            stretch_to_full_scale(&mut rgb);
        }

        let exif = read_exif(path);
        let camera = CameraInfo {
            make: non_empty(&raw.clean_make).or(exif.make).unwrap_or_default(),
            model: non_empty(&raw.clean_model)
                .or(exif.model)
                .unwrap_or_default(),
            artist: exif.artist,
            captured_at: exif.captured_at,
            shutter: exif.shutter,
        };

        let decoded = DecodedImage {
            width,
            height,
            bits: 16,
            rgb,
            camera,
        };
        decoded
            .check_geometry()
            .map_err(|msg| DecodeError::new(DecodeStage::RawToImage, msg))?;
        Ok(decoded)
    }
}

fn check_cancel(cancel: &CancelToken) -> Result<(), DecodeError> {
    if cancel.is_cancelled() {
        Err(DecodeError::Cancelled)
    } else {
        Ok(())
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Map `black..=white` onto the full 16-bit range.
fn rescale_levels(samples: &mut [u16], black: u16, white: u16) {
    if white <= black {
        return;
    }
    let span = u64::from(white - black);
    for v in samples.iter_mut() {
        let level = u64::from(v.saturating_sub(black));
        *v = (level * 65535 / span).min(65535) as u16;
    }
}

/// Scale every sample so the brightest one reaches 65535.
fn stretch_to_full_scale(samples: &mut [u16]) {
    let peak = samples.iter().copied().max().unwrap_or(0);
    if peak == 0 || peak == u16::MAX {
        return;
    }
    let peak = u64::from(peak);
    for v in samples.iter_mut() {
        *v = (u64::from(*v) * 65535 / peak).min(65535) as u16;
    }
}

/// Collapse each 2x2 CFA block into one RGB pixel.
///
/// `color_at` returns 0 for red, 1 or 3 for green and 2 for blue. With
/// `full_size`, each block's colour is repeated over its four photosites.
fn bin_cfa<F>(
    samples: &[u16],
    width: usize,
    height: usize,
    color_at: F,
    full_size: bool,
    cancel: &CancelToken,
) -> Result<(usize, usize, Vec<u16>), DecodeError>
where
    F: Fn(usize, usize) -> usize,
{
    if samples.len() < width * height {
        return Err(DecodeError::new(
            DecodeStage::RawToImage,
            format!(
                "sensor buffer holds {} samples, expected {}x{}",
                samples.len(),
                width,
                height
            ),
        ));
    }
    let (blocks_w, blocks_h) = (width / 2, height / 2);
    if blocks_w == 0 || blocks_h == 0 {
        return Err(DecodeError::new(
            DecodeStage::RawToImage,
            format!("sensor too small to bin: {}x{}", width, height),
        ));
    }

    let mut blocks = Vec::with_capacity(blocks_w * blocks_h * 3);
    for by in 0..blocks_h {
        if by % CANCEL_POLL_ROWS == 0 {
            check_cancel(cancel)?;
        }
        for bx in 0..blocks_w {
            let mut sums = [0u32; 3];
            let mut counts = [0u32; 3];
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let (row, col) = (by * 2 + dy, bx * 2 + dx);
                let slot = match color_at(row, col) {
                    0 => 0,
                    2 => 2,
                    _ => 1,
                };
                sums[slot] += u32::from(samples[row * width + col]);
                counts[slot] += 1;
            }
            for slot in 0..3 {
                let value = if counts[slot] == 0 {
                    0
                } else {
                    sums[slot] / counts[slot]
                };
                blocks.push(value as u16);
            }
        }
    }

    if !full_size {
        return Ok((blocks_w, blocks_h, blocks));
    }

    let (out_w, out_h) = (blocks_w * 2, blocks_h * 2);
    let mut rgb = Vec::with_capacity(out_w * out_h * 3);
    for row in 0..out_h {
        if row % CANCEL_POLL_ROWS == 0 {
            check_cancel(cancel)?;
        }
        for col in 0..out_w {
            let block = ((row / 2) * blocks_w + col / 2) * 3;
            rgb.extend_from_slice(&blocks[block..block + 3]);
        }
    }
    Ok((out_w, out_h, rgb))
}

/// Camera fields read from the EXIF block of TIFF-based RAW containers.
#[derive(Debug, Default)]
struct ExifFields {
    make: Option<String>,
    model: Option<String>,
    artist: Option<String>,
    captured_at: Option<DateTime<Utc>>,
    shutter: Option<f64>,
}

/// Read EXIF fields; any failure yields empty fields.
fn read_exif(path: &Path) -> ExifFields {
    let Ok(file) = File::open(path) else {
        return ExifFields::default();
    };
    let mut reader = BufReader::new(file);
    let Ok(exif) = Reader::new().read_from_container(&mut reader) else {
        tracing::debug!("No EXIF block in {:?}", path);
        return ExifFields::default();
    };

    ExifFields {
        make: get_string(&exif, Tag::Make),
        model: get_string(&exif, Tag::Model),
        artist: get_string(&exif, Tag::Artist),
        captured_at: get_datetime(&exif),
        shutter: exif
            .get_field(Tag::ExposureTime, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Rational(v) => v.first().map(|r| r.to_f64()),
                _ => None,
            }),
    }
}

fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY).and_then(|f| {
        let s = f.display_value().to_string();
        non_empty(s.trim_matches('"'))
    })
}

/// Capture time, preferring DateTimeOriginal. The camera clock is taken as UTC.
fn get_datetime(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;
    let Value::Ascii(ref values) = field.value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(values.first()?).ok()?;
    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(u32::from(dt.hour), u32::from(dt.minute), u32::from(dt.second))?;
    Some(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    // RGGB layout
    fn rggb(row: usize, col: usize) -> usize {
        match (row % 2, col % 2) {
            (0, 0) => 0,
            (1, 1) => 2,
            _ => 1,
        }
    }

    #[test]
    fn test_bin_cfa_superpixels() {
        #[rustfmt::skip]
        let samples = [
            100, 10, 200, 20,
            30, 50, 40, 60,
        ];
        let (w, h, rgb) =
            bin_cfa(&samples, 4, 2, rggb, false, &CancelToken::new()).unwrap();
        assert_eq!((w, h), (2, 1));
        assert_eq!(rgb, vec![100, 20, 50, 200, 30, 60]);
    }

    #[test]
    fn test_bin_cfa_full_size_repeats_blocks() {
        let samples = [100, 10, 30, 50];
        let (w, h, rgb) = bin_cfa(&samples, 2, 2, rggb, true, &CancelToken::new()).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(rgb.len(), 12);
        assert!(rgb.chunks(3).all(|px| px == [100, 20, 50]));
    }

    #[test]
    fn test_bin_cfa_honours_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = bin_cfa(&[0; 16], 4, 4, rggb, false, &cancel).unwrap_err();
        assert!(matches!(err, DecodeError::Cancelled));
    }

    #[test]
    fn test_bin_cfa_rejects_short_buffer() {
        let err = bin_cfa(&[0; 3], 2, 2, rggb, false, &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("raw2image"));
    }

    #[test]
    fn test_rescale_levels() {
        let mut samples = [0u16, 512, 4095];
        rescale_levels(&mut samples, 512, 4095);
        assert_eq!(samples, [0, 0, 65535]);
    }

    #[test]
    fn test_stretch_to_full_scale() {
        let mut samples = [0u16, 100, 200];
        stretch_to_full_scale(&mut samples);
        assert_eq!(samples[2], 65535);
        assert_eq!(samples[1], 32767);
    }

    #[test]
    fn test_check_geometry() {
        let img = DecodedImage {
            width: 2,
            height: 1,
            bits: 16,
            rgb: vec![0; 5],
            camera: CameraInfo::default(),
        };
        assert!(img.check_geometry().is_err());
    }

    #[test]
    fn test_decode_missing_file_is_open_error() {
        let err = RawloaderDecoder::new()
            .decode(
                Path::new("/nonexistent/a.cr2"),
                &DecodeOptions::default(),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Failed {
                stage: DecodeStage::Open,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_garbage_is_unpack_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cr2");
        std::fs::write(&path, b"not a raw file").unwrap();

        let err = RawloaderDecoder::new()
            .decode(&path, &DecodeOptions::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Failed {
                stage: DecodeStage::Unpack,
                ..
            }
        ));
    }

    #[test]
    fn test_read_exif_missing_file_is_empty() {
        let fields = read_exif(Path::new("/nonexistent/file.nef"));
        assert!(fields.make.is_none());
        assert!(fields.captured_at.is_none());
    }
}
