//! FITS output: header records, the [`FitsEncoder`] seam and the cfitsio writer.
//!
//! [`FitsioEncoder`] puts the first image into the primary HDU and every
//! further image into an `IMAGE` extension. 16-bit samples are stored as
//! `BITPIX = 16` with `BZERO = 32768`, the FITS convention for unsigned
//! integers.

use chrono::{DateTime, Utc};
use fitsio::hdu::FitsHdu;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use std::path::{Path, PathBuf};

use crate::error::WriteError;
use crate::metadata::FileMetadata;

/// A typed header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Float(f64),
    Int(i64),
}

/// One header record.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderCard {
    Value { key: String, value: HeaderValue },
    Comment(String),
}

/// Ordered header records for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<HeaderCard>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: HeaderValue) -> &mut Self {
        self.cards.push(HeaderCard::Value {
            key: key.to_uppercase(),
            value,
        });
        self
    }

    pub fn push_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.push(key, HeaderValue::Str(value.to_string()))
    }

    pub fn push_float(&mut self, key: &str, value: f64) -> &mut Self {
        self.push(key, HeaderValue::Float(value))
    }

    pub fn push_comment(&mut self, text: &str) -> &mut Self {
        self.cards.push(HeaderCard::Comment(text.to_string()));
        self
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.iter().find_map(|card| match card {
            HeaderCard::Value { key: k, value } if k == key => Some(value),
            _ => None,
        })
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().filter_map(|card| match card {
            HeaderCard::Comment(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn cards(&self) -> &[HeaderCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Build the record set written with every image extension.
pub fn build_header(
    meta: &FileMetadata,
    width: usize,
    height: usize,
    comment: &str,
    created: &DateTime<Utc>,
) -> Header {
    let mut header = Header::new();
    header
        .push_str("OBJECT", &meta.object)
        .push_str("TELESCOP", &meta.telescope)
        .push_float("APTDIA", meta.tele_aperture)
        .push_float("FOCALLEN", meta.tele_focal)
        .push_str("INSTRUME", &meta.instrument)
        .push_str("OBSERVER", &meta.observer)
        .push_str("FILTER", &meta.filter)
        .push_float("EXPTIME", meta.exposure)
        .push_float("CCD-TEMP", meta.temperature)
        .push_str("DATE-OBS", &meta.date)
        .push_str("OBSERVAT", &meta.observatory)
        .push_str("SITENAME", &meta.site_name)
        .push_float("SITELAT", meta.site_lat)
        .push_float("SITELONG", meta.site_lon)
        .push_float("SITEELEV", meta.site_elev)
        .push_str("NOTES", &meta.note);

    // RA is kept in hours
    let ra = meta.ra.map(|c| (c, c.to_degrees() * 15.0));
    let dec = meta.dec.map(|c| (c, c.to_degrees()));
    if let Some((coord, degrees)) = ra {
        header
            .push_str("OBJCTRA", &coord.to_sexagesimal_string())
            .push_float("RA", degrees);
    }
    if let Some((coord, degrees)) = dec {
        header
            .push_str("OBJCTDEC", &coord.to_sexagesimal_string())
            .push_float("DEC", degrees);
    }
    if let (Some((_, ra_deg)), Some((_, dec_deg))) = (ra, dec) {
        header
            .push_float("EQUINOX", 2000.0)
            .push_str("CTYPE1", "RA---TAN")
            .push_str("CTYPE2", "DEC--TAN")
            .push_str("CUNIT1", "deg")
            .push_str("CUNIT2", "deg")
            .push_float("CRPIX1", (width as f64 + 1.0) / 2.0)
            .push_float("CRPIX2", (height as f64 + 1.0) / 2.0)
            .push_float("CRVAL1", ra_deg)
            .push_float("CRVAL2", dec_deg);
    }

    header
        .push_str("DATE", &created.format("%Y-%m-%dT%H:%M:%S").to_string())
        .push_str("CREATOR", &format!("raw2fits {}", crate::VERSION))
        .push_comment(comment);
    header
}

/// One plane of pixels handed to a [`FitsStream`].
#[derive(Debug, Clone, Copy)]
pub struct ImagePlane<'a> {
    /// `EXTNAME` used when the plane lands in an extension
    pub name: &'a str,
    pub width: usize,
    pub height: usize,
    /// 8 or 16
    pub bits: u8,
    pub data: &'a [u16],
}

/// Factory for FITS output files.
pub trait FitsEncoder: Send + Sync {
    /// Create a new file at `path`. Fails if the file already exists.
    fn create(&self, path: &Path) -> Result<Box<dyn FitsStream>, WriteError>;
}

/// An open FITS file accepting image HDUs in order.
pub trait FitsStream {
    fn write_image(&mut self, header: &Header, image: ImagePlane<'_>) -> Result<(), WriteError>;

    /// Flush and close the file.
    fn finish(self: Box<Self>) -> Result<(), WriteError>;
}

/// Writer backed by cfitsio through the `fitsio` crate.
///
/// The file is only created once the first image arrives, because that image
/// becomes the primary HDU and defines its shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct FitsioEncoder;

impl FitsioEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl FitsEncoder for FitsioEncoder {
    fn create(&self, path: &Path) -> Result<Box<dyn FitsStream>, WriteError> {
        if path.exists() {
            return Err(WriteError::Exists(path.to_path_buf()));
        }
        Ok(Box::new(FitsioStream {
            path: path.to_path_buf(),
            file: None,
        }))
    }
}

struct FitsioStream {
    path: PathBuf,
    file: Option<FitsFile>,
}

impl FitsioStream {
    /// Open the HDU for the next image: primary on first use, extension after.
    fn next_hdu(
        &mut self,
        name: &str,
        description: &ImageDescription<'_>,
    ) -> Result<(&mut FitsFile, FitsHdu), WriteError> {
        let (fptr, hdu) = match self.file.take() {
            Some(mut fptr) => {
                let hdu = fptr
                    .create_image(name.to_string(), description)
                    .map_err(WriteError::Create)?;
                (fptr, hdu)
            }
            None => {
                let mut fptr = FitsFile::create(&self.path)
                    .with_custom_primary(description)
                    .open()
                    .map_err(WriteError::Create)?;
                let hdu = fptr.primary_hdu().map_err(WriteError::Create)?;
                (fptr, hdu)
            }
        };
        Ok((self.file.insert(fptr), hdu))
    }
}

impl FitsStream for FitsioStream {
    fn write_image(&mut self, header: &Header, image: ImagePlane<'_>) -> Result<(), WriteError> {
        if image.data.len() != image.width * image.height {
            return Err(WriteError::Image(format!(
                "plane holds {} samples, expected {}x{}",
                image.data.len(),
                image.width,
                image.height
            )));
        }
        let data_type = match image.bits {
            8 => ImageType::UnsignedByte,
            16 => ImageType::UnsignedShort,
            other => return Err(WriteError::Image(format!("unsupported bit depth {other}"))),
        };
        // NAXIS order is reversed: [NAXIS2, NAXIS1]
        let description = ImageDescription {
            data_type,
            dimensions: &[image.height, image.width],
        };

        let (fptr, hdu) = self.next_hdu(image.name, &description)?;
        for card in header.cards() {
            match card {
                HeaderCard::Value { key, value } => match value {
                    HeaderValue::Str(s) => hdu.write_key(fptr, key, ascii_only(s).as_str()),
                    HeaderValue::Float(v) => hdu.write_key(fptr, key, *v),
                    HeaderValue::Int(v) => hdu.write_key(fptr, key, *v),
                },
                HeaderCard::Comment(text) => write_comment(fptr, &ascii_only(text)),
            }
            .map_err(WriteError::Header)?;
        }

        if image.bits == 8 {
            let bytes: Vec<u8> = image.data.iter().map(|&v| v.min(255) as u8).collect();
            hdu.write_image(fptr, &bytes).map_err(WriteError::Pixels)
        } else {
            hdu.write_image(fptr, image.data).map_err(WriteError::Pixels)
        }
    }

    fn finish(self: Box<Self>) -> Result<(), WriteError> {
        // cfitsio flushes and closes on drop
        if self.file.is_none() {
            FitsFile::create(&self.path)
                .open()
                .map_err(WriteError::Create)?;
        }
        Ok(())
    }
}

/// fitsio 0.21 has no COMMENT writer; call cfitsio's `fits_write_comment` directly.
fn write_comment(fptr: &mut FitsFile, text: &str) -> fitsio::errors::Result<()> {
    let c_text = std::ffi::CString::new(text).map_err(fitsio::errors::Error::from)?;
    let mut status = 0;
    unsafe {
        fitsio::sys::ffpcom(fptr.as_raw(), c_text.as_ptr(), &mut status);
    }
    fitsio::errors::check_status(status)
}

/// cfitsio only accepts printable ASCII in header records.
fn ascii_only(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}
