//! Camera vendor detection by file extension.

use std::fmt;
use std::path::Path;

/// Camera vendors whose RAW formats are accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Canon,
    Nikon,
    Sony,
    Fuji,
    Hasselblad,
    Olympus,
    Pentax,
    AdobeDng,
    KonicaMinolta,
}

const VENDOR_EXTENSIONS: [(&str, Vendor); 9] = [
    ("cr2", Vendor::Canon),
    ("nef", Vendor::Nikon),
    ("arw", Vendor::Sony),
    ("raf", Vendor::Fuji),
    ("3fr", Vendor::Hasselblad),
    ("orf", Vendor::Olympus),
    ("pef", Vendor::Pentax),
    ("dng", Vendor::AdobeDng),
    ("mrw", Vendor::KonicaMinolta),
];

impl Vendor {
    pub fn name(&self) -> &'static str {
        match self {
            Vendor::Canon => "Canon",
            Vendor::Nikon => "Nikon",
            Vendor::Sony => "Sony",
            Vendor::Fuji => "Fuji",
            Vendor::Hasselblad => "Hasselblad",
            Vendor::Olympus => "Olympus",
            Vendor::Pentax => "Pentax",
            Vendor::AdobeDng => "Adobe DNG",
            Vendor::KonicaMinolta => "Konica Minolta",
        }
    }

    /// Lowercase extensions recognised as RAW input.
    pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
        VENDOR_EXTENSIONS.iter().map(|(ext, _)| *ext)
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a file name by its last `.`-delimited extension.
///
/// Returns `None` for names without an extension or with an unsupported one.
pub fn classify(name: &str) -> Option<Vendor> {
    let lower = name.to_lowercase();
    let (_, ext) = lower.rsplit_once('.')?;
    VENDOR_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, vendor)| *vendor)
}

/// Classify a path by its file name component.
pub fn classify_path(path: &Path) -> Option<Vendor> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(classify)
}
