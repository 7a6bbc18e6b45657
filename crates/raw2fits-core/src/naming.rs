//! Output file naming and per-file output plans.
//!
//! A [`FrameMode`] decides which channels are written and how they are laid
//! out across files; a [`NamingPolicy`] decides the stem of each file name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::metadata::FileMetadata;

const NO_DATE: &str = "NO_DATE";
const NO_FILTER: &str = "NO_FILTER";

/// How output file names are composed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// `<raw stem><suffix>`
    #[default]
    RawName,
    /// `<object>_<date><suffix>`
    ObjectDatetime,
    /// `<object>_<filter>_<date><suffix>`
    ObjectFilterDatetime,
    /// `<raw stem>_<date><suffix>`
    RawDatetime,
}

impl TryFrom<u8> for NamingPolicy {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(NamingPolicy::RawName),
            1 => Ok(NamingPolicy::ObjectDatetime),
            2 => Ok(NamingPolicy::ObjectFilterDatetime),
            3 => Ok(NamingPolicy::RawDatetime),
            other => Err(format!("naming policy {other} is out of range 0-3")),
        }
    }
}

/// Which channels are written, and into how many files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameMode {
    /// One file with the average of R, G and B
    #[default]
    Grayscale,
    /// Three files, one per colour channel
    AllChannelsByFiles,
    /// One file with three image extensions
    AllChannels,
    RedOnly,
    GreenOnly,
    BlueOnly,
}

impl TryFrom<u8> for FrameMode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(FrameMode::Grayscale),
            1 => Ok(FrameMode::AllChannelsByFiles),
            2 => Ok(FrameMode::AllChannels),
            3 => Ok(FrameMode::RedOnly),
            4 => Ok(FrameMode::GreenOnly),
            5 => Ok(FrameMode::BlueOnly),
            other => Err(format!("output mode {other} is out of range 0-5")),
        }
    }
}

/// A single output plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Gray,
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const RGB: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// File name suffix used when this channel is written on its own.
    pub fn suffix(&self) -> &'static str {
        match self {
            Channel::Gray => "_AVG_GRAY.fits",
            Channel::Red => "_RED.fits",
            Channel::Green => "_GREEN.fits",
            Channel::Blue => "_BLUE.fits",
        }
    }

    /// `EXTNAME` of the image extension holding this channel.
    pub fn extname(&self) -> &'static str {
        match self {
            Channel::Gray => "GRAY",
            Channel::Red => "RED",
            Channel::Green => "GREEN",
            Channel::Blue => "BLUE",
        }
    }

    /// `COMMENT` record attached to the extension holding this channel.
    pub fn comment(&self) -> &'static str {
        match self {
            Channel::Gray => "Average of R, G and B channels",
            Channel::Red => "R channel",
            Channel::Green => "G channel",
            Channel::Blue => "B channel",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Gray => "gray",
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        };
        f.write_str(name)
    }
}

const RGB_SUFFIX: &str = "_RGB.fits";

/// One image extension to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedExtension {
    pub channel: Channel,
    pub comment: &'static str,
}

impl From<Channel> for PlannedExtension {
    fn from(channel: Channel) -> Self {
        Self {
            channel,
            comment: channel.comment(),
        }
    }
}

/// One output file and the extensions it will contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub extensions: Vec<PlannedExtension>,
}

/// Every file to be written for one RAW input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub targets: Vec<OutputTarget>,
}

impl OutputPlan {
    pub fn new(
        output_dir: &Path,
        source: &Path,
        policy: NamingPolicy,
        mode: FrameMode,
        meta: &FileMetadata,
    ) -> Self {
        let single = |channel: Channel| OutputTarget {
            path: resolve(output_dir, source, policy, meta, channel.suffix()),
            extensions: vec![channel.into()],
        };

        let targets = match mode {
            FrameMode::Grayscale => vec![single(Channel::Gray)],
            FrameMode::RedOnly => vec![single(Channel::Red)],
            FrameMode::GreenOnly => vec![single(Channel::Green)],
            FrameMode::BlueOnly => vec![single(Channel::Blue)],
            FrameMode::AllChannelsByFiles => Channel::RGB.into_iter().map(single).collect(),
            FrameMode::AllChannels => vec![OutputTarget {
                path: resolve(output_dir, source, policy, meta, RGB_SUFFIX),
                extensions: Channel::RGB.into_iter().map(Into::into).collect(),
            }],
        };

        Self { targets }
    }
}

/// Compose the output path for `source` under `output_dir`.
///
/// Spaces in the composed file name are replaced with underscores; the output
/// directory is used as given.
pub fn resolve(
    output_dir: &Path,
    source: &Path,
    policy: NamingPolicy,
    meta: &FileMetadata,
    suffix: &str,
) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let object = non_empty_or(&meta.object, &stem);
    let date = non_empty_or(&meta.date, NO_DATE);

    let name = match policy {
        NamingPolicy::RawName => format!("{stem}{suffix}"),
        NamingPolicy::RawDatetime => format!("{stem}_{date}{suffix}"),
        NamingPolicy::ObjectDatetime => format!("{object}_{date}{suffix}"),
        NamingPolicy::ObjectFilterDatetime => {
            let filter = non_empty_or(&meta.filter, NO_FILTER);
            format!("{object}_{filter}_{date}{suffix}")
        }
    };

    output_dir.join(sanitize(&name))
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Replace every space with an underscore.
pub fn sanitize(name: &str) -> String {
    name.replace(' ', "_")
}
