//! Argument parsers for naming policies and output modes.
//!
//! Both accept either the config-file name (`object_datetime`, `red-only`) or
//! the numeric code used by older front ends (`1`, `3`).

use raw2fits_core::{FrameMode, NamingPolicy};

/// Parse a naming policy from a name or a code in 0-3.
pub fn parse_naming(s: &str) -> Result<NamingPolicy, String> {
    if let Ok(code) = s.parse::<u8>() {
        return NamingPolicy::try_from(code);
    }
    match normalize(s).as_str() {
        "raw_name" => Ok(NamingPolicy::RawName),
        "object_datetime" => Ok(NamingPolicy::ObjectDatetime),
        "object_filter_datetime" => Ok(NamingPolicy::ObjectFilterDatetime),
        "raw_datetime" => Ok(NamingPolicy::RawDatetime),
        _ => Err(format!(
            "unknown naming policy '{s}' (expected raw_name, object_datetime, \
             object_filter_datetime, raw_datetime or 0-3)"
        )),
    }
}

/// Parse an output mode from a name or a code in 0-5.
pub fn parse_mode(s: &str) -> Result<FrameMode, String> {
    if let Ok(code) = s.parse::<u8>() {
        return FrameMode::try_from(code);
    }
    match normalize(s).as_str() {
        "grayscale" | "gray" => Ok(FrameMode::Grayscale),
        "all_channels_by_files" => Ok(FrameMode::AllChannelsByFiles),
        "all_channels" | "rgb" => Ok(FrameMode::AllChannels),
        "red_only" | "red" => Ok(FrameMode::RedOnly),
        "green_only" | "green" => Ok(FrameMode::GreenOnly),
        "blue_only" | "blue" => Ok(FrameMode::BlueOnly),
        _ => Err(format!(
            "unknown output mode '{s}' (expected grayscale, all_channels_by_files, \
             all_channels, red_only, green_only, blue_only or 0-5)"
        )),
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace('-', "_")
}
