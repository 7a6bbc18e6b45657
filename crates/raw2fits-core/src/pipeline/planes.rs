//! Splitting interleaved RGB pixel data into per-channel planes.

use std::collections::HashMap;

use crate::naming::Channel;

/// Build one plane from interleaved `R, G, B` triples.
///
/// Gray is `(R + G + B) / 3` with integer division.
pub fn extract_plane(rgb: &[u16], channel: Channel) -> Vec<u16> {
    let triples = rgb.chunks_exact(3);
    match channel {
        Channel::Red => triples.map(|px| px[0]).collect(),
        Channel::Green => triples.map(|px| px[1]).collect(),
        Channel::Blue => triples.map(|px| px[2]).collect(),
        Channel::Gray => triples
            .map(|px| ((u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2])) / 3) as u16)
            .collect(),
    }
}

/// Planes built for one decoded image, keyed by channel.
#[derive(Debug, Default)]
pub struct Planes {
    planes: HashMap<Channel, Vec<u16>>,
}

impl Planes {
    /// Build each requested channel once.
    pub fn extract<I>(rgb: &[u16], channels: I) -> Self
    where
        I: IntoIterator<Item = Channel>,
    {
        let mut planes = HashMap::new();
        for channel in channels {
            planes
                .entry(channel)
                .or_insert_with(|| extract_plane(rgb, channel));
        }
        Self { planes }
    }

    pub fn get(&self, channel: Channel) -> Option<&[u16]> {
        self.planes.get(&channel).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}
