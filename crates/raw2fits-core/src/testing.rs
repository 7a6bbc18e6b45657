//! Test doubles shared by the unit tests.

use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::decode::{DecodeOptions, DecodedImage, RawDecoder};
use crate::error::{DecodeError, DecodeStage};
use crate::metadata::CameraInfo;
use crate::pool::CancelToken;
use crate::report::{BatchSummary, JobReporter, LogLevel};

/// Decoder producing a synthetic gradient instead of reading the file.
#[derive(Debug, Clone)]
pub struct FakeDecoder {
    width: usize,
    height: usize,
    failing: HashSet<String>,
    delay: Option<Duration>,
    truncated: bool,
}

impl FakeDecoder {
    pub const CAPTURED_AT: &'static str = "2023-10-14T20:30:00";

    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            failing: HashSet::new(),
            delay: None,
            truncated: false,
        }
    }

    /// Fail with an unpack error for files with this name.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return one sample too few.
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Pixel `i` is `[i, 1000 + i, 2000 + i]`.
    pub fn rgb(&self) -> Vec<u16> {
        (0..self.width * self.height)
            .flat_map(|i| {
                let i = i as u16;
                [i, 1000 + i, 2000 + i]
            })
            .collect()
    }
}

impl RawDecoder for FakeDecoder {
    fn decode(
        &self,
        path: &Path,
        _options: &DecodeOptions,
        cancel: &CancelToken,
    ) -> Result<DecodedImage, DecodeError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&name) {
            return Err(DecodeError::new(DecodeStage::Unpack, "corrupt sensor data"));
        }

        let mut rgb = self.rgb();
        if self.truncated {
            rgb.pop();
        }
        Ok(DecodedImage {
            width: self.width,
            height: self.height,
            bits: 16,
            rgb,
            camera: CameraInfo {
                make: "Canon".to_string(),
                model: "EOS 6D".to_string(),
                artist: Some("Tester".to_string()),
                captured_at: Utc.with_ymd_and_hms(2023, 10, 14, 20, 30, 0).single(),
                shutter: Some(120.0),
            },
        })
    }
}

/// Reporter that records every callback.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    setups: Mutex<Vec<usize>>,
    updates: AtomicUsize,
    logs: Mutex<Vec<(LogLevel, String)>>,
    completions: Mutex<Vec<BatchSummary>>,
}

impl RecordingReporter {
    pub fn setups(&self) -> Vec<usize> {
        self.setups.lock().unwrap().clone()
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> Vec<BatchSummary> {
        self.completions.lock().unwrap().clone()
    }

    pub fn has_log(&self, level: LogLevel, needle: &str) -> bool {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl JobReporter for RecordingReporter {
    fn on_progress_setup(&self, total: usize) {
        self.setups.lock().unwrap().push(total);
    }

    fn on_progress_update(&self) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_log(&self, level: LogLevel, message: &str) {
        self.logs.lock().unwrap().push((level, message.to_string()));
    }

    fn on_complete(&self, summary: &BatchSummary) {
        self.completions.lock().unwrap().push(*summary);
    }
}
