//! The detect-smile operation: analyse the latest frame, annotate it, save
//! the image and record the event.

use crate::capture::FrameSlot;
use crate::store::{EventStore, StoreError};
use chrono::{DateTime, Local, Timelike};
use serde::Serialize;
use smilecam_core::annotate::draw_smile_box;
use smilecam_core::{DetectorError, SmileDetector};
use smilecam_hw::{Frame, FrameError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmileError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("encode: {0}")]
    Encode(#[from] FrameError),
    #[error("failed to write {path}: {source}")]
    WriteImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Result returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectResponse {
    pub smile_detected: bool,
    /// Smile top-left as `"x,y"`, empty when nothing was found.
    pub coordinates: String,
}

impl DetectResponse {
    pub fn none() -> Self {
        Self {
            smile_detected: false,
            coordinates: String::new(),
        }
    }
}

/// Identifier shared by the saved image and its event row:
/// `d<MM>-<DD>-<YY>_<HHMMSS>_<millis>`.
pub fn event_timestamp(now: DateTime<Local>) -> String {
    let millis = now.nanosecond() / 1_000_000 % 1000;
    format!("{}_{}", now.format("d%m-%d-%y_%H%M%S"), millis)
}

pub struct SmileService {
    slot: Arc<FrameSlot>,
    detector: Arc<SmileDetector>,
    store: Arc<EventStore>,
    save_dir: PathBuf,
    jpeg_quality: u8,
}

impl SmileService {
    pub fn new(
        slot: Arc<FrameSlot>,
        detector: Arc<SmileDetector>,
        store: Arc<EventStore>,
        save_dir: PathBuf,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            slot,
            detector,
            store,
            save_dir,
            jpeg_quality,
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Run detection on the latest frame. Blocking.
    pub fn detect(&self) -> Result<DetectResponse, SmileError> {
        self.detect_at(Local::now())
    }

    /// As [`detect`](Self::detect), stamping any event with `now`.
    pub fn detect_at(&self, now: DateTime<Local>) -> Result<DetectResponse, SmileError> {
        let Some(frame) = self.slot.load() else {
            tracing::debug!("detect requested before any frame was captured");
            return Ok(DetectResponse::none());
        };

        tracing::debug!(
            sequence = frame.sequence,
            age_ms = frame.age().as_millis() as u64,
            "running smile detection"
        );
        let Some(hit) = self.detector.find_smile(&frame.to_gray())? else {
            return Ok(DetectResponse::none());
        };

        let mut annotated = Frame::clone(&frame);
        draw_smile_box(&mut annotated.image, &hit.smile);
        let jpeg = annotated.encode_jpeg(self.jpeg_quality)?;
        if !self.slot.replace_if_current(&frame, annotated) {
            tracing::debug!("newer frame arrived during detection; annotation not written back");
        }

        let timestamp = event_timestamp(now);
        let filename = format!("{timestamp}.jpg");
        let path = self.save_dir.join(&filename);
        write_new_file(&path, &jpeg).map_err(|source| SmileError::WriteImage {
            path: path.clone(),
            source,
        })?;

        let id = self.store.record(&timestamp, &filename, &hit.smile)?;
        tracing::info!(id, filename = %filename, smile = ?hit.smile, "smile recorded");

        Ok(DetectResponse {
            smile_detected: true,
            coordinates: hit.coordinates(),
        })
    }
}

/// Write `bytes` to a file that must not already exist.
fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
