//! Application state shared by every request handler.

use crate::capture::{CaptureLoop, FrameSlot};
use crate::smile::SmileService;
use crate::store::EventStore;
use smilecam_core::SmileDetector;
use smilecam_hw::CameraProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub capture: Arc<CaptureLoop>,
    pub frames: Arc<FrameSlot>,
    pub store: Arc<EventStore>,
    pub smiles: Arc<SmileService>,
    pub jpeg_quality: u8,
}

impl AppState {
    pub fn new(
        camera: Arc<dyn CameraProvider>,
        detector: SmileDetector,
        store: EventStore,
        save_dir: PathBuf,
        capture_interval: Duration,
        jpeg_quality: u8,
    ) -> Self {
        let capture = Arc::new(CaptureLoop::new(
            camera,
            Arc::new(FrameSlot::new()),
            capture_interval,
        ));
        let frames = capture.slot().clone();
        let store = Arc::new(store);
        let smiles = Arc::new(SmileService::new(
            frames.clone(),
            Arc::new(detector),
            store.clone(),
            save_dir,
            jpeg_quality,
        ));

        Self {
            capture,
            frames,
            store,
            smiles,
            jpeg_quality,
        }
    }
}
