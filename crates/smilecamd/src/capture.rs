//! Background frame polling and the shared latest-frame slot.

use smilecam_hw::{CameraError, CameraProvider, Frame, FrameSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open camera: {0}")]
    Open(#[from] CameraError),
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Single-slot holder for the most recent frame.
///
/// Writers swap in a new `Arc`; readers clone the current one. The lock is
/// held only for the pointer exchange, never across capture or detection, so
/// the slot behaves as a last-write-wins cell.
#[derive(Default)]
pub struct FrameSlot {
    current: RwLock<Option<Arc<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest frame, if any has been captured.
    pub fn load(&self) -> Option<Arc<Frame>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publish a new frame, replacing whatever was there.
    pub fn store(&self, frame: Frame) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(frame));
    }

    /// Replace the slot with `next` only if it still holds `expected`.
    ///
    /// Returns false when a newer capture has already landed.
    pub fn replace_if_current(&self, expected: &Arc<Frame>, next: Frame) -> bool {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match current.as_ref() {
            Some(held) if Arc::ptr_eq(held, expected) => {
                *current = Some(Arc::new(next));
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_none()
    }
}

/// Handle to the running polling thread.
struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the capture session lifecycle: open the source, poll it on a
/// dedicated OS thread, release it on stop.
pub struct CaptureLoop {
    provider: Arc<dyn CameraProvider>,
    slot: Arc<FrameSlot>,
    interval: Duration,
    active: AtomicBool,
    worker: Mutex<Option<Worker>>,
}

impl CaptureLoop {
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        slot: Arc<FrameSlot>,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            slot,
            interval,
            active: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn slot(&self) -> &Arc<FrameSlot> {
        &self.slot
    }

    /// Open the camera and begin polling. A no-op when already active.
    ///
    /// Blocks while the device is opened; call from a blocking context.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut worker = self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if worker.is_some() {
            tracing::debug!("capture already active");
            return Ok(());
        }

        let source = self.provider.open()?;
        tracing::info!(
            device = %self.provider.describe(),
            interval_ms = self.interval.as_millis() as u64,
            "camera opened"
        );

        let (stop_tx, stop_rx) = mpsc::channel();
        let slot = Arc::clone(&self.slot);
        let interval = self.interval;
        let handle = std::thread::Builder::new()
            .name("smilecam-capture".into())
            .spawn(move || poll_frames(source, slot, interval, stop_rx))?;

        *worker = Some(Worker { stop_tx, handle });
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop polling and release the camera. A no-op when inactive.
    ///
    /// Returns once the polling thread has exited and dropped the source.
    /// The join happens outside the worker lock, so a read stuck in the
    /// driver delays only this caller.
    pub fn stop(&self) {
        let taken = {
            let mut worker = self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let taken = worker.take();
            self.active.store(false, Ordering::SeqCst);
            taken
        };

        let Some(Worker { stop_tx, handle }) = taken else {
            tracing::debug!("capture already stopped");
            return;
        };

        let _ = stop_tx.send(());
        if handle.join().is_err() {
            tracing::warn!("capture thread panicked");
        }
        tracing::info!("camera stopped");
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Polling loop body: grab, publish, wait. Exits when signalled or when the
/// sender side is dropped.
fn poll_frames(
    mut source: Box<dyn FrameSource>,
    slot: Arc<FrameSlot>,
    interval: Duration,
    stop_rx: mpsc::Receiver<()>,
) {
    tracing::info!("capture thread started");
    let mut captured: u64 = 0;

    loop {
        match source.read_frame() {
            Ok(frame) => {
                captured += 1;
                tracing::trace!(sequence = frame.sequence, "frame captured");
                slot.store(frame);
            }
            Err(e) => tracing::debug!(error = %e, "frame read failed; skipping"),
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(source);
    tracing::info!(captured, "capture thread exiting");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Produces solid frames of a fixed size; counts opens and live sources.
    pub(crate) struct FakeCamera {
        pub width: u32,
        pub height: u32,
        pub fail_open: AtomicBool,
        pub opens: AtomicUsize,
        pub live: Arc<AtomicUsize>,
    }

    impl FakeCamera {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                fail_open: AtomicBool::new(false),
                opens: AtomicUsize::new(0),
                live: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FakeSource {
        width: u32,
        height: u32,
        sequence: u32,
        live: Arc<AtomicUsize>,
    }

    impl FrameSource for FakeSource {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            self.sequence += 1;
            Ok(Frame::new(RgbImage::new(self.width, self.height), self.sequence))
        }
    }

    impl Drop for FakeSource {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl CameraProvider for FakeCamera {
        fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(CameraError::DeviceNotFound("/dev/fake".into()));
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSource {
                width: self.width,
                height: self.height,
                sequence: 0,
                live: Arc::clone(&self.live),
            }))
        }

        fn describe(&self) -> String {
            "fake camera".into()
        }
    }

    /// Spin until the slot holds a frame or a second passes.
    pub(crate) fn wait_for_frame(slot: &FrameSlot) -> Option<Arc<Frame>> {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if let Some(frame) = slot.load() {
                return Some(frame);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    /// Source whose reads take `delay`; announces each read on `entered`.
    struct SlowCamera {
        delay: Duration,
        entered: Mutex<mpsc::Sender<()>>,
    }

    struct SlowSource {
        delay: Duration,
        entered: mpsc::Sender<()>,
    }

    impl FrameSource for SlowSource {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            let _ = self.entered.send(());
            std::thread::sleep(self.delay);
            Ok(Frame::new(RgbImage::new(4, 4), 0))
        }
    }

    impl CameraProvider for SlowCamera {
        fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
            let entered = self.entered.lock().unwrap().clone();
            Ok(Box::new(SlowSource {
                delay: self.delay,
                entered,
            }))
        }

        fn describe(&self) -> String {
            "slow camera".into()
        }
    }

    fn capture_loop(camera: Arc<FakeCamera>) -> CaptureLoop {
        CaptureLoop::new(camera, Arc::new(FrameSlot::new()), Duration::from_millis(10))
    }

    #[test]
    fn test_slot_starts_empty() {
        let slot = FrameSlot::new();
        assert!(slot.is_empty());
        assert!(slot.load().is_none());
    }

    #[test]
    fn test_slot_last_write_wins() {
        let slot = FrameSlot::new();
        slot.store(Frame::new(RgbImage::new(2, 2), 1));
        slot.store(Frame::new(RgbImage::new(4, 4), 2));
        assert_eq!(slot.load().unwrap().sequence, 2);
    }

    #[test]
    fn test_replace_if_current() {
        let slot = FrameSlot::new();
        slot.store(Frame::new(RgbImage::new(2, 2), 1));
        let seen = slot.load().unwrap();

        assert!(slot.replace_if_current(&seen, Frame::new(RgbImage::new(2, 2), 10)));
        assert_eq!(slot.load().unwrap().sequence, 10);

        // `seen` is stale now; the write-back is refused.
        assert!(!slot.replace_if_current(&seen, Frame::new(RgbImage::new(2, 2), 20)));
        assert_eq!(slot.load().unwrap().sequence, 10);
    }

    #[test]
    fn test_readers_keep_old_frame_after_overwrite() {
        // Relaxed consistency: a reader holding a frame is unaffected by a
        // concurrent overwrite; it simply sees an older value.
        let slot = FrameSlot::new();
        slot.store(Frame::new(RgbImage::new(2, 2), 1));
        let held = slot.load().unwrap();
        slot.store(Frame::new(RgbImage::new(2, 2), 2));
        assert_eq!(held.sequence, 1);
        assert_eq!(slot.load().unwrap().sequence, 2);
    }

    #[test]
    fn test_start_publishes_frames() {
        let camera = Arc::new(FakeCamera::new(64, 48));
        let capture = capture_loop(camera.clone());

        capture.start().unwrap();
        assert!(capture.is_active());

        let frame = wait_for_frame(capture.slot()).expect("no frame published");
        assert_eq!((frame.width(), frame.height()), (64, 48));
        capture.stop();
    }

    #[test]
    fn test_start_is_idempotent() {
        let camera = Arc::new(FakeCamera::new(8, 8));
        let capture = capture_loop(camera.clone());

        capture.start().unwrap();
        capture.start().unwrap();
        assert_eq!(camera.opens.load(Ordering::SeqCst), 1);
        assert_eq!(camera.live.load(Ordering::SeqCst), 1);
        capture.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let camera = Arc::new(FakeCamera::new(8, 8));
        let capture = capture_loop(camera);

        capture.stop();
        assert!(!capture.is_active());
        capture.start().unwrap();
        capture.stop();
        capture.stop();
        assert!(!capture.is_active());
    }

    #[test]
    fn test_stop_releases_source() {
        let camera = Arc::new(FakeCamera::new(8, 8));
        let capture = capture_loop(camera.clone());

        capture.start().unwrap();
        capture.stop();
        assert_eq!(camera.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restart_reopens_device() {
        let camera = Arc::new(FakeCamera::new(8, 8));
        let capture = capture_loop(camera.clone());

        capture.start().unwrap();
        capture.stop();
        capture.start().unwrap();
        assert!(capture.is_active());
        assert_eq!(camera.opens.load(Ordering::SeqCst), 2);
        capture.stop();
    }

    #[test]
    fn test_failed_open_leaves_state_unchanged() {
        let camera = Arc::new(FakeCamera::new(8, 8));
        camera.fail_open.store(true, Ordering::SeqCst);
        let capture = capture_loop(camera.clone());

        let err = capture.start().unwrap_err();
        assert!(matches!(err, CaptureError::Open(_)));
        assert!(!capture.is_active());
        assert!(capture.slot().is_empty());

        camera.fail_open.store(false, Ordering::SeqCst);
        capture.start().unwrap();
        assert!(capture.is_active());
        capture.stop();
    }

    #[test]
    fn test_stalled_read_does_not_block_other_callers() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let camera = Arc::new(SlowCamera {
            delay: Duration::from_millis(600),
            entered: Mutex::new(entered_tx),
        });
        let capture = Arc::new(CaptureLoop::new(
            camera,
            Arc::new(FrameSlot::new()),
            Duration::from_millis(10),
        ));

        capture.start().unwrap();
        entered_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("capture thread never read");

        let stopper = {
            let capture = Arc::clone(&capture);
            std::thread::spawn(move || capture.stop())
        };
        while capture.is_active() {
            std::thread::sleep(Duration::from_millis(1));
        }

        // The first stop is still joining the slow read; a second one must
        // not queue behind it.
        let started = Instant::now();
        capture.stop();
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(!capture.is_active());

        stopper.join().unwrap();
    }

    #[test]
    fn test_frame_survives_stop() {
        let camera = Arc::new(FakeCamera::new(8, 8));
        let capture = capture_loop(camera);

        capture.start().unwrap();
        wait_for_frame(capture.slot()).unwrap();
        capture.stop();
        assert!(!capture.slot().is_empty());
    }
}
