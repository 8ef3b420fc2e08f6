use echodub_core::RecorderError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One raw video frame as handed to the recorder backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

// ── VideoSource ───────────────────────────────────────────────

/// A camera implementation. `start` acquires the underlying device;
/// `capture_frame` returns None when the source is stopped or starved.
pub trait VideoSource: Send + Sync {
    fn name(&self) -> &str;
    fn start(&mut self) -> Result<(), RecorderError>;
    fn stop(&mut self);
    fn capture_frame(&mut self) -> Option<VideoFrame>;
}

/// Deterministic synthetic camera: a moving gradient, no hardware needed.
pub struct TestPatternCamera {
    width: u32,
    height: u32,
    active: bool,
    frame_index: u64,
}

impl TestPatternCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            active: false,
            frame_index: 0,
        }
    }
}

impl Default for TestPatternCamera {
    fn default() -> Self {
        Self::new(64, 48)
    }
}

impl VideoSource for TestPatternCamera {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn start(&mut self) -> Result<(), RecorderError> {
        self.active = true;
        self.frame_index = 0;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn capture_frame(&mut self) -> Option<VideoFrame> {
        if !self.active {
            return None;
        }
        let shift = self.frame_index as u8;
        let data: Vec<u8> = (0..self.width * self.height)
            .map(|i| (i as u8).wrapping_add(shift))
            .collect();
        self.frame_index += 1;
        Some(VideoFrame {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

// ── CameraController ──────────────────────────────────────────

/// On/off lifecycle for the camera, independent of recording except for one
/// rule: the camera cannot be turned off while a recording holds it.
#[derive(Clone)]
pub struct CameraController {
    source: Arc<Mutex<Option<Box<dyn VideoSource>>>>,
    recording: Arc<AtomicBool>,
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            source: Arc::new(Mutex::new(None)),
            recording: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn turn_on(&self, mut source: Box<dyn VideoSource>) -> Result<(), RecorderError> {
        if self.recording.load(Ordering::Relaxed) {
            return Err(RecorderError::RecordingActive);
        }
        source.start()?;
        let mut guard = lock(&self.source);
        if let Some(previous) = guard.take() {
            drop_source(previous);
        }
        tracing::info!(camera = source.name(), "camera on");
        *guard = Some(source);
        Ok(())
    }

    /// Rejected while a recording is active; the recording must stop first.
    pub fn turn_off(&self) -> Result<(), RecorderError> {
        if self.recording.load(Ordering::Relaxed) {
            return Err(RecorderError::RecordingActive);
        }
        if let Some(source) = lock(&self.source).take() {
            tracing::info!(camera = source.name(), "camera off");
            drop_source(source);
        }
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        lock(&self.source).is_some()
    }

    pub fn capture_frame(&self) -> Option<VideoFrame> {
        lock(&self.source).as_mut().and_then(|s| s.capture_frame())
    }

    /// Shared flag the recorder sets for its start/stop window.
    pub fn recording_guard(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.recording)
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

fn drop_source(mut source: Box<dyn VideoSource>) {
    source.stop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_camera_inactive_yields_no_frames() {
        let mut camera = TestPatternCamera::default();
        assert!(camera.capture_frame().is_none());
    }

    #[test]
    fn test_pattern_camera_frames_advance() {
        let mut camera = TestPatternCamera::new(8, 8);
        camera.start().unwrap();
        let first = camera.capture_frame().unwrap();
        let second = camera.capture_frame().unwrap();
        assert_eq!(first.data.len(), 64);
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn test_controller_on_off() {
        let controller = CameraController::new();
        assert!(!controller.is_on());
        controller
            .turn_on(Box::new(TestPatternCamera::default()))
            .unwrap();
        assert!(controller.is_on());
        assert!(controller.capture_frame().is_some());
        controller.turn_off().unwrap();
        assert!(!controller.is_on());
        assert!(controller.capture_frame().is_none());
    }

    #[test]
    fn test_turn_off_rejected_while_recording() {
        let controller = CameraController::new();
        controller
            .turn_on(Box::new(TestPatternCamera::default()))
            .unwrap();
        controller.recording_guard().store(true, Ordering::Relaxed);
        match controller.turn_off() {
            Err(RecorderError::RecordingActive) => {}
            other => panic!("expected RecordingActive, got {other:?}"),
        }
        assert!(controller.is_on());

        controller.recording_guard().store(false, Ordering::Relaxed);
        controller.turn_off().unwrap();
    }

    #[test]
    fn test_clone_shares_state() {
        let controller = CameraController::new();
        let view = controller.clone();
        controller
            .turn_on(Box::new(TestPatternCamera::default()))
            .unwrap();
        assert!(view.is_on());
    }
}
