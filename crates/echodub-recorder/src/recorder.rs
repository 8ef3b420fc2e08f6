use crate::backend::{select_mime_type, RecorderBackend, RecorderSettings};
use crate::camera::CameraController;
use echodub_audio::TapHandle;
use echodub_core::RecorderError;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
pub struct RecordingSettings {
    pub directory: PathBuf,
    pub filename: String,
    pub video_bits_per_second: u32,
    pub audio_bits_per_second: u32,
}

/// A finalized recording on disk.
#[derive(Debug)]
pub struct RecordingArtifact {
    path: PathBuf,
}

impl RecordingArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    fn release(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!("artifact already gone: {e}");
        }
    }
}

// ── AvRecorder ────────────────────────────────────────────────

/// Combines camera frames with the scheduler's tap audio into one recording.
/// The tap, not the output device, is the audio source: the recording keeps
/// every synthesized sample even when the user mutes playback.
pub struct AvRecorder {
    settings: RecordingSettings,
    backend: Arc<Mutex<Box<dyn RecorderBackend>>>,
    tap: Arc<Mutex<HeapCons<f32>>>,
    active: bool,
    saving: Arc<AtomicBool>,
    camera_guard: Option<Arc<AtomicBool>>,
    capture_task: Option<JoinHandle<()>>,
    artifact: Option<RecordingArtifact>,
}

impl AvRecorder {
    pub fn new(
        settings: RecordingSettings,
        backend: Box<dyn RecorderBackend>,
        tap_consumer: HeapCons<f32>,
    ) -> Self {
        Self {
            settings,
            backend: Arc::new(Mutex::new(backend)),
            tap: Arc::new(Mutex::new(tap_consumer)),
            active: false,
            saving: Arc::new(AtomicBool::new(false)),
            camera_guard: None,
            capture_task: None,
            artifact: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Relaxed)
    }

    pub fn artifact(&self) -> Option<&RecordingArtifact> {
        self.artifact.as_ref()
    }

    /// Begin recording camera plus tap. Preconditions are discriminated so
    /// the caller can message the user specifically: a recording without a
    /// camera session or without live dubbed audio is an unusable artifact.
    pub fn start_recording(
        &mut self,
        camera: &CameraController,
        tap: &TapHandle,
    ) -> Result<(), RecorderError> {
        if self.active {
            return Err(RecorderError::AlreadyRecording);
        }
        if !camera.is_on() {
            return Err(RecorderError::NoCamera);
        }
        if !tap.is_live() {
            return Err(RecorderError::AudioNotReady);
        }

        let mime_type = {
            let backend = lock(&self.backend);
            select_mime_type(&**backend).ok_or(RecorderError::Unsupported)?
        };

        // The previous artifact is released before a new session starts.
        if let Some(previous) = self.artifact.take() {
            previous.release();
        }

        lock(&self.backend).start(&RecorderSettings {
            mime_type: mime_type.to_string(),
            video_bits_per_second: self.settings.video_bits_per_second,
            audio_bits_per_second: self.settings.audio_bits_per_second,
        })?;

        let guard = camera.recording_guard();
        guard.store(true, Ordering::Relaxed);
        self.camera_guard = Some(guard);

        let camera = camera.clone();
        let backend = Arc::clone(&self.backend);
        let tap_rx = Arc::clone(&self.tap);
        self.capture_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME_INTERVAL);
            loop {
                ticker.tick().await;
                if let Some(frame) = camera.capture_frame() {
                    if lock(&backend).write_video(&frame).is_err() {
                        break;
                    }
                }
                let drained = drain_tap(&tap_rx);
                if !drained.is_empty() && lock(&backend).write_audio(&drained).is_err() {
                    break;
                }
            }
        }));

        self.active = true;
        tracing::info!(mime_type, "recording started");
        Ok(())
    }

    /// Stop, deferred by `tail_ms` so audio that is scheduled but not yet
    /// played lands in the recording instead of being truncated. The caller
    /// reads the tail from the scheduler before invoking this.
    pub async fn stop_recording(&mut self, tail_ms: u64) -> Result<String, RecorderError> {
        if !self.active {
            return Err(RecorderError::NotRecording);
        }
        self.saving.store(true, Ordering::Relaxed);
        tracing::info!(tail_ms, "stop deferred for scheduled audio");
        tokio::time::sleep(Duration::from_millis(tail_ms)).await;

        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        // Final drain: whatever landed on the tap during the deferral.
        let drained = drain_tap(&self.tap);
        if !drained.is_empty() {
            let _ = lock(&self.backend).write_audio(&drained);
        }

        let fragments = lock(&self.backend).finish()?;
        let artifact = self.finalize(fragments)?;
        let url = artifact.url();

        if let Some(guard) = self.camera_guard.take() {
            guard.store(false, Ordering::Relaxed);
        }
        self.active = false;
        self.saving.store(false, Ordering::Relaxed);
        self.artifact = Some(artifact);
        tracing::info!(%url, "recording finalized");
        Ok(url)
    }

    /// Stop silently if active, then release the artifact and clear state.
    pub fn delete_recording(&mut self) {
        if self.active {
            if let Some(task) = self.capture_task.take() {
                task.abort();
            }
            let _ = lock(&self.backend).finish();
            if let Some(guard) = self.camera_guard.take() {
                guard.store(false, Ordering::Relaxed);
            }
            self.active = false;
            self.saving.store(false, Ordering::Relaxed);
        }
        if let Some(artifact) = self.artifact.take() {
            artifact.release();
        }
        tracing::info!("recording deleted");
    }

    fn finalize(&self, fragments: Vec<Vec<u8>>) -> Result<RecordingArtifact, RecorderError> {
        std::fs::create_dir_all(&self.settings.directory)
            .map_err(|e| RecorderError::ArtifactWrite(e.to_string()))?;
        let path = self.settings.directory.join(&self.settings.filename);
        let total: usize = fragments.iter().map(|f| f.len()).sum();
        let mut blob = Vec::with_capacity(total);
        for fragment in fragments {
            blob.extend_from_slice(&fragment);
        }
        std::fs::write(&path, &blob).map_err(|e| RecorderError::ArtifactWrite(e.to_string()))?;
        Ok(RecordingArtifact { path })
    }
}

impl Drop for AvRecorder {
    fn drop(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        if let Some(guard) = self.camera_guard.take() {
            guard.store(false, Ordering::Relaxed);
        }
    }
}

fn drain_tap(tap: &Arc<Mutex<HeapCons<f32>>>) -> Vec<f32> {
    let mut cons = lock(tap);
    let mut out = Vec::new();
    while let Some(s) = cons.try_pop() {
        out.push(s);
    }
    out
}
