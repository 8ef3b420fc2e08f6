use crate::camera::VideoFrame;
use echodub_core::RecorderError;

/// Container/codec preference ladder, best first.
pub const MIME_PREFERENCE: &[&str] = &[
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Walk the preference ladder and return the first type the backend takes.
pub fn select_mime_type(backend: &dyn RecorderBackend) -> Option<&'static str> {
    MIME_PREFERENCE
        .iter()
        .copied()
        .find(|mime| backend.is_type_supported(mime))
}

#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub mime_type: String,
    pub video_bits_per_second: u32,
    pub audio_bits_per_second: u32,
}

// ── RecorderBackend ───────────────────────────────────────────

/// A muxing backend. Receives raw video frames and tap audio while a
/// recording runs and hands back the buffered fragments on finish.
pub trait RecorderBackend: Send + Sync {
    fn name(&self) -> &str;
    fn is_type_supported(&self, mime_type: &str) -> bool;
    fn start(&mut self, settings: &RecorderSettings) -> Result<(), RecorderError>;
    fn write_video(&mut self, frame: &VideoFrame) -> Result<(), RecorderError>;
    fn write_audio(&mut self, samples: &[f32]) -> Result<(), RecorderError>;
    fn finish(&mut self) -> Result<Vec<Vec<u8>>, RecorderError>;
}

/// Buffering backend with no real codec: every write becomes one in-memory
/// fragment, concatenated verbatim at finalize. Real muxers slot in behind
/// the same trait.
pub struct PassthroughRecorder {
    supported: Vec<String>,
    recording: bool,
    fragments: Vec<Vec<u8>>,
}

impl PassthroughRecorder {
    pub fn new() -> Self {
        Self {
            supported: MIME_PREFERENCE.iter().map(|s| s.to_string()).collect(),
            recording: false,
            fragments: Vec::new(),
        }
    }

    /// Restrict the supported types; used to exercise ladder fallback.
    pub fn with_supported(types: &[&str]) -> Self {
        Self {
            supported: types.iter().map(|s| s.to_string()).collect(),
            recording: false,
            fragments: Vec::new(),
        }
    }
}

impl Default for PassthroughRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderBackend for PassthroughRecorder {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|s| s == mime_type)
    }

    fn start(&mut self, settings: &RecorderSettings) -> Result<(), RecorderError> {
        if self.recording {
            return Err(RecorderError::AlreadyRecording);
        }
        if !self.is_type_supported(&settings.mime_type) {
            return Err(RecorderError::Unsupported);
        }
        tracing::info!(
            mime = %settings.mime_type,
            video_bps = settings.video_bits_per_second,
            audio_bps = settings.audio_bits_per_second,
            "recorder started",
        );
        self.fragments.clear();
        self.recording = true;
        Ok(())
    }

    fn write_video(&mut self, frame: &VideoFrame) -> Result<(), RecorderError> {
        if !self.recording {
            return Err(RecorderError::NotRecording);
        }
        self.fragments.push(frame.data.clone());
        Ok(())
    }

    fn write_audio(&mut self, samples: &[f32]) -> Result<(), RecorderError> {
        if !self.recording {
            return Err(RecorderError::NotRecording);
        }
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.fragments.push(bytes);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<Vec<u8>>, RecorderError> {
        if !self.recording {
            return Err(RecorderError::NotRecording);
        }
        self.recording = false;
        Ok(std::mem::take(&mut self.fragments))
    }
}
